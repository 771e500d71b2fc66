use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use gapakerem_booking::feedback::{AverageRating, FeedbackPage};
use gapakerem_core::feedback::{CreateFeedbackRequest, Feedback};

use crate::{auth::Authenticated, error::AppError, lenient_int, state::AppState};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/feedbacks", get(list_feedback).post(create_feedback))
        .route("/feedbacks/average/{id_trip}", get(average_rating))
}

#[derive(Debug, Deserialize)]
struct PageParams {
    page: Option<String>,
    limit: Option<String>,
}

async fn create_feedback(
    State(state): State<AppState>,
    Authenticated(user): Authenticated,
    payload: Result<Json<CreateFeedbackRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Feedback>), AppError> {
    let Json(req) = payload?;
    let feedback = gapakerem_booking::create_feedback(state.store.as_ref(), &user, &req).await?;
    Ok((StatusCode::CREATED, Json(feedback)))
}

async fn list_feedback(
    State(state): State<AppState>,
    params: Result<Query<PageParams>, QueryRejection>,
) -> Result<Json<FeedbackPage>, AppError> {
    let Query(params) = params?;
    let page = gapakerem_booking::list_feedback(
        state.store.as_ref(),
        lenient_int(params.page.as_deref()),
        lenient_int(params.limit.as_deref()),
    )
    .await?;
    Ok(Json(page))
}

async fn average_rating(
    State(state): State<AppState>,
    Path(id_trip): Path<i32>,
) -> Result<Json<AverageRating>, AppError> {
    Ok(Json(gapakerem_booking::average_rating(state.store.as_ref(), id_trip).await?))
}
