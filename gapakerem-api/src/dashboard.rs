use axum::{
    extract::{rejection::QueryRejection, Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use gapakerem_booking::dashboard::{DashboardSummary, MonthlyTripStats};

use crate::{auth::Authenticated, error::AppError, state::AppState};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/dashboard", get(summary))
        .route("/dashboard/monthly-trip-statistics", get(monthly_trip_statistics))
}

#[derive(Debug, Deserialize)]
struct MonthParams {
    month: Option<String>,
    year: Option<String>,
}

async fn summary(
    State(state): State<AppState>,
    Authenticated(user): Authenticated,
) -> Result<Json<DashboardSummary>, AppError> {
    Ok(Json(gapakerem_booking::dashboard_summary(state.store.as_ref(), &user).await?))
}

async fn monthly_trip_statistics(
    State(state): State<AppState>,
    Authenticated(user): Authenticated,
    params: Result<Query<MonthParams>, QueryRejection>,
) -> Result<Json<MonthlyTripStats>, AppError> {
    let Query(params) = params?;
    let month = parse_param::<u32>("month", params.month.as_deref())?;
    let year = parse_param::<i32>("year", params.year.as_deref())?;
    let stats =
        gapakerem_booking::monthly_trip_statistics(state.store.as_ref(), &user, month, year).await?;
    Ok(Json(stats))
}

fn parse_param<T: std::str::FromStr>(name: &str, raw: Option<&str>) -> Result<Option<T>, AppError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(s) => s
            .parse::<T>()
            .map(Some)
            .map_err(|_| AppError::BadRequest(format!("{} must be a number", name))),
    }
}
