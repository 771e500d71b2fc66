use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        DefaultBodyLimit, Multipart, Path, Query, State,
    },
    http::StatusCode,
    routing::{get, patch, post},
    Json, Router,
};
use serde::Deserialize;
use tracing::info;

use gapakerem_booking::queries::{BookingDetail, BookingPage, BookingQuery, MyBooking};
use gapakerem_core::booking::{CreateBookingRequest, CreatePrivateBookingRequest, PrivateBookingReceipt, TripBooking};
use gapakerem_core::payment::{ProofReceipt, ProofUpload, ReviewReceipt};

use crate::{auth::Authenticated, error::AppError, lenient_int, state::AppState};

/// Multipart field carrying the proof image
const PROOF_FIELD: &str = "payment_proof";

/// Room for multipart framing around the largest accepted image
const MULTIPART_OVERHEAD: usize = 64 * 1024;

pub fn routes(max_proof_bytes: usize) -> Router<AppState> {
    Router::new()
        .route("/bookings", get(list_bookings))
        .route("/bookings/private", post(create_private_booking))
        .route("/bookings/open", post(create_open_booking))
        .route("/bookings/profile", get(list_my_bookings))
        .route("/bookings/profile/{id}", get(get_my_booking))
        .route("/bookings/{id}", get(get_booking))
        .route(
            "/bookings/{id}/upload-proof",
            patch(upload_proof).layer(DefaultBodyLimit::max(max_proof_bytes + MULTIPART_OVERHEAD)),
        )
        .route("/bookings/{id}/status", patch(update_status))
}

#[derive(Debug, Deserialize)]
struct ListParams {
    trip_type: Option<String>,
    search: Option<String>,
    page: Option<String>,
    limit: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StatusBody {
    status: String,
}

async fn create_private_booking(
    State(state): State<AppState>,
    Authenticated(user): Authenticated,
    payload: Result<Json<CreatePrivateBookingRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<PrivateBookingReceipt>), AppError> {
    let Json(req) = payload?;
    let receipt =
        gapakerem_booking::create_private_booking(state.store.as_ref(), &state.pricing, &user, &req).await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

async fn create_open_booking(
    State(state): State<AppState>,
    Authenticated(user): Authenticated,
    payload: Result<Json<CreateBookingRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<TripBooking>), AppError> {
    let Json(req) = payload?;
    let booking =
        gapakerem_booking::create_open_booking(state.store.as_ref(), &state.pricing, &user, &req).await?;
    Ok((StatusCode::CREATED, Json(booking)))
}

async fn list_bookings(
    State(state): State<AppState>,
    Authenticated(user): Authenticated,
    params: Result<Query<ListParams>, QueryRejection>,
) -> Result<Json<BookingPage>, AppError> {
    let Query(params) = params?;
    let query = BookingQuery {
        trip_type: params.trip_type,
        search: params.search,
        page: lenient_int(params.page.as_deref()),
        limit: lenient_int(params.limit.as_deref()),
    };
    let page = gapakerem_booking::list_bookings(state.store.as_ref(), &user, &query).await?;
    Ok(Json(page))
}

async fn get_booking(
    State(state): State<AppState>,
    Authenticated(user): Authenticated,
    Path(id): Path<i32>,
) -> Result<Json<BookingDetail>, AppError> {
    let detail = gapakerem_booking::get_booking_by_id(state.store.as_ref(), &user, id).await?;
    Ok(Json(detail))
}

async fn list_my_bookings(
    State(state): State<AppState>,
    Authenticated(user): Authenticated,
) -> Result<Json<Vec<MyBooking>>, AppError> {
    let bookings = gapakerem_booking::list_my_bookings(state.store.as_ref(), &user).await?;
    Ok(Json(bookings))
}

async fn get_my_booking(
    State(state): State<AppState>,
    Authenticated(user): Authenticated,
    Path(id): Path<i32>,
) -> Result<Json<MyBooking>, AppError> {
    let booking = gapakerem_booking::get_my_booking_detail(state.store.as_ref(), &user, id).await?;
    Ok(Json(booking))
}

/// Pulls the proof image out of the form; other fields are ignored
async fn read_proof(mut multipart: Multipart) -> Result<Option<ProofUpload>, AppError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(PROOF_FIELD) {
            continue;
        }
        let file_name = field.file_name().map(str::to_string);
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = field.bytes().await?;
        return Ok(Some(ProofUpload { file_name, content_type, bytes: bytes.to_vec() }));
    }
    Ok(None)
}

async fn upload_proof(
    State(state): State<AppState>,
    Authenticated(user): Authenticated,
    Path(id): Path<i32>,
    multipart: Multipart,
) -> Result<Json<ProofReceipt>, AppError> {
    let upload = read_proof(multipart).await?;
    info!(id, id_user = user.id, has_file = upload.is_some(), "Payment proof received");

    let receipt = gapakerem_booking::upload_payment_proof(
        state.store.as_ref(),
        state.objects.as_ref(),
        &user,
        id,
        upload.as_ref(),
        state.max_proof_bytes,
    )
    .await?;
    Ok(Json(receipt))
}

async fn update_status(
    State(state): State<AppState>,
    Authenticated(user): Authenticated,
    Path(id): Path<i32>,
    payload: Result<Json<StatusBody>, JsonRejection>,
) -> Result<Json<ReviewReceipt>, AppError> {
    let Json(body) = payload?;
    let receipt =
        gapakerem_booking::update_payment_status(state.store.as_ref(), &user, id, &body.status).await?;
    Ok(Json(receipt))
}
