use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;
use validator::Validate;

use gapakerem_core::feedback::{CreateFeedbackRequest, Feedback, FeedbackListing, NewFeedback};
use gapakerem_core::search::{PageInfo, Pagination};
use gapakerem_core::{AuthUser, CoreError, CoreResult, ReferenceStore};

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FeedbackTrip {
    pub mountain_name: String,
    pub mountain_photo: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FeedbackBooking {
    pub trip: FeedbackTrip,
}

/// Public feedback entry with the trip it was left for
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FeedbackEntry {
    pub id: i32,
    pub message: String,
    pub rating: i32,
    pub created_at: DateTime<Utc>,
    pub trip_booking: FeedbackBooking,
}

impl From<FeedbackListing> for FeedbackEntry {
    fn from(listing: FeedbackListing) -> Self {
        FeedbackEntry {
            id: listing.feedback.id,
            message: listing.feedback.message,
            rating: listing.feedback.rating,
            created_at: listing.feedback.created_at,
            trip_booking: FeedbackBooking {
                trip: FeedbackTrip {
                    mountain_name: listing.mountain_name,
                    mountain_photo: listing.mountain_photo,
                },
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FeedbackPage {
    pub feedbacks: Vec<FeedbackEntry>,
    pub pagination: PageInfo,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub struct AverageRating {
    pub average_rating: Option<f64>,
}

/// Leaves feedback on one of the caller's bookings; at most once per booking
pub async fn create_feedback(
    store: &dyn ReferenceStore,
    user: &AuthUser,
    request: &CreateFeedbackRequest,
) -> CoreResult<Feedback> {
    request.validate()?;

    let mut tx = store.begin().await?;
    // Holding the booking row serializes concurrent feedback on it.
    let booking = tx.lock_booking(request.id_trip_booking).await?.ok_or_else(|| {
        CoreError::NotFound(format!("booking {} not found", request.id_trip_booking))
    })?;
    if booking.id_user != user.id {
        return Err(CoreError::Forbidden(
            "you can only leave feedback on your own booking".to_string(),
        ));
    }
    if tx.find_feedback(booking.id).await?.is_some() {
        return Err(CoreError::Conflict("feedback already submitted for this booking".to_string()));
    }

    let feedback = tx
        .insert_feedback(&NewFeedback {
            id_trip_booking: booking.id,
            message: request.message.clone(),
            rating: request.rating,
        })
        .await?;
    tx.commit().await?;

    info!(id = feedback.id, id_trip_booking = booking.id, "Feedback created");
    Ok(feedback)
}

pub async fn list_feedback(
    store: &dyn ReferenceStore,
    page: Option<i64>,
    limit: Option<i64>,
) -> CoreResult<FeedbackPage> {
    let pagination = Pagination::new(page, limit);
    let mut tx = store.begin().await?;
    let total = tx.count_feedback().await?;
    let listings = tx.list_feedback(&pagination).await?;

    Ok(FeedbackPage {
        feedbacks: listings.into_iter().map(FeedbackEntry::from).collect(),
        pagination: PageInfo::new(&pagination, u64::try_from(total).unwrap_or(0)),
    })
}

/// Mean rating of a trip; `None` when nobody rated it yet
pub async fn average_rating(store: &dyn ReferenceStore, id_trip: i32) -> CoreResult<AverageRating> {
    let mut tx = store.begin().await?;
    if tx.find_trip(id_trip).await?.is_none() {
        return Err(CoreError::NotFound(format!("trip {} not found", id_trip)));
    }
    let average_rating = tx.average_rating(id_trip).await?;
    Ok(AverageRating { average_rating })
}
