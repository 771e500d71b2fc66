use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Rating and review left by a user for one booking; at most one per booking
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Feedback {
    pub id: i32,
    pub id_trip_booking: i32,
    pub message: String,
    pub rating: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewFeedback {
    pub id_trip_booking: i32,
    pub message: String,
    pub rating: i32,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateFeedbackRequest {
    #[validate(range(min = 1, message = "booking id must be a positive integer"))]
    pub id_trip_booking: i32,

    #[validate(length(min = 10, max = 500, message = "message must be 10 to 500 characters"))]
    pub message: String,

    #[validate(range(min = 1, max = 5, message = "rating must be between 1 and 5"))]
    pub rating: i32,
}

/// Feedback joined with the trip it was written for
#[derive(Debug, Clone, PartialEq)]
pub struct FeedbackListing {
    pub feedback: Feedback,
    pub mountain_name: String,
    pub mountain_photo: Option<String>,
}
