use chrono::{DateTime, NaiveDate, Utc};
use gapakerem_catalog::TripType;
use gapakerem_shared::Masked;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::payment::PaymentStatus;

/// A reservation of a trip by one user.
///
/// `trip_type` and `total_price` are captured when the booking is created and
/// never recomputed afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TripBooking {
    pub id: i32,
    pub id_user: i32,
    pub id_trip: i32,
    pub trip_type: TripType,
    pub total_participants: i32,
    /// Comma separated participant names
    pub name_participants: String,
    pub no_hp: Masked<String>,
    pub meeting_point: String,
    pub total_price: i64,
    pub payment_proof: Option<String>,
    pub payment_status: PaymentStatus,
    pub created_at: DateTime<Utc>,
}

/// Row data for a booking that does not exist yet
#[derive(Debug, Clone, PartialEq)]
pub struct NewTripBooking {
    pub id_user: i32,
    pub id_trip: i32,
    pub trip_type: TripType,
    pub total_participants: i32,
    pub name_participants: String,
    pub no_hp: Masked<String>,
    pub meeting_point: String,
    pub total_price: i64,
}

/// Private-trip details attached 1:1 to a private [`TripBooking`]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PrivateTripBooking {
    pub id: i32,
    pub id_trip_booking: i32,
    pub id_guide: i32,
    pub total_days: i32,
    pub start_date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewPrivateTripBooking {
    pub id_trip_booking: i32,
    pub id_guide: i32,
    pub total_days: i32,
    pub start_date: NaiveDate,
}

/// Private-trip details together with the ids of the porters linked to them
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PrivateTripBookingDetail {
    #[serde(flatten)]
    pub detail: PrivateTripBooking,
    pub porters: Vec<i32>,
}

/// Result of a successful private-trip booking
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PrivateBookingReceipt {
    #[serde(flatten)]
    pub booking: TripBooking,
    pub private_trip_booking: PrivateTripBookingDetail,
}

// ============================================================================
// Request contracts
// ============================================================================

/// Fields shared by open and private booking requests
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateBookingRequest {
    #[validate(range(min = 1, message = "trip id must be a positive integer"))]
    pub id_trip: i32,

    #[validate(range(min = 1, message = "participant count must be a positive integer"))]
    pub total_participants: i32,

    #[validate(
        length(min = 2, message = "names must be at least 2 characters"),
        custom(function = "validate_participant_names")
    )]
    pub name_participants: String,

    #[validate(
        length(min = 10, max = 15, message = "phone number must be 10 to 15 digits"),
        custom(function = "validate_phone_number")
    )]
    pub no_hp: String,

    #[validate(length(min = 5, max = 100, message = "meeting point must be 5 to 100 characters"))]
    pub meeting_point: String,
}

/// Private-trip specific part of a booking request
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct PrivateTripRequest {
    #[validate(range(min = 1, message = "guide id must be a positive integer"))]
    pub id_guide: i32,

    #[validate(range(min = 1, message = "total days must be a positive integer"))]
    pub total_days: i32,

    /// `YYYY-MM-DD`; checked against the current date by the coordinator
    pub start_date: NaiveDate,

    #[validate(
        length(min = 1, message = "at least one porter is required"),
        custom(function = "validate_porter_ids")
    )]
    pub porters: Vec<i32>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreatePrivateBookingRequest {
    #[serde(flatten)]
    #[validate(nested)]
    pub booking: CreateBookingRequest,

    #[validate(nested)]
    pub private_trip: PrivateTripRequest,
}

fn validate_participant_names(names: &str) -> Result<(), ValidationError> {
    let allowed = names
        .chars()
        .all(|c| c.is_ascii_alphabetic() || c.is_whitespace() || c == ',');
    if !allowed {
        return Err(invalid("names", "names may only contain letters, spaces and commas"));
    }
    if names.split(',').all(|name| name.trim().is_empty()) {
        return Err(invalid("names", "at least one participant name is required"));
    }
    Ok(())
}

fn validate_phone_number(no_hp: &str) -> Result<(), ValidationError> {
    if no_hp.chars().all(|c| c.is_ascii_digit()) {
        Ok(())
    } else {
        Err(invalid("phone", "phone number may only contain digits"))
    }
}

fn validate_porter_ids(ids: &[i32]) -> Result<(), ValidationError> {
    if ids.iter().all(|id| *id > 0) {
        Ok(())
    } else {
        Err(invalid("porters", "porter ids must be positive"))
    }
}

fn invalid(code: &'static str, message: &'static str) -> ValidationError {
    let mut err = ValidationError::new(code);
    err.message = Some(message.into());
    err
}
