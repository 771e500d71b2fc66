use chrono::{DateTime, Utc};
use gapakerem_catalog::TripType;
use serde::{Deserialize, Serialize};

use crate::booking::TripBooking;
use crate::payment::PaymentStatus;

/// Selects the bookings an aggregate runs over
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookingScope {
    pub trip_type: Option<TripType>,
    pub payment_status: Option<PaymentStatus>,
    /// Inclusive lower bound on `created_at`
    pub created_from: Option<DateTime<Utc>>,
    /// Exclusive upper bound on `created_at`
    pub created_before: Option<DateTime<Utc>>,
}

impl BookingScope {
    pub fn trip_type(trip_type: TripType) -> Self {
        Self { trip_type: Some(trip_type), ..Self::default() }
    }

    pub fn payment_status(status: PaymentStatus) -> Self {
        Self { payment_status: Some(status), ..Self::default() }
    }

    pub fn matches(&self, booking: &TripBooking) -> bool {
        self.trip_type.map_or(true, |t| booking.trip_type == t)
            && self.payment_status.map_or(true, |s| booking.payment_status == s)
            && self.created_from.map_or(true, |from| booking.created_at >= from)
            && self.created_before.map_or(true, |before| booking.created_at < before)
    }
}

/// Count, participant sum and price sum over a [`BookingScope`]
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BookingTotals {
    pub bookings: i64,
    pub participants: i64,
    pub revenue: i64,
}

/// Per-mountain sums over a [`BookingScope`]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MountainTotals {
    pub mountain_name: String,
    pub total_participants: i64,
    pub total_price: i64,
}
