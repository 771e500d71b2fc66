use async_trait::async_trait;
use gapakerem_catalog::{Guide, OpenTrip, Porter, PrivateTrip, Trip, TripType};

use crate::booking::{NewPrivateTripBooking, NewTripBooking, PrivateTripBooking, TripBooking};
use crate::feedback::{Feedback, FeedbackListing, NewFeedback};
use crate::payment::PaymentStatus;
use crate::search::{BookingFilter, BookingListing, Pagination};
use crate::stats::{BookingScope, BookingTotals, MountainTotals};

pub type StoreError = Box<dyn std::error::Error + Send + Sync>;
pub type StoreResult<T> = Result<T, StoreError>;

/// Entry point to the reference store
#[async_trait]
pub trait ReferenceStore: Send + Sync {
    /// Open a transaction. Nothing written through it is visible to other
    /// transactions until [`StoreTx::commit`]; dropping it rolls back.
    async fn begin(&self) -> StoreResult<Box<dyn StoreTx>>;
}

/// One all-or-nothing unit of work against the reference store
#[async_trait]
pub trait StoreTx: Send {
    // ------------------------------------------------------------------
    // Reference data
    // ------------------------------------------------------------------

    async fn find_trip(&mut self, id: i32) -> StoreResult<Option<Trip>>;

    async fn find_open_trip(&mut self, id_trip: i32) -> StoreResult<Option<OpenTrip>>;

    async fn find_private_trip(&mut self, id_trip: i32) -> StoreResult<Option<PrivateTrip>>;

    async fn find_guide(&mut self, id: i32) -> StoreResult<Option<Guide>>;

    /// Porters whose id is in `ids`; unknown ids are silently absent
    async fn find_porters(&mut self, ids: &[i32]) -> StoreResult<Vec<Porter>>;

    async fn open_trip_porters(&mut self, id_open_trip: i32) -> StoreResult<Vec<Porter>>;

    /// Adds `delta` to the trip's occupancy counter in place
    async fn increment_trip_participants(&mut self, id_trip: i32, delta: i32) -> StoreResult<()>;

    async fn count_trips(&mut self, trip_type: TripType) -> StoreResult<i64>;

    // ------------------------------------------------------------------
    // Bookings
    // ------------------------------------------------------------------

    /// Insert with `payment_status = unpaid` and no proof
    async fn insert_booking(&mut self, booking: &NewTripBooking) -> StoreResult<TripBooking>;

    async fn insert_private_booking(
        &mut self,
        detail: &NewPrivateTripBooking,
    ) -> StoreResult<PrivateTripBooking>;

    /// One link row per porter id; returns the number of rows written
    async fn insert_porter_links(
        &mut self,
        id_private_trip_booking: i32,
        porter_ids: &[i32],
    ) -> StoreResult<u64>;

    async fn find_booking(&mut self, id: i32) -> StoreResult<Option<TripBooking>>;

    /// Like [`StoreTx::find_booking`] but holds the row until the
    /// transaction ends
    async fn lock_booking(&mut self, id: i32) -> StoreResult<Option<TripBooking>>;

    async fn find_private_booking(
        &mut self,
        id_trip_booking: i32,
    ) -> StoreResult<Option<PrivateTripBooking>>;

    async fn private_booking_porters(
        &mut self,
        id_private_trip_booking: i32,
    ) -> StoreResult<Vec<Porter>>;

    async fn set_payment_proof(
        &mut self,
        id: i32,
        url: &str,
        status: PaymentStatus,
    ) -> StoreResult<TripBooking>;

    async fn set_payment_status(&mut self, id: i32, status: PaymentStatus) -> StoreResult<TripBooking>;

    async fn count_bookings(&mut self, filter: &BookingFilter) -> StoreResult<i64>;

    /// Matching bookings in id order; `None` returns every match
    async fn list_bookings(
        &mut self,
        filter: &BookingFilter,
        page: Option<&Pagination>,
    ) -> StoreResult<Vec<BookingListing>>;

    async fn booking_totals(&mut self, scope: &BookingScope) -> StoreResult<BookingTotals>;

    /// Sums per mountain name, ordered by mountain name
    async fn mountain_totals(&mut self, scope: &BookingScope) -> StoreResult<Vec<MountainTotals>>;

    // ------------------------------------------------------------------
    // Feedback
    // ------------------------------------------------------------------

    async fn find_feedback(&mut self, id_trip_booking: i32) -> StoreResult<Option<Feedback>>;

    async fn insert_feedback(&mut self, feedback: &NewFeedback) -> StoreResult<Feedback>;

    async fn count_feedback(&mut self) -> StoreResult<i64>;

    async fn list_feedback(&mut self, page: &Pagination) -> StoreResult<Vec<FeedbackListing>>;

    /// Mean rating over every booking of the trip; `None` without feedback
    async fn average_rating(&mut self, id_trip: i32) -> StoreResult<Option<f64>>;

    async fn commit(self: Box<Self>) -> StoreResult<()>;
}
