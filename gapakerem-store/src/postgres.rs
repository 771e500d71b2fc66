use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder, Transaction};
use tracing::debug;

use gapakerem_catalog::{Guide, OpenTrip, Porter, PrivateTrip, Trip, TripType};
use gapakerem_core::booking::{NewPrivateTripBooking, NewTripBooking, PrivateTripBooking, TripBooking};
use gapakerem_core::feedback::{Feedback, FeedbackListing, NewFeedback};
use gapakerem_core::payment::PaymentStatus;
use gapakerem_core::repository::{ReferenceStore, StoreError, StoreResult, StoreTx};
use gapakerem_core::search::{BookingFilter, BookingListing, Pagination};
use gapakerem_core::stats::{BookingScope, BookingTotals, MountainTotals};
use gapakerem_shared::Masked;

const BOOKING_COLUMNS: &str = "b.id, b.id_user, b.id_trip, b.trip_type, b.total_participants, \
     b.name_participants, b.no_hp, b.meeting_point, b.total_price, b.payment_proof, \
     b.payment_status, b.created_at";

// ============================================================================
// Row mapping
// ============================================================================

#[derive(FromRow)]
struct TripRow {
    id: i32,
    mountain_name: String,
    mountain_photo: Option<String>,
    price: i64,
    trip_type: String,
    total_participants: i32,
    equipment: String,
    estimation_time: String,
}

impl TryFrom<TripRow> for Trip {
    type Error = StoreError;

    fn try_from(row: TripRow) -> Result<Self, Self::Error> {
        Ok(Trip {
            id: row.id,
            mountain_name: row.mountain_name,
            mountain_photo: row.mountain_photo,
            price: row.price,
            trip_type: row.trip_type.parse::<TripType>()?,
            total_participants: row.total_participants,
            equipment: row.equipment,
            estimation_time: row.estimation_time,
        })
    }
}

#[derive(FromRow)]
struct OpenTripRow {
    id: i32,
    id_trip: i32,
    id_guide: Option<i32>,
    traveling_time: String,
    agenda: String,
}

#[derive(FromRow)]
struct PrivateTripRow {
    id: i32,
    id_trip: i32,
    price_per_day: i64,
}

/// Guides and porters share a shape
#[derive(FromRow)]
struct PersonRow {
    id: i32,
    name: String,
    photo: Option<String>,
}

#[derive(FromRow)]
struct BookingRow {
    id: i32,
    id_user: i32,
    id_trip: i32,
    trip_type: String,
    total_participants: i32,
    name_participants: String,
    no_hp: String,
    meeting_point: String,
    total_price: i64,
    payment_proof: Option<String>,
    payment_status: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<BookingRow> for TripBooking {
    type Error = StoreError;

    fn try_from(row: BookingRow) -> Result<Self, Self::Error> {
        Ok(TripBooking {
            id: row.id,
            id_user: row.id_user,
            id_trip: row.id_trip,
            trip_type: row.trip_type.parse::<TripType>()?,
            total_participants: row.total_participants,
            name_participants: row.name_participants,
            no_hp: Masked(row.no_hp),
            meeting_point: row.meeting_point,
            total_price: row.total_price,
            payment_proof: row.payment_proof,
            payment_status: row.payment_status.parse::<PaymentStatus>()?,
            created_at: row.created_at,
        })
    }
}

#[derive(FromRow)]
struct BookingListingRow {
    #[sqlx(flatten)]
    booking: BookingRow,
    mountain_name: String,
}

#[derive(FromRow)]
struct PrivateBookingRow {
    id: i32,
    id_trip_booking: i32,
    id_guide: i32,
    total_days: i32,
    start_date: NaiveDate,
}

impl From<PrivateBookingRow> for PrivateTripBooking {
    fn from(row: PrivateBookingRow) -> Self {
        PrivateTripBooking {
            id: row.id,
            id_trip_booking: row.id_trip_booking,
            id_guide: row.id_guide,
            total_days: row.total_days,
            start_date: row.start_date,
        }
    }
}

#[derive(FromRow)]
struct FeedbackRow {
    id: i32,
    id_trip_booking: i32,
    message: String,
    rating: i32,
    created_at: DateTime<Utc>,
}

impl From<FeedbackRow> for Feedback {
    fn from(row: FeedbackRow) -> Self {
        Feedback {
            id: row.id,
            id_trip_booking: row.id_trip_booking,
            message: row.message,
            rating: row.rating,
            created_at: row.created_at,
        }
    }
}

#[derive(FromRow)]
struct FeedbackListingRow {
    #[sqlx(flatten)]
    feedback: FeedbackRow,
    mountain_name: String,
    mountain_photo: Option<String>,
}

#[derive(FromRow)]
struct TotalsRow {
    bookings: i64,
    participants: i64,
    revenue: i64,
}

#[derive(FromRow)]
struct MountainTotalsRow {
    mountain_name: String,
    total_participants: i64,
    total_price: i64,
}

// ============================================================================
// Dynamic predicates
// ============================================================================

/// Escapes LIKE wildcards so the term matches literally
fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

fn push_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &BookingFilter) {
    qb.push(" WHERE TRUE");
    if let Some(trip_type) = filter.trip_type {
        qb.push(" AND b.trip_type = ").push_bind(trip_type.as_str());
    }
    if let Some(id_user) = filter.id_user {
        qb.push(" AND b.id_user = ").push_bind(id_user);
    }
    if let Some(term) = &filter.search {
        let pattern = like_pattern(term);
        qb.push(" AND (b.name_participants ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR b.meeting_point ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
}

fn push_scope(qb: &mut QueryBuilder<'_, Postgres>, scope: &BookingScope) {
    qb.push(" WHERE TRUE");
    if let Some(trip_type) = scope.trip_type {
        qb.push(" AND b.trip_type = ").push_bind(trip_type.as_str());
    }
    if let Some(status) = scope.payment_status {
        qb.push(" AND b.payment_status = ").push_bind(status.as_str());
    }
    if let Some(from) = scope.created_from {
        qb.push(" AND b.created_at >= ").push_bind(from);
    }
    if let Some(before) = scope.created_before {
        qb.push(" AND b.created_at < ").push_bind(before);
    }
}

// ============================================================================
// Store
// ============================================================================

/// Postgres-backed [`ReferenceStore`]
#[derive(Clone)]
pub struct PgReferenceStore {
    pool: PgPool,
}

impl PgReferenceStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReferenceStore for PgReferenceStore {
    async fn begin(&self) -> StoreResult<Box<dyn StoreTx>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgTx { tx }))
    }
}

/// An open Postgres transaction. Dropping it without `commit` rolls back.
pub struct PgTx {
    tx: Transaction<'static, Postgres>,
}

impl PgTx {
    async fn fetch_person(&mut self, sql: &str, id: i32) -> StoreResult<Option<PersonRow>> {
        let row = sqlx::query_as::<_, PersonRow>(sql)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(row)
    }

    async fn fetch_people(&mut self, sql: &str, id: i32) -> StoreResult<Vec<Porter>> {
        let rows = sqlx::query_as::<_, PersonRow>(sql)
            .bind(id)
            .fetch_all(&mut *self.tx)
            .await?;
        Ok(rows.into_iter().map(porter_from_row).collect())
    }

    async fn fetch_booking(&mut self, id: i32, for_update: bool) -> StoreResult<Option<TripBooking>> {
        let mut sql = format!("SELECT {} FROM trip_bookings b WHERE b.id = $1", BOOKING_COLUMNS);
        if for_update {
            sql.push_str(" FOR UPDATE");
        }
        let row = sqlx::query_as::<_, BookingRow>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        row.map(TripBooking::try_from).transpose()
    }
}

fn porter_from_row(row: PersonRow) -> Porter {
    Porter { id: row.id, name: row.name, photo: row.photo }
}

#[async_trait]
impl StoreTx for PgTx {
    async fn find_trip(&mut self, id: i32) -> StoreResult<Option<Trip>> {
        let row = sqlx::query_as::<_, TripRow>(
            "SELECT id, mountain_name, mountain_photo, price, trip_type, total_participants, \
             equipment, estimation_time FROM trips WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;
        row.map(Trip::try_from).transpose()
    }

    async fn find_open_trip(&mut self, id_trip: i32) -> StoreResult<Option<OpenTrip>> {
        let row = sqlx::query_as::<_, OpenTripRow>(
            "SELECT id, id_trip, id_guide, traveling_time, agenda FROM open_trips WHERE id_trip = $1",
        )
        .bind(id_trip)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(row.map(|r| OpenTrip {
            id: r.id,
            id_trip: r.id_trip,
            id_guide: r.id_guide,
            traveling_time: r.traveling_time,
            agenda: r.agenda,
        }))
    }

    async fn find_private_trip(&mut self, id_trip: i32) -> StoreResult<Option<PrivateTrip>> {
        let row = sqlx::query_as::<_, PrivateTripRow>(
            "SELECT id, id_trip, price_per_day FROM private_trips WHERE id_trip = $1",
        )
        .bind(id_trip)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(row.map(|r| PrivateTrip { id: r.id, id_trip: r.id_trip, price_per_day: r.price_per_day }))
    }

    async fn find_guide(&mut self, id: i32) -> StoreResult<Option<Guide>> {
        let row = self
            .fetch_person("SELECT id, name, photo FROM guides WHERE id = $1", id)
            .await?;
        Ok(row.map(|r| Guide { id: r.id, name: r.name, photo: r.photo }))
    }

    async fn find_porters(&mut self, ids: &[i32]) -> StoreResult<Vec<Porter>> {
        let rows = sqlx::query_as::<_, PersonRow>(
            "SELECT id, name, photo FROM porters WHERE id = ANY($1) ORDER BY id",
        )
        .bind(ids)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(rows.into_iter().map(porter_from_row).collect())
    }

    async fn open_trip_porters(&mut self, id_open_trip: i32) -> StoreResult<Vec<Porter>> {
        self.fetch_people(
            "SELECT p.id, p.name, p.photo FROM porters p \
             JOIN open_trip_porters otp ON otp.id_porter = p.id \
             WHERE otp.id_open_trip = $1 ORDER BY p.id",
            id_open_trip,
        )
        .await
    }

    async fn increment_trip_participants(&mut self, id_trip: i32, delta: i32) -> StoreResult<()> {
        let result = sqlx::query(
            "UPDATE trips SET total_participants = total_participants + $1 WHERE id = $2",
        )
        .bind(delta)
        .bind(id_trip)
        .execute(&mut *self.tx)
        .await?;
        if result.rows_affected() == 0 {
            return Err(format!("trip {} does not exist", id_trip).into());
        }
        Ok(())
    }

    async fn count_trips(&mut self, trip_type: TripType) -> StoreResult<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM trips WHERE trip_type = $1")
            .bind(trip_type.as_str())
            .fetch_one(&mut *self.tx)
            .await?;
        Ok(count)
    }

    async fn insert_booking(&mut self, booking: &NewTripBooking) -> StoreResult<TripBooking> {
        let sql = format!(
            "INSERT INTO trip_bookings AS b (id_user, id_trip, trip_type, total_participants, \
             name_participants, no_hp, meeting_point, total_price, payment_status) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 'unpaid') RETURNING {}",
            BOOKING_COLUMNS
        );
        let row = sqlx::query_as::<_, BookingRow>(&sql)
            .bind(booking.id_user)
            .bind(booking.id_trip)
            .bind(booking.trip_type.as_str())
            .bind(booking.total_participants)
            .bind(&booking.name_participants)
            .bind(booking.no_hp.expose())
            .bind(&booking.meeting_point)
            .bind(booking.total_price)
            .fetch_one(&mut *self.tx)
            .await?;
        let booking = TripBooking::try_from(row)?;
        debug!(id = booking.id, id_trip = booking.id_trip, "inserted trip booking");
        Ok(booking)
    }

    async fn insert_private_booking(
        &mut self,
        detail: &NewPrivateTripBooking,
    ) -> StoreResult<PrivateTripBooking> {
        let row = sqlx::query_as::<_, PrivateBookingRow>(
            "INSERT INTO private_trip_bookings (id_trip_booking, id_guide, total_days, start_date) \
             VALUES ($1, $2, $3, $4) \
             RETURNING id, id_trip_booking, id_guide, total_days, start_date",
        )
        .bind(detail.id_trip_booking)
        .bind(detail.id_guide)
        .bind(detail.total_days)
        .bind(detail.start_date)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(row.into())
    }

    async fn insert_porter_links(
        &mut self,
        id_private_trip_booking: i32,
        porter_ids: &[i32],
    ) -> StoreResult<u64> {
        let result = sqlx::query(
            "INSERT INTO porter_private_trip_bookings (id_private_trip_booking, id_porter) \
             SELECT $1, UNNEST($2::int4[])",
        )
        .bind(id_private_trip_booking)
        .bind(porter_ids)
        .execute(&mut *self.tx)
        .await?;
        Ok(result.rows_affected())
    }

    async fn find_booking(&mut self, id: i32) -> StoreResult<Option<TripBooking>> {
        self.fetch_booking(id, false).await
    }

    async fn lock_booking(&mut self, id: i32) -> StoreResult<Option<TripBooking>> {
        self.fetch_booking(id, true).await
    }

    async fn find_private_booking(
        &mut self,
        id_trip_booking: i32,
    ) -> StoreResult<Option<PrivateTripBooking>> {
        let row = sqlx::query_as::<_, PrivateBookingRow>(
            "SELECT id, id_trip_booking, id_guide, total_days, start_date \
             FROM private_trip_bookings WHERE id_trip_booking = $1",
        )
        .bind(id_trip_booking)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn private_booking_porters(
        &mut self,
        id_private_trip_booking: i32,
    ) -> StoreResult<Vec<Porter>> {
        self.fetch_people(
            "SELECT p.id, p.name, p.photo FROM porters p \
             JOIN porter_private_trip_bookings pp ON pp.id_porter = p.id \
             WHERE pp.id_private_trip_booking = $1 ORDER BY pp.id",
            id_private_trip_booking,
        )
        .await
    }

    async fn set_payment_proof(
        &mut self,
        id: i32,
        url: &str,
        status: PaymentStatus,
    ) -> StoreResult<TripBooking> {
        let sql = format!(
            "UPDATE trip_bookings AS b SET payment_proof = $1, payment_status = $2 \
             WHERE b.id = $3 RETURNING {}",
            BOOKING_COLUMNS
        );
        let row = sqlx::query_as::<_, BookingRow>(&sql)
            .bind(url)
            .bind(status.as_str())
            .bind(id)
            .fetch_one(&mut *self.tx)
            .await?;
        TripBooking::try_from(row)
    }

    async fn set_payment_status(&mut self, id: i32, status: PaymentStatus) -> StoreResult<TripBooking> {
        let sql = format!(
            "UPDATE trip_bookings AS b SET payment_status = $1 WHERE b.id = $2 RETURNING {}",
            BOOKING_COLUMNS
        );
        let row = sqlx::query_as::<_, BookingRow>(&sql)
            .bind(status.as_str())
            .bind(id)
            .fetch_one(&mut *self.tx)
            .await?;
        TripBooking::try_from(row)
    }

    async fn count_bookings(&mut self, filter: &BookingFilter) -> StoreResult<i64> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM trip_bookings b");
        push_filter(&mut qb, filter);
        let count = qb.build_query_scalar::<i64>().fetch_one(&mut *self.tx).await?;
        Ok(count)
    }

    async fn list_bookings(
        &mut self,
        filter: &BookingFilter,
        page: Option<&Pagination>,
    ) -> StoreResult<Vec<BookingListing>> {
        let mut qb = QueryBuilder::<Postgres>::new(format!(
            "SELECT {}, t.mountain_name FROM trip_bookings b JOIN trips t ON t.id = b.id_trip",
            BOOKING_COLUMNS
        ));
        push_filter(&mut qb, filter);
        qb.push(" ORDER BY b.id");
        if let Some(page) = page {
            qb.push(" LIMIT ")
                .push_bind(i64::from(page.limit()))
                .push(" OFFSET ")
                .push_bind(page.offset_i64());
        }

        let rows = qb
            .build_query_as::<BookingListingRow>()
            .fetch_all(&mut *self.tx)
            .await?;
        rows.into_iter()
            .map(|row| -> StoreResult<BookingListing> {
                Ok(BookingListing {
                    booking: TripBooking::try_from(row.booking)?,
                    mountain_name: row.mountain_name,
                })
            })
            .collect()
    }

    async fn booking_totals(&mut self, scope: &BookingScope) -> StoreResult<BookingTotals> {
        let mut qb = QueryBuilder::<Postgres>::new(
            "SELECT COUNT(*)::BIGINT AS bookings, \
             COALESCE(SUM(b.total_participants), 0)::BIGINT AS participants, \
             COALESCE(SUM(b.total_price), 0)::BIGINT AS revenue \
             FROM trip_bookings b",
        );
        push_scope(&mut qb, scope);
        let row = qb.build_query_as::<TotalsRow>().fetch_one(&mut *self.tx).await?;
        Ok(BookingTotals {
            bookings: row.bookings,
            participants: row.participants,
            revenue: row.revenue,
        })
    }

    async fn mountain_totals(&mut self, scope: &BookingScope) -> StoreResult<Vec<MountainTotals>> {
        let mut qb = QueryBuilder::<Postgres>::new(
            "SELECT t.mountain_name, \
             SUM(b.total_participants)::BIGINT AS total_participants, \
             SUM(b.total_price)::BIGINT AS total_price \
             FROM trip_bookings b JOIN trips t ON t.id = b.id_trip",
        );
        push_scope(&mut qb, scope);
        qb.push(" GROUP BY t.mountain_name ORDER BY t.mountain_name");
        let rows = qb
            .build_query_as::<MountainTotalsRow>()
            .fetch_all(&mut *self.tx)
            .await?;
        Ok(rows
            .into_iter()
            .map(|r| MountainTotals {
                mountain_name: r.mountain_name,
                total_participants: r.total_participants,
                total_price: r.total_price,
            })
            .collect())
    }

    async fn find_feedback(&mut self, id_trip_booking: i32) -> StoreResult<Option<Feedback>> {
        let row = sqlx::query_as::<_, FeedbackRow>(
            "SELECT id, id_trip_booking, message, rating, created_at \
             FROM feedbacks WHERE id_trip_booking = $1",
        )
        .bind(id_trip_booking)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn insert_feedback(&mut self, feedback: &NewFeedback) -> StoreResult<Feedback> {
        let row = sqlx::query_as::<_, FeedbackRow>(
            "INSERT INTO feedbacks (id_trip_booking, message, rating) VALUES ($1, $2, $3) \
             RETURNING id, id_trip_booking, message, rating, created_at",
        )
        .bind(feedback.id_trip_booking)
        .bind(&feedback.message)
        .bind(feedback.rating)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(row.into())
    }

    async fn count_feedback(&mut self) -> StoreResult<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM feedbacks")
            .fetch_one(&mut *self.tx)
            .await?;
        Ok(count)
    }

    async fn list_feedback(&mut self, page: &Pagination) -> StoreResult<Vec<FeedbackListing>> {
        let rows = sqlx::query_as::<_, FeedbackListingRow>(
            "SELECT f.id, f.id_trip_booking, f.message, f.rating, f.created_at, \
             t.mountain_name, t.mountain_photo \
             FROM feedbacks f \
             JOIN trip_bookings b ON b.id = f.id_trip_booking \
             JOIN trips t ON t.id = b.id_trip \
             ORDER BY f.id LIMIT $1 OFFSET $2",
        )
        .bind(i64::from(page.limit()))
        .bind(page.offset_i64())
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(rows
            .into_iter()
            .map(|r| FeedbackListing {
                feedback: r.feedback.into(),
                mountain_name: r.mountain_name,
                mountain_photo: r.mountain_photo,
            })
            .collect())
    }

    async fn average_rating(&mut self, id_trip: i32) -> StoreResult<Option<f64>> {
        let avg = sqlx::query_scalar::<_, Option<f64>>(
            "SELECT AVG(f.rating)::FLOAT8 FROM feedbacks f \
             JOIN trip_bookings b ON b.id = f.id_trip_booking WHERE b.id_trip = $1",
        )
        .bind(id_trip)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(avg)
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        self.tx.commit().await?;
        Ok(())
    }
}
