use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use gapakerem_catalog::TripType;
use gapakerem_core::stats::{BookingScope, MountainTotals};
use gapakerem_core::{AuthUser, CoreError, CoreResult, PaymentStatus, ReferenceStore};

/// Headline numbers of the admin dashboard
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DashboardSummary {
    pub total_open_trip: i64,
    pub total_private_trip: i64,
    pub total_open_trip_transactions: i64,
    pub total_private_trip_transactions: i64,
    pub total_open_trip_participants: i64,
    pub total_private_trip_participants: i64,
    pub total_unpaid: i64,
    pub total_paid: i64,
    /// Sum of `total_price` over approved bookings
    pub total_revenue: i64,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TripTypeStats {
    pub trips: Vec<MountainTotals>,
    pub total_price: i64,
    /// Number of distinct mountains with approved bookings
    pub total_trips: usize,
}

impl TripTypeStats {
    fn new(trips: Vec<MountainTotals>) -> Self {
        let total_price = trips.iter().map(|t| t.total_price).sum();
        let total_trips = trips.len();
        TripTypeStats { trips, total_price, total_trips }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct MonthlyTripStats {
    pub open_trip: TripTypeStats,
    pub private_trip: TripTypeStats,
}

pub async fn dashboard_summary(store: &dyn ReferenceStore, user: &AuthUser) -> CoreResult<DashboardSummary> {
    user.require_admin()?;
    let mut tx = store.begin().await?;

    let open = tx.booking_totals(&BookingScope::trip_type(TripType::Open)).await?;
    let private = tx.booking_totals(&BookingScope::trip_type(TripType::Private)).await?;

    Ok(DashboardSummary {
        total_open_trip: tx.count_trips(TripType::Open).await?,
        total_private_trip: tx.count_trips(TripType::Private).await?,
        total_open_trip_transactions: open.bookings,
        total_private_trip_transactions: private.bookings,
        total_open_trip_participants: open.participants,
        total_private_trip_participants: private.participants,
        total_unpaid: tx
            .booking_totals(&BookingScope::payment_status(PaymentStatus::Unpaid))
            .await?
            .bookings,
        total_paid: tx
            .booking_totals(&BookingScope::payment_status(PaymentStatus::Paid))
            .await?
            .bookings,
        total_revenue: tx
            .booking_totals(&BookingScope::payment_status(PaymentStatus::Approved))
            .await?
            .revenue,
    })
}

/// `[first day of month, first day of next month)` in UTC
fn month_range(month: u32, year: i32) -> CoreResult<(DateTime<Utc>, DateTime<Utc>)> {
    let invalid = || CoreError::ValidationError("month: must be between 1 and 12".to_string());
    if !(1..=12).contains(&month) {
        return Err(invalid());
    }
    let start = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(invalid)?;
    let end = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    }
    .ok_or_else(|| CoreError::ValidationError("year: out of range".to_string()))?;

    let midnight = |d: NaiveDate| d.and_hms_opt(0, 0, 0).map(|t| t.and_utc());
    match (midnight(start), midnight(end)) {
        (Some(start), Some(end)) => Ok((start, end)),
        _ => Err(CoreError::ValidationError("year: out of range".to_string())),
    }
}

/// Approved bookings of one calendar month, grouped by mountain per trip type
pub async fn monthly_trip_statistics(
    store: &dyn ReferenceStore,
    user: &AuthUser,
    month: Option<u32>,
    year: Option<i32>,
) -> CoreResult<MonthlyTripStats> {
    user.require_admin()?;
    let (month, year) = match (month, year) {
        (Some(m), Some(y)) => (m, y),
        _ => {
            return Err(CoreError::ValidationError(
                "month and year are required".to_string(),
            ))
        }
    };
    let (from, before) = month_range(month, year)?;

    let scope = |trip_type| BookingScope {
        trip_type: Some(trip_type),
        payment_status: Some(PaymentStatus::Approved),
        created_from: Some(from),
        created_before: Some(before),
    };

    let mut tx = store.begin().await?;
    let open = tx.mountain_totals(&scope(TripType::Open)).await?;
    let private = tx.mountain_totals(&scope(TripType::Private)).await?;

    Ok(MonthlyTripStats {
        open_trip: TripTypeStats::new(open),
        private_trip: TripTypeStats::new(private),
    })
}
