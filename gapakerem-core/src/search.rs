use gapakerem_catalog::TripType;
use serde::{Deserialize, Serialize};

use crate::booking::TripBooking;

pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_LIMIT: u32 = 10;

/// Declarative booking filter. Every predicate is optional; a booking
/// matches when all present predicates hold.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookingFilter {
    pub trip_type: Option<TripType>,
    pub id_user: Option<i32>,
    /// Case-insensitive substring over participant names or meeting point
    pub search: Option<String>,
}

impl BookingFilter {
    pub fn trip_type(mut self, trip_type: TripType) -> Self {
        self.trip_type = Some(trip_type);
        self
    }

    pub fn owned_by(mut self, id_user: i32) -> Self {
        self.id_user = Some(id_user);
        self
    }

    /// Blank search terms are dropped
    pub fn search(mut self, term: Option<&str>) -> Self {
        self.search = term
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string);
        self
    }

    pub fn matches(&self, booking: &TripBooking) -> bool {
        if let Some(trip_type) = self.trip_type {
            if booking.trip_type != trip_type {
                return false;
            }
        }
        if let Some(id_user) = self.id_user {
            if booking.id_user != id_user {
                return false;
            }
        }
        if let Some(term) = &self.search {
            let term = term.to_lowercase();
            let hit = booking.name_participants.to_lowercase().contains(&term)
                || booking.meeting_point.to_lowercase().contains(&term);
            if !hit {
                return false;
            }
        }
        true
    }
}

/// Page window. Construct through [`Pagination::new`] so both values are
/// at least 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    page: u32,
    limit: u32,
}

impl Pagination {
    /// Missing or non-positive values fall back to page 1, limit 10;
    /// values beyond `u32::MAX` saturate
    pub fn new(page: Option<i64>, limit: Option<i64>) -> Self {
        let page = page.filter(|p| *p > 0).map_or(DEFAULT_PAGE, saturate);
        let limit = limit.filter(|l| *l > 0).map_or(DEFAULT_LIMIT, saturate);
        Self { page, limit }
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.limit)
    }

    /// Offset as a SQL `BIGINT`, saturating at `i64::MAX`
    pub fn offset_i64(&self) -> i64 {
        i64::try_from(self.offset()).unwrap_or(i64::MAX)
    }
}

fn saturate(value: i64) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}

impl Default for Pagination {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// Pagination block returned next to a page of results
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PageInfo {
    pub limit: u32,
    pub current_page: u32,
    pub last_page: u64,
    pub total_data: u64,
}

impl PageInfo {
    /// `last_page = ceil(total / limit)`
    pub fn new(pagination: &Pagination, total_data: u64) -> Self {
        let limit = u64::from(pagination.limit());
        Self {
            limit: pagination.limit(),
            current_page: pagination.page(),
            last_page: total_data.div_ceil(limit),
            total_data,
        }
    }
}

/// Booking row joined with the trip's mountain name
#[derive(Debug, Clone, PartialEq)]
pub struct BookingListing {
    pub booking: TripBooking,
    pub mountain_name: String,
}
