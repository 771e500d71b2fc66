use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use gapakerem_catalog::{Guide, Porter, TripType};
use gapakerem_core::booking::TripBooking;
use gapakerem_core::feedback::Feedback;
use gapakerem_core::search::{BookingFilter, BookingListing, PageInfo, Pagination};
use gapakerem_core::{AuthUser, CoreError, CoreResult, PaymentStatus, ReferenceStore, StoreTx};
use gapakerem_shared::Masked;

/// Query parameters of the admin booking list
#[derive(Debug, Clone, Default)]
pub struct BookingQuery {
    pub trip_type: Option<String>,
    pub search: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

/// One row of the admin booking list
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BookingSummary {
    pub id: i32,
    pub participant_name: String,
    pub phone_number: Masked<String>,
    pub mountain_name: String,
    pub total_price: i64,
    pub payment_proof: Option<String>,
    pub payment_status: PaymentStatus,
}

impl From<BookingListing> for BookingSummary {
    fn from(listing: BookingListing) -> Self {
        let BookingListing { booking, mountain_name } = listing;
        BookingSummary {
            id: booking.id,
            participant_name: booking.name_participants,
            phone_number: booking.no_hp,
            mountain_name,
            total_price: booking.total_price,
            payment_proof: booking.payment_proof,
            payment_status: booking.payment_status,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BookingPage {
    pub bookings: Vec<BookingSummary>,
    pub pagination: PageInfo,
}

/// Guide or porter as shown on a booking
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CrewMember {
    pub name: String,
    pub photo: Option<String>,
}

impl From<Guide> for CrewMember {
    fn from(guide: Guide) -> Self {
        CrewMember { name: guide.name, photo: guide.photo }
    }
}

impl From<Porter> for CrewMember {
    fn from(porter: Porter) -> Self {
        CrewMember { name: porter.name, photo: porter.photo }
    }
}

/// Fully joined view of one booking
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BookingDetail {
    pub id: i32,
    pub participant_name: String,
    pub phone_number: Masked<String>,
    pub mountain_name: String,
    pub total_price: i64,
    pub payment_proof: Option<String>,
    pub status: PaymentStatus,
    pub trip_type: TripType,
    pub guide: Option<CrewMember>,
    pub porters: Vec<CrewMember>,
    pub feedback: Option<Feedback>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_days: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
}

/// A booking as listed to its owner
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MyBooking {
    pub id: i32,
    pub participant_name: String,
    pub phone_number: Masked<String>,
    pub mountain_name: String,
    pub total_price: i64,
    pub payment_proof: Option<String>,
    pub payment_status: PaymentStatus,
    pub trip_type: TripType,
    pub created_at: DateTime<Utc>,
}

impl MyBooking {
    fn new(booking: TripBooking, mountain_name: String) -> Self {
        MyBooking {
            id: booking.id,
            participant_name: booking.name_participants,
            phone_number: booking.no_hp,
            mountain_name,
            total_price: booking.total_price,
            payment_proof: booking.payment_proof,
            payment_status: booking.payment_status,
            trip_type: booking.trip_type,
            created_at: booking.created_at,
        }
    }
}

/// Paginated list of bookings of one trip type, for administrators.
///
/// A page past the end yields an empty list.
pub async fn list_bookings(
    store: &dyn ReferenceStore,
    user: &AuthUser,
    query: &BookingQuery,
) -> CoreResult<BookingPage> {
    user.require_admin()?;
    let trip_type = query
        .trip_type
        .as_deref()
        .unwrap_or_default()
        .parse::<TripType>()
        .map_err(|_| CoreError::ValidationError("trip_type: invalid trip type".to_string()))?;

    let filter = BookingFilter::default()
        .trip_type(trip_type)
        .search(query.search.as_deref());
    let pagination = Pagination::new(query.page, query.limit);

    let mut tx = store.begin().await?;
    let total = tx.count_bookings(&filter).await?;
    let listings = tx.list_bookings(&filter, Some(&pagination)).await?;

    Ok(BookingPage {
        bookings: listings.into_iter().map(BookingSummary::from).collect(),
        pagination: PageInfo::new(&pagination, u64::try_from(total).unwrap_or(0)),
    })
}

async fn load_booking(tx: &mut dyn StoreTx, id: i32) -> CoreResult<TripBooking> {
    tx.find_booking(id)
        .await?
        .ok_or_else(|| CoreError::NotFound(format!("booking {} not found", id)))
}

async fn mountain_name(tx: &mut dyn StoreTx, id_trip: i32) -> CoreResult<String> {
    let trip = tx
        .find_trip(id_trip)
        .await?
        .ok_or_else(|| CoreError::InternalError(format!("trip {} of booking is missing", id_trip)))?;
    Ok(trip.mountain_name)
}

/// Booking with its guide, porters and feedback; owner or administrator only
pub async fn get_booking_by_id(
    store: &dyn ReferenceStore,
    user: &AuthUser,
    id: i32,
) -> CoreResult<BookingDetail> {
    let mut tx = store.begin().await?;
    let booking = load_booking(tx.as_mut(), id).await?;
    if !user.can_access(booking.id_user) {
        return Err(CoreError::Forbidden("you do not have access to this booking".to_string()));
    }

    let mountain_name = mountain_name(tx.as_mut(), booking.id_trip).await?;
    let mut guide = None;
    let mut porters = Vec::new();
    let mut total_days = None;
    let mut start_date = None;

    match booking.trip_type {
        TripType::Private => {
            if let Some(detail) = tx.find_private_booking(booking.id).await? {
                guide = tx.find_guide(detail.id_guide).await?.map(CrewMember::from);
                porters = tx.private_booking_porters(detail.id).await?;
                total_days = Some(detail.total_days);
                start_date = Some(detail.start_date);
            }
        }
        TripType::Open => {
            if let Some(open_trip) = tx.find_open_trip(booking.id_trip).await? {
                if let Some(id_guide) = open_trip.id_guide {
                    guide = tx.find_guide(id_guide).await?.map(CrewMember::from);
                }
                porters = tx.open_trip_porters(open_trip.id).await?;
            }
        }
    }
    let feedback = tx.find_feedback(booking.id).await?;

    Ok(BookingDetail {
        id: booking.id,
        participant_name: booking.name_participants,
        phone_number: booking.no_hp,
        mountain_name,
        total_price: booking.total_price,
        payment_proof: booking.payment_proof,
        status: booking.payment_status,
        trip_type: booking.trip_type,
        guide,
        porters: porters.into_iter().map(CrewMember::from).collect(),
        feedback,
        total_days,
        start_date,
    })
}

/// Every booking made by the caller
pub async fn list_my_bookings(store: &dyn ReferenceStore, user: &AuthUser) -> CoreResult<Vec<MyBooking>> {
    let filter = BookingFilter::default().owned_by(user.id);
    let mut tx = store.begin().await?;
    let listings = tx.list_bookings(&filter, None).await?;
    Ok(listings
        .into_iter()
        .map(|l| MyBooking::new(l.booking, l.mountain_name))
        .collect())
}

/// One of the caller's own bookings
pub async fn get_my_booking_detail(
    store: &dyn ReferenceStore,
    user: &AuthUser,
    id: i32,
) -> CoreResult<MyBooking> {
    let mut tx = store.begin().await?;
    let booking = load_booking(tx.as_mut(), id).await?;
    if booking.id_user != user.id {
        return Err(CoreError::Forbidden("you do not have access to this booking".to_string()));
    }
    let mountain_name = mountain_name(tx.as_mut(), booking.id_trip).await?;
    Ok(MyBooking::new(booking, mountain_name))
}
