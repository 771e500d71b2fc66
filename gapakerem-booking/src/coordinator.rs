use chrono::{NaiveDate, Utc};
use tracing::{debug, info};
use validator::Validate;

use gapakerem_catalog::{PricingEngine, TripType};
use gapakerem_core::booking::{
    CreateBookingRequest, CreatePrivateBookingRequest, NewPrivateTripBooking, NewTripBooking,
    PrivateBookingReceipt, PrivateTripBookingDetail, TripBooking,
};
use gapakerem_core::{AuthUser, CoreError, CoreResult, ReferenceStore};

/// Books a private trip with a chosen guide and porters.
///
/// The booking row, its private-trip detail and every porter link are written
/// in one transaction; any failure leaves none of them behind.
pub async fn create_private_booking(
    store: &dyn ReferenceStore,
    pricing: &PricingEngine,
    user: &AuthUser,
    request: &CreatePrivateBookingRequest,
) -> CoreResult<PrivateBookingReceipt> {
    create_private_booking_on(store, pricing, user, request, Utc::now().date_naive()).await
}

pub(crate) async fn create_private_booking_on(
    store: &dyn ReferenceStore,
    pricing: &PricingEngine,
    user: &AuthUser,
    request: &CreatePrivateBookingRequest,
    today: NaiveDate,
) -> CoreResult<PrivateBookingReceipt> {
    request.validate()?;
    let booking_req = &request.booking;
    let private_req = &request.private_trip;
    if private_req.start_date < today {
        return Err(CoreError::ValidationError(
            "private_trip.start_date: start date cannot be in the past".to_string(),
        ));
    }

    let mut tx = store.begin().await?;

    let trip = tx
        .find_trip(booking_req.id_trip)
        .await?
        .ok_or_else(|| CoreError::NotFound(format!("trip {} not found", booking_req.id_trip)))?;
    let private_trip = tx
        .find_private_trip(trip.id)
        .await?
        .ok_or_else(|| CoreError::NotFound(format!("private trip for trip {} not found", trip.id)))?;
    let guide = tx
        .find_guide(private_req.id_guide)
        .await?
        .ok_or_else(|| CoreError::NotFound(format!("guide {} not found", private_req.id_guide)))?;

    // Repeated ids collapse in the lookup, so they fail this check as well.
    let porters = tx.find_porters(&private_req.porters).await?;
    if porters.len() != private_req.porters.len() {
        return Err(CoreError::NotFound("one or more porters not found".to_string()));
    }

    let quote = pricing.quote_private(
        &trip,
        &private_trip,
        booking_req.total_participants,
        private_req.total_days,
        private_req.porters.len(),
    )?;
    debug!(
        id_trip = trip.id,
        participants_fee = quote.participants_fee,
        daily_fee = quote.daily_fee,
        porter_fee = quote.porter_fee,
        "priced private booking"
    );

    let booking = tx
        .insert_booking(&new_booking(user, booking_req, trip.trip_type, quote.total))
        .await?;
    let detail = tx
        .insert_private_booking(&NewPrivateTripBooking {
            id_trip_booking: booking.id,
            id_guide: guide.id,
            total_days: private_req.total_days,
            start_date: private_req.start_date,
        })
        .await?;
    tx.insert_porter_links(detail.id, &private_req.porters).await?;
    tx.commit().await?;

    info!(
        id = booking.id,
        id_user = user.id,
        id_trip = trip.id,
        total_price = booking.total_price,
        "Private trip booking created"
    );

    Ok(PrivateBookingReceipt {
        booking,
        private_trip_booking: PrivateTripBookingDetail {
            detail,
            porters: private_req.porters.clone(),
        },
    })
}

/// Books a seat group on a shared open trip
pub async fn create_open_booking(
    store: &dyn ReferenceStore,
    pricing: &PricingEngine,
    user: &AuthUser,
    request: &CreateBookingRequest,
) -> CoreResult<TripBooking> {
    request.validate()?;

    let mut tx = store.begin().await?;

    let trip = tx
        .find_trip(request.id_trip)
        .await?
        .ok_or_else(|| CoreError::NotFound(format!("trip {} not found", request.id_trip)))?;
    if trip.trip_type != TripType::Open {
        return Err(CoreError::Conflict(format!(
            "trip {} is a {} trip and cannot be booked as an open trip",
            trip.id, trip.trip_type
        )));
    }
    tx.find_open_trip(trip.id)
        .await?
        .ok_or_else(|| CoreError::NotFound(format!("open trip for trip {} not found", trip.id)))?;

    let quote = pricing.quote_open(&trip, request.total_participants)?;
    let booking = tx
        .insert_booking(&new_booking(user, request, trip.trip_type, quote.total))
        .await?;
    tx.commit().await?;

    info!(
        id = booking.id,
        id_user = user.id,
        id_trip = trip.id,
        total_price = booking.total_price,
        "Open trip booking created"
    );
    Ok(booking)
}

fn new_booking(
    user: &AuthUser,
    request: &CreateBookingRequest,
    trip_type: TripType,
    total_price: i64,
) -> NewTripBooking {
    NewTripBooking {
        id_user: user.id,
        id_trip: request.id_trip,
        trip_type,
        total_participants: request.total_participants,
        name_participants: request.name_participants.clone(),
        no_hp: request.no_hp.as_str().into(),
        meeting_point: request.meeting_point.clone(),
        total_price,
    }
}
