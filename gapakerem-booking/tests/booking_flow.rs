use async_trait::async_trait;
use chrono::{Days, TimeZone, Utc};
use std::sync::Mutex;

use gapakerem_booking::queries::BookingQuery;
use gapakerem_booking::*;
use gapakerem_catalog::{Guide, OpenTrip, Porter, PricingEngine, PrivateTrip, Trip, TripType};
use gapakerem_core::booking::{
    CreateBookingRequest, CreatePrivateBookingRequest, PrivateTripRequest, TripBooking,
};
use gapakerem_core::feedback::CreateFeedbackRequest;
use gapakerem_core::payment::ProofUpload;
use gapakerem_core::{AuthUser, ErrorKind, ObjectStore, PaymentStatus, StoreError};
use gapakerem_store::MemoryStore;

const MAX_PROOF: usize = 2 * 1024 * 1024;

#[derive(Default)]
struct RecordingObjectStore {
    uploads: Mutex<Vec<String>>,
}

#[async_trait]
impl ObjectStore for RecordingObjectStore {
    async fn upload(&self, _bytes: Vec<u8>, _content_type: &str, folder: &str) -> Result<String, StoreError> {
        let mut uploads = self.uploads.lock().unwrap();
        let url = format!("https://img.test/{}/{}.jpg", folder, uploads.len() + 1);
        uploads.push(url.clone());
        Ok(url)
    }
}

fn trip(id: i32, trip_type: TripType, price: i64, mountain: &str) -> Trip {
    Trip {
        id,
        mountain_name: mountain.to_string(),
        mountain_photo: Some(format!("https://img.test/{}.jpg", mountain.to_lowercase())),
        price,
        trip_type,
        total_participants: 10,
        equipment: "Tent, carrier".to_string(),
        estimation_time: "3 days".to_string(),
    }
}

/// Trip 1 is open (500,000), trip 2 is private (200,000 + 100,000/day)
async fn seeded() -> MemoryStore {
    let store = MemoryStore::new();
    store.add_trip(trip(1, TripType::Open, 500_000, "Rinjani")).await;
    store.add_trip(trip(2, TripType::Private, 200_000, "Semeru")).await;
    store.add_guide(Guide { id: 1, name: "Wayan".to_string(), photo: None }).await;
    store.add_guide(Guide { id: 2, name: "Ketut".to_string(), photo: Some("k.jpg".to_string()) }).await;
    for id in 1..=5 {
        store.add_porter(Porter { id, name: format!("Porter {}", id), photo: None }).await;
    }
    store
        .add_open_trip(
            OpenTrip {
                id: 1,
                id_trip: 1,
                id_guide: Some(1),
                traveling_time: "06:00".to_string(),
                agenda: "Summit attack".to_string(),
            },
            &[1, 2],
        )
        .await;
    store.add_private_trip(PrivateTrip { id: 1, id_trip: 2, price_per_day: 100_000 }).await;
    store
}

fn booking_request(id_trip: i32, participants: i32) -> CreateBookingRequest {
    CreateBookingRequest {
        id_trip,
        total_participants: participants,
        name_participants: "Andi, Budi, Citra".to_string(),
        no_hp: "081234567890".to_string(),
        meeting_point: "Basecamp Sembalun".to_string(),
    }
}

fn private_request(participants: i32, days: i32, porters: Vec<i32>) -> CreatePrivateBookingRequest {
    CreatePrivateBookingRequest {
        booking: booking_request(2, participants),
        private_trip: PrivateTripRequest {
            id_guide: 2,
            total_days: days,
            start_date: Utc::now().date_naive().checked_add_days(Days::new(30)).unwrap(),
            porters,
        },
    }
}

fn jpeg() -> ProofUpload {
    ProofUpload {
        file_name: Some("transfer.jpg".to_string()),
        content_type: "image/jpeg".to_string(),
        bytes: vec![0xFF, 0xD8, 0xFF, 0xE0],
    }
}

async fn open_booking(store: &MemoryStore, user: &AuthUser, participants: i32) -> TripBooking {
    create_open_booking(store, &PricingEngine::default(), user, &booking_request(1, participants))
        .await
        .unwrap()
}

#[tokio::test]
async fn open_booking_total_is_price_times_participants() {
    let store = seeded().await;
    for participants in [1, 3, 7] {
        let booking = open_booking(&store, &AuthUser::user(7), participants).await;
        assert_eq!(booking.total_price, 500_000 * i64::from(participants));
        assert_eq!(booking.payment_status, PaymentStatus::Unpaid);
        assert_eq!(booking.payment_proof, None);
    }
}

#[tokio::test]
async fn private_booking_charges_porters_beyond_free_allotment() {
    let store = seeded().await;
    let receipt = create_private_booking(
        &store,
        &PricingEngine::default(),
        &AuthUser::user(7),
        &private_request(2, 3, vec![1, 2, 3, 4, 5]),
    )
    .await
    .unwrap();

    assert_eq!(receipt.booking.total_price, 1_400_000);
    assert_eq!(receipt.booking.trip_type, TripType::Private);
    assert_eq!(receipt.private_trip_booking.detail.id_guide, 2);
    assert_eq!(receipt.private_trip_booking.detail.total_days, 3);
    assert_eq!(store.booking_row_counts().await, (1, 1, 5));
}

#[tokio::test]
async fn private_booking_within_free_porters_has_no_surcharge() {
    let store = seeded().await;
    let receipt = create_private_booking(
        &store,
        &PricingEngine::default(),
        &AuthUser::user(7),
        &private_request(1, 2, vec![1, 2, 3]),
    )
    .await
    .unwrap();
    assert_eq!(receipt.booking.total_price, 200_000 + 2 * 100_000);
}

#[tokio::test]
async fn unknown_porter_leaves_no_rows_behind() {
    let store = seeded().await;
    let err = create_private_booking(
        &store,
        &PricingEngine::default(),
        &AuthUser::user(7),
        &private_request(2, 3, vec![1, 2, 99]),
    )
    .await
    .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(store.booking_row_counts().await, (0, 0, 0));
}

#[tokio::test]
async fn failure_after_partial_writes_rolls_back_everything() {
    let store = seeded().await;
    store.inject_fault("insert_porter_links");

    let err = create_private_booking(
        &store,
        &PricingEngine::default(),
        &AuthUser::user(7),
        &private_request(2, 3, vec![1, 2]),
    )
    .await
    .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Internal);
    assert_eq!(store.booking_row_counts().await, (0, 0, 0));
}

#[tokio::test]
async fn missing_guide_or_trip_is_not_found() {
    let store = seeded().await;
    let mut request = private_request(2, 3, vec![1]);
    request.private_trip.id_guide = 42;
    let err = create_private_booking(&store, &PricingEngine::default(), &AuthUser::user(7), &request)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let err = create_open_booking(
        &store,
        &PricingEngine::default(),
        &AuthUser::user(7),
        &booking_request(42, 1),
    )
    .await
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn empty_porter_list_is_rejected_before_store_access() {
    let store = seeded().await;
    store.inject_fault("find_trip");
    let err = create_private_booking(
        &store,
        &PricingEngine::default(),
        &AuthUser::user(7),
        &private_request(2, 3, vec![]),
    )
    .await
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(
        err.to_string(),
        "Validation failed: private_trip.porters: at least one porter is required"
    );
}

#[tokio::test]
async fn approval_increments_occupancy_exactly_once() {
    let store = seeded().await;
    let objects = RecordingObjectStore::default();
    let owner = AuthUser::user(7);
    let admin = AuthUser::admin(1);

    let booking = open_booking(&store, &owner, 3).await;
    upload_payment_proof(&store, &objects, &owner, booking.id, Some(&jpeg()), MAX_PROOF)
        .await
        .unwrap();

    let receipt = update_payment_status(&store, &admin, booking.id, "approved").await.unwrap();
    assert_eq!(receipt.payment_status, PaymentStatus::Approved);
    assert_eq!(store.trip(1).await.unwrap().total_participants, 13);

    let err = update_payment_status(&store, &admin, booking.id, "approved").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(store.trip(1).await.unwrap().total_participants, 13);

    let err = update_payment_status(&store, &admin, booking.id, "rejected").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
}

#[tokio::test]
async fn concurrent_approvals_apply_occupancy_once() {
    let store = seeded().await;
    let objects = RecordingObjectStore::default();
    let owner = AuthUser::user(7);
    let admin = AuthUser::admin(1);

    let booking = open_booking(&store, &owner, 4).await;
    upload_payment_proof(&store, &objects, &owner, booking.id, Some(&jpeg()), MAX_PROOF)
        .await
        .unwrap();

    let (first, second) = tokio::join!(
        update_payment_status(&store, &admin, booking.id, "approved"),
        update_payment_status(&store, &admin, booking.id, "approved"),
    );
    let results = [first, second];
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    let conflict = results.iter().find_map(|r| r.as_ref().err()).unwrap();
    assert_eq!(conflict.kind(), ErrorKind::Conflict);
    assert_eq!(store.trip(1).await.unwrap().total_participants, 14);
}

#[tokio::test]
async fn open_trip_without_extension_is_not_found() {
    let store = seeded().await;
    store.add_trip(trip(3, TripType::Open, 300_000, "Merbabu")).await;

    let err = create_open_booking(
        &store,
        &PricingEngine::default(),
        &AuthUser::user(7),
        &booking_request(3, 2),
    )
    .await
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(store.booking_row_counts().await, (0, 0, 0));
}

#[tokio::test]
async fn unpaid_booking_cannot_be_reviewed() {
    let store = seeded().await;
    let booking = open_booking(&store, &AuthUser::user(7), 2).await;

    for status in ["approved", "rejected"] {
        let err = update_payment_status(&store, &AuthUser::admin(1), booking.id, status)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }
    assert_eq!(store.trip(1).await.unwrap().total_participants, 10);
}

#[tokio::test]
async fn proof_resubmission_only_after_rejection() {
    let store = seeded().await;
    let objects = RecordingObjectStore::default();
    let owner = AuthUser::user(7);
    let admin = AuthUser::admin(1);
    let booking = open_booking(&store, &owner, 2).await;

    let first = upload_payment_proof(&store, &objects, &owner, booking.id, Some(&jpeg()), MAX_PROOF)
        .await
        .unwrap();
    assert_eq!(first.payment_status, PaymentStatus::Paid);

    let err = upload_payment_proof(&store, &objects, &owner, booking.id, Some(&jpeg()), MAX_PROOF)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(objects.uploads.lock().unwrap().len(), 1);

    update_payment_status(&store, &admin, booking.id, "rejected").await.unwrap();

    // A rejected payment must be resubmitted before it can be approved.
    let err = update_payment_status(&store, &admin, booking.id, "approved").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    let second = upload_payment_proof(&store, &objects, &owner, booking.id, Some(&jpeg()), MAX_PROOF)
        .await
        .unwrap();
    assert_eq!(second.payment_status, PaymentStatus::Paid);
    assert_ne!(second.payment_proof, first.payment_proof);

    update_payment_status(&store, &admin, booking.id, "approved").await.unwrap();
    assert_eq!(store.trip(1).await.unwrap().total_participants, 12);
}

#[tokio::test]
async fn proof_upload_checks_image_type() {
    let store = seeded().await;
    let objects = RecordingObjectStore::default();
    let owner = AuthUser::user(7);
    let booking = open_booking(&store, &owner, 2).await;

    let pdf = ProofUpload { content_type: "application/pdf".to_string(), ..jpeg() };
    let err = upload_payment_proof(&store, &objects, &owner, booking.id, Some(&pdf), MAX_PROOF)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let err = upload_payment_proof(&store, &objects, &owner, 999, Some(&jpeg()), MAX_PROOF)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn pagination_and_search() {
    let store = seeded().await;
    let admin = AuthUser::admin(1);
    for _ in 0..11 {
        open_booking(&store, &AuthUser::user(7), 1).await;
    }
    let mut request = booking_request(1, 1);
    request.meeting_point = "Terminal Mandalika".to_string();
    create_open_booking(&store, &PricingEngine::default(), &AuthUser::user(8), &request)
        .await
        .unwrap();

    let query = |page: i64, search: Option<&str>| BookingQuery {
        trip_type: Some("open".to_string()),
        search: search.map(str::to_string),
        page: Some(page),
        limit: Some(5),
    };

    let page = list_bookings(&store, &admin, &query(1, None)).await.unwrap();
    assert_eq!(page.bookings.len(), 5);
    assert_eq!(page.pagination.total_data, 12);
    assert_eq!(page.pagination.last_page, 3);
    assert_eq!(page.bookings[0].mountain_name, "Rinjani");

    let last = list_bookings(&store, &admin, &query(3, None)).await.unwrap();
    assert_eq!(last.bookings.len(), 2);

    let beyond = list_bookings(&store, &admin, &query(9, None)).await.unwrap();
    assert!(beyond.bookings.is_empty());
    assert_eq!(beyond.pagination.current_page, 9);

    let found = list_bookings(&store, &admin, &query(1, Some("mandalika"))).await.unwrap();
    assert_eq!(found.pagination.total_data, 1);

    let private = BookingQuery { trip_type: Some("private".to_string()), ..Default::default() };
    let page = list_bookings(&store, &admin, &private).await.unwrap();
    assert_eq!(page.pagination.total_data, 0);
    assert_eq!(page.pagination.limit, 10);
}

#[tokio::test]
async fn booking_detail_branches_on_trip_type() {
    let store = seeded().await;
    let owner = AuthUser::user(7);

    let open = open_booking(&store, &owner, 2).await;
    let detail = get_booking_by_id(&store, &owner, open.id).await.unwrap();
    assert_eq!(detail.guide.unwrap().name, "Wayan");
    assert_eq!(detail.porters.len(), 2);
    assert_eq!(detail.total_days, None);

    let receipt = create_private_booking(
        &store,
        &PricingEngine::default(),
        &owner,
        &private_request(2, 4, vec![3, 4, 5]),
    )
    .await
    .unwrap();
    let detail = get_booking_by_id(&store, &AuthUser::admin(1), receipt.booking.id)
        .await
        .unwrap();
    assert_eq!(detail.guide.unwrap().name, "Ketut");
    let names: Vec<_> = detail.porters.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["Porter 3", "Porter 4", "Porter 5"]);
    assert_eq!(detail.total_days, Some(4));
    assert_eq!(detail.mountain_name, "Semeru");

    let err = get_booking_by_id(&store, &AuthUser::user(8), open.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);
}

#[tokio::test]
async fn my_bookings_are_scoped_to_the_caller() {
    let store = seeded().await;
    let mine = open_booking(&store, &AuthUser::user(7), 1).await;
    let theirs = open_booking(&store, &AuthUser::user(8), 1).await;

    let listed = list_my_bookings(&store, &AuthUser::user(7)).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, mine.id);
    assert_eq!(listed[0].trip_type, TripType::Open);

    let detail = get_my_booking_detail(&store, &AuthUser::user(7), mine.id).await.unwrap();
    assert_eq!(detail.mountain_name, "Rinjani");

    let err = get_my_booking_detail(&store, &AuthUser::user(7), theirs.id)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);
}

#[tokio::test]
async fn feedback_once_per_booking() {
    let store = seeded().await;
    let owner = AuthUser::user(7);
    let booking = open_booking(&store, &owner, 1).await;
    let request = CreateFeedbackRequest {
        id_trip_booking: booking.id,
        message: "Sunrise at the summit was unforgettable".to_string(),
        rating: 4,
    };

    let err = create_feedback(&store, &AuthUser::user(8), &request).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);

    create_feedback(&store, &owner, &request).await.unwrap();
    let err = create_feedback(&store, &owner, &request).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    let other = open_booking(&store, &owner, 1).await;
    create_feedback(
        &store,
        &owner,
        &CreateFeedbackRequest { id_trip_booking: other.id, rating: 5, ..request.clone() },
    )
    .await
    .unwrap();

    let avg = average_rating(&store, 1).await.unwrap();
    assert_eq!(avg.average_rating, Some(4.5));
    assert_eq!(average_rating(&store, 2).await.unwrap().average_rating, None);
    assert_eq!(average_rating(&store, 42).await.unwrap_err().kind(), ErrorKind::NotFound);

    let page = list_feedback(&store, None, None).await.unwrap();
    assert_eq!(page.feedbacks.len(), 2);
    assert_eq!(page.feedbacks[0].trip_booking.trip.mountain_name, "Rinjani");

    let detail = get_booking_by_id(&store, &owner, booking.id).await.unwrap();
    assert_eq!(detail.feedback.unwrap().rating, 4);
}

#[tokio::test]
async fn concurrent_feedback_on_one_booking_conflicts() {
    let store = seeded().await;
    let owner = AuthUser::user(7);
    let booking = open_booking(&store, &owner, 1).await;
    let request = CreateFeedbackRequest {
        id_trip_booking: booking.id,
        message: "Porters were patient the whole way up".to_string(),
        rating: 5,
    };

    let (first, second) = tokio::join!(
        create_feedback(&store, &owner, &request),
        create_feedback(&store, &owner, &request),
    );
    let results = [first, second];
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    let conflict = results.iter().find_map(|r| r.as_ref().err()).unwrap();
    assert_eq!(conflict.kind(), ErrorKind::Conflict);
    assert_eq!(list_feedback(&store, None, None).await.unwrap().pagination.total_data, 1);
}

#[tokio::test]
async fn page_far_past_the_end_is_empty() {
    let store = seeded().await;
    open_booking(&store, &AuthUser::user(7), 1).await;

    let query = BookingQuery {
        trip_type: Some("open".to_string()),
        page: Some(i64::MAX),
        limit: Some(i64::MAX),
        ..Default::default()
    };
    let page = list_bookings(&store, &AuthUser::admin(1), &query).await.unwrap();
    assert!(page.bookings.is_empty());
    assert_eq!(page.pagination.current_page, u32::MAX);
    assert_eq!(page.pagination.total_data, 1);
}

fn back_dated(id: i32, trip: &Trip, status: PaymentStatus, participants: i32, month: u32) -> TripBooking {
    TripBooking {
        id,
        id_user: 7,
        id_trip: trip.id,
        trip_type: trip.trip_type,
        total_participants: participants,
        name_participants: "Andi".to_string(),
        no_hp: "081234567890".into(),
        meeting_point: "Basecamp".to_string(),
        total_price: trip.price * i64::from(participants),
        payment_proof: Some("https://img.test/p.jpg".to_string()),
        payment_status: status,
        created_at: Utc.with_ymd_and_hms(2025, month, 15, 8, 0, 0).unwrap(),
    }
}

#[tokio::test]
async fn dashboard_statistics() {
    let store = seeded().await;
    let open = trip(1, TripType::Open, 500_000, "Rinjani");
    let private = trip(2, TripType::Private, 200_000, "Semeru");
    store.add_booking(back_dated(1, &open, PaymentStatus::Approved, 2, 5)).await;
    store.add_booking(back_dated(2, &open, PaymentStatus::Approved, 1, 5)).await;
    store.add_booking(back_dated(3, &open, PaymentStatus::Paid, 4, 5)).await;
    store.add_booking(back_dated(4, &private, PaymentStatus::Approved, 3, 5)).await;
    store.add_booking(back_dated(5, &private, PaymentStatus::Approved, 1, 6)).await;
    store.add_booking(back_dated(6, &open, PaymentStatus::Unpaid, 1, 6)).await;

    let admin = AuthUser::admin(1);
    let summary = dashboard_summary(&store, &admin).await.unwrap();
    assert_eq!(summary.total_open_trip, 1);
    assert_eq!(summary.total_private_trip, 1);
    assert_eq!(summary.total_open_trip_transactions, 4);
    assert_eq!(summary.total_private_trip_transactions, 2);
    assert_eq!(summary.total_open_trip_participants, 8);
    assert_eq!(summary.total_private_trip_participants, 4);
    assert_eq!(summary.total_unpaid, 1);
    assert_eq!(summary.total_paid, 1);
    assert_eq!(summary.total_revenue, 1_500_000 + 800_000);

    let may = monthly_trip_statistics(&store, &admin, Some(5), Some(2025)).await.unwrap();
    assert_eq!(may.open_trip.total_trips, 1);
    assert_eq!(may.open_trip.trips[0].total_participants, 3);
    assert_eq!(may.open_trip.total_price, 1_500_000);
    assert_eq!(may.private_trip.total_price, 600_000);

    let err = monthly_trip_statistics(&store, &admin, Some(13), Some(2025)).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    let err = monthly_trip_statistics(&store, &admin, None, Some(2025)).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    let err = dashboard_summary(&store, &AuthUser::user(7)).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);
}
