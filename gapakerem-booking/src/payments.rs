use tracing::{info, warn};

use gapakerem_core::booking::TripBooking;
use gapakerem_core::payment::{ProofReceipt, ProofUpload, ReviewReceipt, PROOF_FOLDER};
use gapakerem_core::{
    AuthUser, CoreError, CoreResult, ObjectStore, PaymentStatus, ReferenceStore, ReviewDecision,
};

/// A proof may be (re)submitted while none exists, or after a rejection
fn check_proof_slot(booking: &TripBooking) -> CoreResult<()> {
    let has_live_proof =
        booking.payment_proof.is_some() && booking.payment_status != PaymentStatus::Rejected;
    if has_live_proof || !booking.payment_status.can_transition_to(PaymentStatus::Paid) {
        return Err(CoreError::Conflict("payment proof already submitted".to_string()));
    }
    Ok(())
}

fn check_owner(booking: &TripBooking, user: &AuthUser) -> CoreResult<()> {
    if booking.id_user != user.id {
        return Err(CoreError::Forbidden(
            "you can only upload payment proof for your own booking".to_string(),
        ));
    }
    Ok(())
}

/// Stores the owner's payment proof and moves the booking to `paid`.
///
/// The image upload happens outside the transaction; ownership and proof
/// state are checked again under the row lock before the booking is updated.
pub async fn upload_payment_proof(
    store: &dyn ReferenceStore,
    objects: &dyn ObjectStore,
    user: &AuthUser,
    id_booking: i32,
    upload: Option<&ProofUpload>,
    max_proof_bytes: usize,
) -> CoreResult<ProofReceipt> {
    {
        let mut tx = store.begin().await?;
        let booking = tx
            .find_booking(id_booking)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("booking {} not found", id_booking)))?;
        check_owner(&booking, user)?;
        check_proof_slot(&booking)?;
    }

    let upload = ProofUpload::validate(upload, max_proof_bytes)?;
    let url = objects
        .upload(upload.bytes.clone(), &upload.content_type, PROOF_FOLDER)
        .await
        .map_err(|e| {
            warn!("Payment proof upload for booking {} failed: {}", id_booking, e);
            CoreError::UpstreamFailure("failed to upload payment proof".to_string())
        })?;

    let mut tx = store.begin().await?;
    let booking = tx
        .lock_booking(id_booking)
        .await?
        .ok_or_else(|| CoreError::NotFound(format!("booking {} not found", id_booking)))?;
    if let Err(err) = check_owner(&booking, user).and_then(|_| check_proof_slot(&booking)) {
        warn!("Booking {} changed during proof upload; {} is orphaned", id_booking, url);
        return Err(err);
    }
    let booking = tx.set_payment_proof(id_booking, &url, PaymentStatus::Paid).await?;
    tx.commit().await?;

    info!(id = booking.id, id_user = user.id, "Payment proof submitted");
    Ok(ProofReceipt {
        id: booking.id,
        payment_proof: booking.payment_proof,
        payment_status: booking.payment_status,
    })
}

/// Administrator review of a submitted payment.
///
/// Approval adds the booking's participants to the trip's occupancy counter
/// in the same transaction as the status write.
pub async fn update_payment_status(
    store: &dyn ReferenceStore,
    user: &AuthUser,
    id_booking: i32,
    status: &str,
) -> CoreResult<ReviewReceipt> {
    user.require_admin()?;
    let decision = ReviewDecision::parse(status)?;
    let target = decision.status();

    let mut tx = store.begin().await?;
    let booking = tx
        .lock_booking(id_booking)
        .await?
        .ok_or_else(|| CoreError::NotFound(format!("booking {} not found", id_booking)))?;

    if booking.payment_status == PaymentStatus::Approved {
        return Err(CoreError::Conflict("booking payment is already approved".to_string()));
    }
    if booking.payment_proof.is_none() && booking.payment_status != PaymentStatus::Paid {
        return Err(CoreError::Conflict(
            "payment proof must be submitted before review".to_string(),
        ));
    }
    booking.payment_status.transition(target)?;

    let updated = tx.set_payment_status(id_booking, target).await?;
    if decision == ReviewDecision::Approved {
        tx.increment_trip_participants(updated.id_trip, updated.total_participants)
            .await?;
    }
    tx.commit().await?;

    info!(
        id = updated.id,
        id_trip = updated.id_trip,
        status = %updated.payment_status,
        "Payment status updated"
    );
    Ok(ReviewReceipt {
        id: updated.id,
        id_trip: updated.id_trip,
        total_participants: updated.total_participants,
        payment_proof: updated.payment_proof,
        payment_status: updated.payment_status,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use gapakerem_catalog::{Trip, TripType};
    use gapakerem_core::{ErrorKind, StoreError};
    use gapakerem_store::MemoryStore;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeObjectStore {
        fail: bool,
        calls: AtomicUsize,
    }

    impl FakeObjectStore {
        fn ok() -> Self {
            Self { fail: false, calls: AtomicUsize::new(0) }
        }
    }

    #[async_trait]
    impl ObjectStore for FakeObjectStore {
        async fn upload(&self, _: Vec<u8>, _: &str, folder: &str) -> Result<String, StoreError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err("host unreachable".into());
            }
            Ok(format!("https://img.test/{}/{}.png", folder, n))
        }
    }

    fn png() -> ProofUpload {
        ProofUpload {
            file_name: Some("proof.png".to_string()),
            content_type: "image/png".to_string(),
            bytes: vec![0u8; 64],
        }
    }

    async fn store_with_booking(status: PaymentStatus, proof: Option<&str>) -> MemoryStore {
        let store = MemoryStore::new();
        store
            .add_trip(Trip {
                id: 1,
                mountain_name: "Semeru".to_string(),
                mountain_photo: None,
                price: 500_000,
                trip_type: TripType::Open,
                total_participants: 10,
                equipment: String::new(),
                estimation_time: String::new(),
            })
            .await;
        store
            .add_booking(TripBooking {
                id: 1,
                id_user: 7,
                id_trip: 1,
                trip_type: TripType::Open,
                total_participants: 3,
                name_participants: "Andi, Budi, Citra".to_string(),
                no_hp: "081234567890".into(),
                meeting_point: "Ranu Pani".to_string(),
                total_price: 1_500_000,
                payment_proof: proof.map(str::to_string),
                payment_status: status,
                created_at: Utc::now(),
            })
            .await;
        store
    }

    #[test]
    fn test_proof_slot_rules() {
        let mut booking = TripBooking {
            id: 1,
            id_user: 1,
            id_trip: 1,
            trip_type: TripType::Open,
            total_participants: 1,
            name_participants: "Andi".to_string(),
            no_hp: "081234567890".into(),
            meeting_point: "Ranu Pani".to_string(),
            total_price: 1,
            payment_proof: None,
            payment_status: PaymentStatus::Unpaid,
            created_at: Utc::now(),
        };
        assert!(check_proof_slot(&booking).is_ok());

        booking.payment_proof = Some("u".to_string());
        booking.payment_status = PaymentStatus::Paid;
        assert!(check_proof_slot(&booking).is_err());

        booking.payment_status = PaymentStatus::Rejected;
        assert!(check_proof_slot(&booking).is_ok());

        booking.payment_status = PaymentStatus::Approved;
        assert!(check_proof_slot(&booking).is_err());
    }

    #[tokio::test]
    async fn test_upload_by_other_user_is_forbidden_and_skips_upload() {
        let store = store_with_booking(PaymentStatus::Unpaid, None).await;
        let objects = FakeObjectStore::ok();
        let err = upload_payment_proof(&store, &objects, &AuthUser::user(8), 1, Some(&png()), 1024)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
        assert_eq!(objects.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_upload_failure_is_upstream_and_leaves_booking_unpaid() {
        let store = store_with_booking(PaymentStatus::Unpaid, None).await;
        let objects = FakeObjectStore { fail: true, calls: AtomicUsize::new(0) };
        let err = upload_payment_proof(&store, &objects, &AuthUser::user(7), 1, Some(&png()), 1024)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UpstreamFailure);
        assert_eq!(store.booking(1).await.unwrap().payment_status, PaymentStatus::Unpaid);
    }

    #[tokio::test]
    async fn test_missing_or_oversized_image_is_validation_error() {
        let store = store_with_booking(PaymentStatus::Unpaid, None).await;
        let objects = FakeObjectStore::ok();
        let user = AuthUser::user(7);

        let err = upload_payment_proof(&store, &objects, &user, 1, None, 1024)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err = upload_payment_proof(&store, &objects, &user, 1, Some(&png()), 16)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(objects.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_review_requires_admin() {
        let store = store_with_booking(PaymentStatus::Paid, Some("u")).await;
        let err = update_payment_status(&store, &AuthUser::user(7), 1, "approved")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
    }

    #[tokio::test]
    async fn test_review_of_unpaid_booking_is_conflict() {
        let store = store_with_booking(PaymentStatus::Unpaid, None).await;
        let err = update_payment_status(&store, &AuthUser::admin(1), 1, "rejected")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[tokio::test]
    async fn test_direct_paid_or_unpaid_target_is_validation_error() {
        let store = store_with_booking(PaymentStatus::Paid, Some("u")).await;
        for status in ["paid", "unpaid", "done"] {
            let err = update_payment_status(&store, &AuthUser::admin(1), 1, status)
                .await
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Validation, "status {}", status);
        }
    }

    #[tokio::test]
    async fn test_rejection_leaves_counter_untouched() {
        let store = store_with_booking(PaymentStatus::Paid, Some("u")).await;
        let receipt = update_payment_status(&store, &AuthUser::admin(1), 1, "rejected")
            .await
            .unwrap();
        assert_eq!(receipt.payment_status, PaymentStatus::Rejected);
        assert_eq!(store.trip(1).await.unwrap().total_participants, 10);
    }

    #[tokio::test]
    async fn test_failed_increment_rolls_back_status() {
        let store = store_with_booking(PaymentStatus::Paid, Some("u")).await;
        store.inject_fault("increment_trip_participants");
        let err = update_payment_status(&store, &AuthUser::admin(1), 1, "approved")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert_eq!(store.booking(1).await.unwrap().payment_status, PaymentStatus::Paid);
        assert_eq!(store.trip(1).await.unwrap().total_participants, 10);
    }
}
