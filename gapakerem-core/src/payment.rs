use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{CoreError, CoreResult};

/// Payment state of a booking.
///
/// Legal moves are listed in [`PaymentStatus::allowed_next`]:
///
/// ```text
/// unpaid ──upload──▶ paid ──review──▶ approved (terminal)
///                     ▲  └──review──▶ rejected
///                     └────re-upload───┘
/// ```
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Unpaid,
    Paid,
    Approved,
    Rejected,
}

impl PaymentStatus {
    pub const ALL: [PaymentStatus; 4] = [
        PaymentStatus::Unpaid,
        PaymentStatus::Paid,
        PaymentStatus::Approved,
        PaymentStatus::Rejected,
    ];

    /// Transition table: the states reachable in one step from `self`
    pub fn allowed_next(self) -> &'static [PaymentStatus] {
        match self {
            PaymentStatus::Unpaid => &[PaymentStatus::Paid],
            PaymentStatus::Paid => &[PaymentStatus::Approved, PaymentStatus::Rejected],
            PaymentStatus::Rejected => &[PaymentStatus::Paid],
            PaymentStatus::Approved => &[],
        }
    }

    pub fn can_transition_to(self, next: PaymentStatus) -> bool {
        self.allowed_next().contains(&next)
    }

    pub fn is_terminal(self) -> bool {
        self.allowed_next().is_empty()
    }

    /// Checks `self -> next` against the transition table
    pub fn transition(self, next: PaymentStatus) -> Result<PaymentStatus, InvalidTransition> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(InvalidTransition { from: self, to: next })
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Unpaid => "unpaid",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Approved => "approved",
            PaymentStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unpaid" => Ok(PaymentStatus::Unpaid),
            "paid" => Ok(PaymentStatus::Paid),
            "approved" => Ok(PaymentStatus::Approved),
            "rejected" => Ok(PaymentStatus::Rejected),
            other => Err(CoreError::ValidationError(format!("status: unknown payment status '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("payment status cannot change from {from} to {to}")]
pub struct InvalidTransition {
    pub from: PaymentStatus,
    pub to: PaymentStatus,
}

impl From<InvalidTransition> for CoreError {
    fn from(err: InvalidTransition) -> Self {
        CoreError::Conflict(err.to_string())
    }
}

/// Outcome an administrator may assign to a submitted payment
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ReviewDecision {
    Approved,
    Rejected,
}

impl ReviewDecision {
    /// Parses an admin-supplied target status; only `approved` and `rejected`
    /// are accepted.
    pub fn parse(status: &str) -> CoreResult<Self> {
        match status.parse::<PaymentStatus>() {
            Ok(PaymentStatus::Approved) => Ok(ReviewDecision::Approved),
            Ok(PaymentStatus::Rejected) => Ok(ReviewDecision::Rejected),
            Ok(other) => Err(CoreError::ValidationError(format!(
                "status: payment status cannot be set to {} directly",
                other
            ))),
            Err(_) => Err(CoreError::ValidationError(format!(
                "status: invalid payment status '{}'",
                status
            ))),
        }
    }

    pub fn status(self) -> PaymentStatus {
        match self {
            ReviewDecision::Approved => PaymentStatus::Approved,
            ReviewDecision::Rejected => PaymentStatus::Rejected,
        }
    }
}

// ============================================================================
// Payment proof
// ============================================================================

/// MIME types accepted for a payment proof image
pub const ALLOWED_PROOF_TYPES: [&str; 3] = ["image/jpeg", "image/jpg", "image/png"];

/// Default upper bound for a proof image (2 MiB)
pub const DEFAULT_MAX_PROOF_BYTES: usize = 2 * 1024 * 1024;

/// Object-store folder payment proofs are written to
pub const PROOF_FOLDER: &str = "payment_proofs";

/// An uploaded payment proof image as received from the client
#[derive(Clone, PartialEq, Eq)]
pub struct ProofUpload {
    pub file_name: Option<String>,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl fmt::Debug for ProofUpload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProofUpload")
            .field("file_name", &self.file_name)
            .field("content_type", &self.content_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

impl ProofUpload {
    /// Checks presence, type and size of a proof image
    pub fn validate(upload: Option<&ProofUpload>, max_bytes: usize) -> CoreResult<&ProofUpload> {
        let upload = upload.ok_or_else(|| {
            CoreError::ValidationError("payment_proof: payment proof image is required".to_string())
        })?;

        let content_type = upload.content_type.to_ascii_lowercase();
        if !ALLOWED_PROOF_TYPES.contains(&content_type.as_str()) {
            return Err(CoreError::ValidationError(
                "payment_proof: image must be JPG, JPEG or PNG".to_string(),
            ));
        }

        if upload.bytes.len() > max_bytes {
            return Err(CoreError::ValidationError(format!(
                "payment_proof: image must not exceed {} bytes",
                max_bytes
            )));
        }

        Ok(upload)
    }
}

/// Booking fields returned after a proof upload
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProofReceipt {
    pub id: i32,
    pub payment_proof: Option<String>,
    pub payment_status: PaymentStatus,
}

/// Booking fields returned after an administrator review
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReviewReceipt {
    pub id: i32,
    pub id_trip: i32,
    pub total_participants: i32,
    pub payment_proof: Option<String>,
    pub payment_status: PaymentStatus,
}
