pub mod booking;
pub mod feedback;
pub mod identity;
pub mod payment;
pub mod repository;
pub mod search;
pub mod stats;
pub mod storage;

use serde::Serialize;
use validator::{ValidationErrors, ValidationErrorsKind};

pub use booking::{NewPrivateTripBooking, NewTripBooking, PrivateTripBooking, TripBooking};
pub use identity::{AuthUser, Role};
pub use payment::{PaymentStatus, ReviewDecision};
pub use repository::{ReferenceStore, StoreError, StoreResult, StoreTx};
pub use storage::ObjectStore;

/// Machine-checkable category of a [`CoreError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    NotFound,
    Forbidden,
    Conflict,
    UpstreamFailure,
    Internal,
}

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    ValidationError(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    Conflict(String),
    #[error("Upstream service failed: {0}")]
    UpstreamFailure(String),
    #[error("Internal service error: {0}")]
    InternalError(String),
}

impl CoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::ValidationError(_) => ErrorKind::Validation,
            CoreError::NotFound(_) => ErrorKind::NotFound,
            CoreError::Forbidden(_) => ErrorKind::Forbidden,
            CoreError::Conflict(_) => ErrorKind::Conflict,
            CoreError::UpstreamFailure(_) => ErrorKind::UpstreamFailure,
            CoreError::InternalError(_) => ErrorKind::Internal,
        }
    }
}

impl From<StoreError> for CoreError {
    fn from(err: StoreError) -> Self {
        CoreError::InternalError(err.to_string())
    }
}

impl From<ValidationErrors> for CoreError {
    fn from(errors: ValidationErrors) -> Self {
        let mut details = Vec::new();
        flatten_validation_errors(None, &errors, &mut details);
        details.sort();
        CoreError::ValidationError(details.join("; "))
    }
}

impl From<gapakerem_catalog::PricingError> for CoreError {
    fn from(err: gapakerem_catalog::PricingError) -> Self {
        CoreError::ValidationError(err.to_string())
    }
}

pub type CoreResult<T> = Result<T, CoreError>;

/// Collects `field: message` pairs, descending into nested structs and lists.
fn flatten_validation_errors(prefix: Option<&str>, errors: &ValidationErrors, out: &mut Vec<String>) {
    for (field, kind) in errors.errors() {
        let path = match prefix {
            Some(p) => format!("{}.{}", p, field),
            None => field.to_string(),
        };
        match kind {
            ValidationErrorsKind::Field(field_errors) => {
                for err in field_errors {
                    let message = err
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| err.code.to_string());
                    out.push(format!("{}: {}", path, message));
                }
            }
            ValidationErrorsKind::Struct(inner) => {
                flatten_validation_errors(Some(&path), inner, out);
            }
            ValidationErrorsKind::List(items) => {
                for (index, inner) in items {
                    flatten_validation_errors(Some(&format!("{}[{}]", path, index)), inner, out);
                }
            }
        }
    }
}
