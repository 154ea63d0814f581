//! Error taxonomy surfaced to callers of the engine.
//!
//! Each variant names the invariant that failed so a client can offer a
//! corrective action: reduce the quantity, pick another request, or fix
//! the payload. Only [`FulfillmentError::InconsistentState`] and transient
//! store failures are retryable.

use std::path::PathBuf;

use thiserror::Error;

use crate::ledger::{RecordKind, StoreError};
use crate::types::quantity::from_fixed_trimmed;
use crate::types::{DonationId, RequestId};

fn qty(value: &u64) -> String {
    from_fixed_trimmed(*value)
}

/// Failures of coordinator operations.
#[derive(Debug, Error)]
pub enum FulfillmentError {
    /// Referenced record does not exist
    #[error("{kind} {id} not found")]
    NotFound { kind: RecordKind, id: u64 },

    /// Donation would over-fulfill its request; nothing was persisted
    #[error(
        "donation quantity exceeds remaining request amount ({} > {}) on request {}",
        qty(.requested),
        qty(.remaining),
        .request_id
    )]
    CapacityExceeded {
        request_id: RequestId,
        requested: u64,
        remaining: u64,
    },

    /// Malformed payload or non-positive quantity
    #[error("invalid submission: {0}")]
    Validation(String),

    /// The donation was persisted but its increment could not be applied
    /// after retrying. Resume with `resume_fulfillment(donation_id)`.
    #[error(
        "donation {} saved but its contribution of {} to request {} is not applied",
        .donation_id,
        qty(.amount),
        .request_id
    )]
    InconsistentState {
        donation_id: DonationId,
        request_id: RequestId,
        amount: u64,
        #[source]
        source: StoreError,
    },

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for FulfillmentError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { kind, id } => FulfillmentError::NotFound { kind, id },
            other => FulfillmentError::Store(other),
        }
    }
}

impl FulfillmentError {
    pub fn request_not_found(id: RequestId) -> Self {
        FulfillmentError::NotFound { kind: RecordKind::Request, id }
    }

    pub fn donation_not_found(id: DonationId) -> Self {
        FulfillmentError::NotFound { kind: RecordKind::Donation, id }
    }

    /// Whether the caller should retry
    pub fn is_retryable(&self) -> bool {
        match self {
            FulfillmentError::InconsistentState { .. } => true,
            FulfillmentError::Store(err) => err.is_transient(),
            _ => false,
        }
    }

    /// Stable machine-readable code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            FulfillmentError::NotFound { .. } => "not_found",
            FulfillmentError::CapacityExceeded { .. } => "capacity_exceeded",
            FulfillmentError::Validation(_) => "validation",
            FulfillmentError::InconsistentState { .. } => "inconsistent_state",
            FulfillmentError::Store(_) => "store",
        }
    }
}

/// Configuration loading failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::quantity::units;

    #[test]
    fn test_capacity_message_uses_human_quantities() {
        let err = FulfillmentError::CapacityExceeded {
            request_id: 3,
            requested: units(60),
            remaining: units(50),
        };
        assert_eq!(
            err.to_string(),
            "donation quantity exceeds remaining request amount (60 > 50) on request 3"
        );
        assert_eq!(err.code(), "capacity_exceeded");
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_inconsistent_state_is_retryable() {
        let err = FulfillmentError::InconsistentState {
            donation_id: 1,
            request_id: 2,
            amount: units(5),
            source: StoreError::Unavailable("timeout".into()),
        };
        assert!(err.is_retryable());
        assert_eq!(err.code(), "inconsistent_state");
    }

    #[test]
    fn test_not_found_message() {
        assert_eq!(FulfillmentError::request_not_found(9).to_string(), "request 9 not found");
        assert!(!FulfillmentError::donation_not_found(9).is_retryable());
    }

    #[test]
    fn test_transient_store_error_is_retryable() {
        let err = FulfillmentError::from(StoreError::Unavailable("down".into()));
        assert!(err.is_retryable());
        let err = FulfillmentError::from(StoreError::request_not_found(1));
        assert!(!err.is_retryable());
        assert_eq!(err.code(), "not_found");
    }
}
