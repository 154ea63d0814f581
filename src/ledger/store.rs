//! Persistence contract consumed by the coordinator.
//!
//! Any backing store must provide per-document atomic updates on a request's
//! fulfilled quantity. Reading a request, adding in memory and writing it
//! back is not an acceptable implementation of the increment methods: two
//! concurrent increments must both land.

use std::fmt;

use thiserror::Error;

use crate::types::{
    ActorId, Donation, DonationId, NewRequest, Request, RequestId, RequestStatus, RequestUpdate,
};

/// Record family, used in not-found diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    Request,
    Donation,
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordKind::Request => write!(f, "request"),
            RecordKind::Donation => write!(f, "donation"),
        }
    }
}

/// Store-level failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("{kind} {id} not found")]
    NotFound { kind: RecordKind, id: u64 },

    /// A conditional increment would have exceeded the requested amount.
    #[error("increment of {amount} rejected: only {remaining} remaining")]
    CapacityRejected { amount: u64, remaining: u64 },

    /// Transient failure; the operation may be retried.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub fn request_not_found(id: RequestId) -> Self {
        StoreError::NotFound { kind: RecordKind::Request, id }
    }

    pub fn donation_not_found(id: DonationId) -> Self {
        StoreError::NotFound { kind: RecordKind::Donation, id }
    }

    /// Whether retrying the same call may succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Outcome of a clamped increment.
#[derive(Debug, Clone, PartialEq)]
pub struct Increment {
    /// The settled request
    pub request: Request,
    /// Amount actually added; less than asked when the clamp cut it
    pub applied: u64,
}

/// Request persistence.
///
/// Every mutating method returns the settled request, i.e. after
/// [`derive_and_clamp`](crate::ledger::derive_and_clamp) has run.
pub trait RequestStore: Send + Sync {
    /// Persist a new request with a store-assigned id
    fn insert_request(&self, new: NewRequest) -> StoreResult<Request>;

    fn find_request(&self, id: RequestId) -> StoreResult<Option<Request>>;

    /// Requests whose status is in `statuses`, in creation order
    fn requests_by_status(&self, statuses: &[RequestStatus]) -> StoreResult<Vec<Request>>;

    /// Apply a partial edit; an explicit numeric override beats the label
    fn update_request(&self, id: RequestId, update: RequestUpdate) -> StoreResult<Request>;

    /// Atomic add, clamped at `numeric_requested`.
    ///
    /// Any excess over the remaining capacity is dropped; the returned
    /// [`Increment::applied`] is what actually landed.
    fn increment_fulfilled(&self, id: RequestId, amount: u64) -> StoreResult<Increment>;

    /// Atomic conditional add.
    ///
    /// Fails with [`StoreError::CapacityRejected`] and leaves the request
    /// untouched if the result would exceed `numeric_requested`.
    fn try_increment_fulfilled(&self, id: RequestId, amount: u64) -> StoreResult<Request>;

    /// Atomic subtract, floored at zero
    fn decrement_fulfilled(&self, id: RequestId, amount: u64) -> StoreResult<Request>;

    /// Open/accepted requests that could match `normalized_label`, in
    /// creation order.
    ///
    /// The default returns every matchable request; stores with a label
    /// index narrow the set. Callers still apply the full match rule.
    fn match_candidates(&self, normalized_label: &str) -> StoreResult<Vec<Request>> {
        let _ = normalized_label;
        self.requests_by_status(&RequestStatus::MATCHABLE)
    }
}

/// Donation persistence.
pub trait DonationStore: Send + Sync {
    /// Persist with a store-assigned id; the `id` field of the input is ignored
    fn insert_donation(&self, donation: Donation) -> StoreResult<Donation>;

    fn find_donation(&self, id: DonationId) -> StoreResult<Option<Donation>>;

    /// Optimistic write: replace the stored donation with `next` only if it
    /// still equals `expected`. Returns `false` on a lost race.
    fn replace_donation(&self, expected: &Donation, next: &Donation) -> StoreResult<bool>;

    /// Delete a donation; only used to undo a rejected submission
    fn remove_donation(&self, id: DonationId) -> StoreResult<Option<Donation>>;

    /// All donations in creation order
    fn donations(&self) -> StoreResult<Vec<Donation>>;

    fn donations_by_donor(&self, donor: ActorId) -> StoreResult<Vec<Donation>> {
        Ok(self
            .donations()?
            .into_iter()
            .filter(|d| d.donor == donor)
            .collect())
    }
}
