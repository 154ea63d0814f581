//! End-to-end fulfillment scenarios against the in-memory store, plus
//! failure injection through a wrapping store.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use hungerlink_core::config::EngineConfig;
use hungerlink_core::engine::FulfillmentCoordinator;
use hungerlink_core::ledger::{
    DonationStore, InMemoryStore, Increment, RequestStore, StoreError, StoreResult,
};
use hungerlink_core::types::quantity::{self, units};
use hungerlink_core::types::{
    ActorId, Contribution, Donation, DonationId, DonationStatus, DonationSubmission, NewRequest,
    Request, RequestId, RequestStatus, RequestUpdate,
};
use hungerlink_core::FulfillmentError;

const RECIPIENT: ActorId = 1;
const DONOR: ActorId = 2;

// ============================================================================
// Failure injection
// ============================================================================

/// Delegates to an [`InMemoryStore`], failing the first `fail_increments`
/// increments and the first `fail_decrements` decrements as unavailable.
/// A queued `competing` amount lands on the request just before the next
/// increment, as if another donor got there first.
#[derive(Default)]
struct FlakyStore {
    inner: InMemoryStore,
    fail_increments: AtomicU32,
    fail_decrements: AtomicU32,
    increment_calls: AtomicU32,
    competing: AtomicU64,
}

impl FlakyStore {
    fn failing_increments(n: u32) -> Self {
        let store = Self::default();
        store.fail_increments.store(n, Ordering::SeqCst);
        store
    }

    fn compete_before_next_increment(&self, amount: u64) {
        self.competing.store(amount, Ordering::SeqCst);
    }

    fn land_competing(&self, id: RequestId) -> StoreResult<()> {
        let amount = self.competing.swap(0, Ordering::SeqCst);
        if amount > 0 {
            self.inner.increment_fulfilled(id, amount)?;
        }
        Ok(())
    }

    fn fail_next_decrements(&self, n: u32) {
        self.fail_decrements.store(n, Ordering::SeqCst);
    }

    fn trip(counter: &AtomicU32) -> StoreResult<()> {
        let tripped = counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if tripped {
            Err(StoreError::Unavailable("injected failure".into()))
        } else {
            Ok(())
        }
    }
}

impl RequestStore for FlakyStore {
    fn insert_request(&self, new: NewRequest) -> StoreResult<Request> {
        self.inner.insert_request(new)
    }

    fn find_request(&self, id: RequestId) -> StoreResult<Option<Request>> {
        self.inner.find_request(id)
    }

    fn requests_by_status(&self, statuses: &[RequestStatus]) -> StoreResult<Vec<Request>> {
        self.inner.requests_by_status(statuses)
    }

    fn update_request(&self, id: RequestId, update: RequestUpdate) -> StoreResult<Request> {
        self.inner.update_request(id, update)
    }

    fn increment_fulfilled(&self, id: RequestId, amount: u64) -> StoreResult<Increment> {
        self.increment_calls.fetch_add(1, Ordering::SeqCst);
        Self::trip(&self.fail_increments)?;
        self.land_competing(id)?;
        self.inner.increment_fulfilled(id, amount)
    }

    fn try_increment_fulfilled(&self, id: RequestId, amount: u64) -> StoreResult<Request> {
        self.increment_calls.fetch_add(1, Ordering::SeqCst);
        Self::trip(&self.fail_increments)?;
        self.land_competing(id)?;
        self.inner.try_increment_fulfilled(id, amount)
    }

    fn decrement_fulfilled(&self, id: RequestId, amount: u64) -> StoreResult<Request> {
        Self::trip(&self.fail_decrements)?;
        self.inner.decrement_fulfilled(id, amount)
    }
}

impl DonationStore for FlakyStore {
    fn insert_donation(&self, donation: Donation) -> StoreResult<Donation> {
        self.inner.insert_donation(donation)
    }

    fn find_donation(&self, id: DonationId) -> StoreResult<Option<Donation>> {
        self.inner.find_donation(id)
    }

    fn replace_donation(&self, expected: &Donation, next: &Donation) -> StoreResult<bool> {
        self.inner.replace_donation(expected, next)
    }

    fn remove_donation(&self, id: DonationId) -> StoreResult<Option<Donation>> {
        self.inner.remove_donation(id)
    }

    fn donations(&self) -> StoreResult<Vec<Donation>> {
        self.inner.donations()
    }
}

fn fast_config(max_attempts: u32) -> EngineConfig {
    let mut config = EngineConfig::default();
    config.retry.max_attempts = max_attempts;
    config.retry.backoff_ms = 0;
    config
}

fn lenient_config() -> EngineConfig {
    let mut config = fast_config(3);
    config.capacity.strict = false;
    config
}

fn in_memory() -> FulfillmentCoordinator<InMemoryStore> {
    FulfillmentCoordinator::new(Arc::new(InMemoryStore::new()), EngineConfig::default())
}

// ============================================================================
// Quantity and ledger properties
// ============================================================================

#[test]
fn test_quantity_parsing_examples() {
    assert_eq!(quantity::parse("50 meals"), units(50));
    assert_eq!(quantity::parse("meals"), 0);
    assert_eq!(quantity::parse(12.5), 1_250_000_000);
    assert_eq!(quantity::parse(None::<&str>), 0);
}

#[test]
fn test_increments_commute() {
    let a = InMemoryStore::new();
    let b = InMemoryStore::new();
    let ra = a.insert_request(NewRequest::new(RECIPIENT, "rice", "100 kg")).unwrap();
    let rb = b.insert_request(NewRequest::new(RECIPIENT, "rice", "100 kg")).unwrap();

    a.increment_fulfilled(ra.id, units(10)).unwrap();
    let ra = a.increment_fulfilled(ra.id, units(15)).unwrap().request;
    b.increment_fulfilled(rb.id, units(15)).unwrap();
    let rb = b.increment_fulfilled(rb.id, units(10)).unwrap().request;

    assert_eq!(ra.fulfilled_quantity, rb.fulfilled_quantity);
    assert_eq!(ra.status, rb.status);
}

#[test]
fn test_relabel_reclamps_fulfilled() {
    let c = in_memory();
    let r = c.create_request(NewRequest::new(RECIPIENT, "rice", "100 kg")).unwrap();
    c.submit_donation(DonationSubmission::new(DONOR, "rice", "60 kg").for_request(r.id))
        .unwrap();

    let r = c.update_request(r.id, RequestUpdate::relabel("40 kg")).unwrap();

    assert_eq!(r.numeric_requested, units(40));
    assert_eq!(r.fulfilled_quantity, units(40));
    assert_eq!(r.status, RequestStatus::Fulfilled);
}

// ============================================================================
// Submission scenarios
// ============================================================================

#[test]
fn test_exact_fill_completes_request_and_donation() {
    let c = in_memory();
    let r = c.create_request(NewRequest::new(RECIPIENT, "meals", "50 meals")).unwrap();

    let result = c
        .submit_donation(DonationSubmission::new(DONOR, "meals", "50 meals").for_request(r.id))
        .unwrap();

    let linked = result.linked_request.unwrap();
    assert_eq!(linked.fulfilled_quantity, units(50));
    assert_eq!(linked.remaining(), 0);
    assert_eq!(linked.status, RequestStatus::Fulfilled);
    assert_eq!(result.donation.status, DonationStatus::Completed);
}

#[test]
fn test_over_capacity_mutates_nothing() {
    let c = in_memory();
    let r = c.create_request(NewRequest::new(RECIPIENT, "meals", "50 meals")).unwrap();
    let before = c.ledger_receipt(0).unwrap();

    let err = c
        .submit_donation(DonationSubmission::new(DONOR, "meals", "60 meals").for_request(r.id))
        .unwrap_err();

    assert!(matches!(
        err,
        FulfillmentError::CapacityExceeded { remaining, .. } if remaining == units(50)
    ));
    assert_eq!(c.ledger_receipt(0).unwrap(), before);
}

#[test]
fn test_auto_match_partial() {
    let c = in_memory();
    let r = c.create_request(NewRequest::new(RECIPIENT, "rice", "20 kg")).unwrap();

    let result = c.submit_donation(DonationSubmission::new(DONOR, "Rice", "15 kg")).unwrap();

    assert_eq!(result.donation.linked_request, Some(r.id));
    let linked = result.linked_request.unwrap();
    assert_eq!(linked.fulfilled_quantity, units(15));
    assert_eq!(linked.status, RequestStatus::Accepted);
}

#[test]
fn test_fulfilled_requests_never_auto_matched() {
    let c = in_memory();
    let full = c.create_request(NewRequest::new(RECIPIENT, "rice", "10 kg")).unwrap();
    c.submit_donation(DonationSubmission::new(DONOR, "rice", "10 kg").for_request(full.id))
        .unwrap();
    let open = c.create_request(NewRequest::new(RECIPIENT, "basmati rice", "30 kg")).unwrap();

    let result = c.submit_donation(DonationSubmission::new(DONOR, "rice", "1 kg")).unwrap();

    assert_eq!(result.donation.linked_request, Some(open.id));
    assert_eq!(c.request(full.id).unwrap().fulfilled_quantity, units(10));
}

#[test]
fn test_open_requests_excludes_fulfilled() {
    let c = in_memory();
    let a = c.create_request(NewRequest::new(RECIPIENT, "rice", "10 kg")).unwrap();
    let b = c.create_request(NewRequest::new(RECIPIENT, "bread", "5 loaves")).unwrap();
    c.submit_donation(DonationSubmission::new(DONOR, "rice", "10 kg").for_request(a.id))
        .unwrap();

    let open: Vec<_> = c.open_requests().unwrap().into_iter().map(|r| r.id).collect();

    assert_eq!(open, vec![b.id]);
}

#[test]
fn test_donations_by_donor() {
    let c = in_memory();
    c.submit_donation(DonationSubmission::new(DONOR, "bread", "2 loaves")).unwrap();
    c.submit_donation(DonationSubmission::new(DONOR + 1, "bread", "2 loaves")).unwrap();
    c.submit_donation(DonationSubmission::new(DONOR, "soup", "4 litres")).unwrap();

    let mine = c.donations_by_donor(DONOR).unwrap();

    assert_eq!(mine.len(), 2);
    assert!(mine.iter().all(|d| d.donor == DONOR));
    assert!(mine[0].id < mine[1].id);
}

// ============================================================================
// Release
// ============================================================================

#[test]
fn test_release_reverses_exactly_the_applied_amount() {
    let c = in_memory();
    let r = c.create_request(NewRequest::new(RECIPIENT, "meals", "50 meals")).unwrap();
    c.submit_donation(DonationSubmission::new(DONOR, "meals", "20 meals").for_request(r.id))
        .unwrap();
    let last = c
        .submit_donation(DonationSubmission::new(DONOR, "meals", "30 meals").for_request(r.id))
        .unwrap();
    assert!(last.completed_request());

    let released = c.release_donation(last.donation.id).unwrap();

    let r = released.linked_request.unwrap();
    assert_eq!(r.fulfilled_quantity, units(20));
    assert_eq!(r.status, RequestStatus::Accepted);

    // Capacity freed by the release can be donated again
    let again = c
        .submit_donation(DonationSubmission::new(DONOR, "meals", "30 meals").for_request(r.id))
        .unwrap();
    assert!(again.completed_request());
}

#[test]
fn test_failed_release_can_be_retried() {
    let store = Arc::new(FlakyStore::default());
    let c = FulfillmentCoordinator::new(store.clone(), fast_config(2));
    let r = c.create_request(NewRequest::new(RECIPIENT, "meals", "50 meals")).unwrap();
    let d = c
        .submit_donation(DonationSubmission::new(DONOR, "meals", "20 meals").for_request(r.id))
        .unwrap()
        .donation;

    store.fail_next_decrements(2);
    let err = c.release_donation(d.id).unwrap_err();
    assert!(matches!(err, FulfillmentError::InconsistentState { .. }));
    assert_eq!(c.donation(d.id).unwrap().contribution, Contribution::Applied);
    assert_eq!(c.request(r.id).unwrap().fulfilled_quantity, units(20));

    let released = c.release_donation(d.id).unwrap();
    assert_eq!(released.donation.contribution, Contribution::Reversed);
    assert_eq!(released.linked_request.unwrap().fulfilled_quantity, 0);
}

// ============================================================================
// Retry and resume
// ============================================================================

#[test]
fn test_transient_increment_failures_are_retried() {
    let store = Arc::new(FlakyStore::failing_increments(2));
    let c = FulfillmentCoordinator::new(store.clone(), fast_config(3));
    let r = c.create_request(NewRequest::new(RECIPIENT, "rice", "20 kg")).unwrap();

    let result = c
        .submit_donation(DonationSubmission::new(DONOR, "rice", "5 kg").for_request(r.id))
        .unwrap();

    assert_eq!(store.increment_calls.load(Ordering::SeqCst), 3);
    assert_eq!(result.donation.contribution, Contribution::Applied);
    assert_eq!(result.linked_request.unwrap().fulfilled_quantity, units(5));
}

#[test]
fn test_exhausted_retries_surface_inconsistent_state_then_resume() {
    let store = Arc::new(FlakyStore::failing_increments(5));
    let c = FulfillmentCoordinator::new(store.clone(), fast_config(3));
    let r = c.create_request(NewRequest::new(RECIPIENT, "rice", "20 kg")).unwrap();

    let err = c
        .submit_donation(DonationSubmission::new(DONOR, "rice", "20 kg").for_request(r.id))
        .unwrap_err();

    let donation_id = match err {
        FulfillmentError::InconsistentState { donation_id, request_id, amount, .. } => {
            assert_eq!(request_id, r.id);
            assert_eq!(amount, units(20));
            donation_id
        }
        other => panic!("unexpected error: {other:?}"),
    };
    assert_eq!(c.donation(donation_id).unwrap().contribution, Contribution::Pending);
    assert_eq!(c.request(r.id).unwrap().fulfilled_quantity, 0);

    // Two injected failures remain; the resume retries past them
    let resumed = c.resume_fulfillment(donation_id).unwrap();
    assert_eq!(resumed.donation.contribution, Contribution::Applied);
    assert_eq!(resumed.donation.status, DonationStatus::Completed);
    assert_eq!(resumed.linked_request.unwrap().status, RequestStatus::Fulfilled);

    // Resuming again does not apply the quantity twice
    let again = c.resume_fulfillment(donation_id).unwrap();
    assert_eq!(again.linked_request.unwrap().fulfilled_quantity, units(20));
}

#[test]
fn test_release_cancels_pending_contribution() {
    let store = Arc::new(FlakyStore::failing_increments(3));
    let c = FulfillmentCoordinator::new(store.clone(), fast_config(3));
    let r = c.create_request(NewRequest::new(RECIPIENT, "rice", "20 kg")).unwrap();

    let err = c
        .submit_donation(DonationSubmission::new(DONOR, "rice", "5 kg").for_request(r.id))
        .unwrap_err();
    let donation_id = match err {
        FulfillmentError::InconsistentState { donation_id, .. } => donation_id,
        other => panic!("unexpected error: {other:?}"),
    };

    let released = c.release_donation(donation_id).unwrap();
    assert_eq!(released.donation.status, DonationStatus::Available);
    assert_eq!(released.donation.contribution, Contribution::Reversed);
    assert_eq!(released.linked_request.unwrap().fulfilled_quantity, 0);

    let resumed = c.resume_fulfillment(donation_id).unwrap();
    assert_eq!(resumed.donation.contribution, Contribution::Reversed);
    assert_eq!(c.request(r.id).unwrap().fulfilled_quantity, 0);
    assert_eq!(store.increment_calls.load(Ordering::SeqCst), 3);
}

// ============================================================================
// Clamped increments and concurrent fills
// ============================================================================

#[test]
fn test_lenient_release_returns_only_the_clamped_amount() {
    let store = Arc::new(FlakyStore::default());
    let c = FulfillmentCoordinator::new(store.clone(), lenient_config());
    let r = c.create_request(NewRequest::new(RECIPIENT, "rice", "20 kg")).unwrap();

    store.compete_before_next_increment(units(10));
    let result = c
        .submit_donation(DonationSubmission::new(DONOR, "rice", "15 kg").for_request(r.id))
        .unwrap();

    assert_eq!(result.donation.numeric_quantity, units(15));
    assert_eq!(result.donation.applied_quantity, units(10));
    assert_eq!(result.donation.status, DonationStatus::Completed);
    assert_eq!(result.linked_request.unwrap().fulfilled_quantity, units(20));

    let released = c.release_donation(result.donation.id).unwrap();

    // The competing 10 stays; only what this donation added comes off
    let r = released.linked_request.unwrap();
    assert_eq!(r.fulfilled_quantity, units(10));
    assert_eq!(r.status, RequestStatus::Accepted);
}

#[test]
fn test_auto_match_rematches_after_losing_capacity() {
    let store = Arc::new(FlakyStore::default());
    let c = FulfillmentCoordinator::new(store.clone(), fast_config(3));
    let first = c.create_request(NewRequest::new(RECIPIENT, "rice", "20 kg")).unwrap();
    let second = c.create_request(NewRequest::new(RECIPIENT, "rice", "50 kg")).unwrap();

    store.compete_before_next_increment(units(10));
    let result = c.submit_donation(DonationSubmission::new(DONOR, "rice", "15 kg")).unwrap();

    assert_eq!(result.donation.linked_request, Some(second.id));
    assert_eq!(result.linked_request.unwrap().fulfilled_quantity, units(15));
    assert_eq!(c.request(first.id).unwrap().fulfilled_quantity, units(10));
    assert_eq!(c.donations().unwrap().len(), 1);
}

#[test]
fn test_auto_match_falls_back_to_unlinked() {
    let store = Arc::new(FlakyStore::default());
    let c = FulfillmentCoordinator::new(store.clone(), fast_config(3));
    let only = c.create_request(NewRequest::new(RECIPIENT, "rice", "20 kg")).unwrap();

    store.compete_before_next_increment(units(10));
    let result = c.submit_donation(DonationSubmission::new(DONOR, "rice", "15 kg")).unwrap();

    assert!(result.linked_request.is_none());
    assert_eq!(result.donation.status, DonationStatus::Available);
    assert_eq!(result.donation.contribution, Contribution::None);
    assert_eq!(c.request(only.id).unwrap().fulfilled_quantity, units(10));
    assert_eq!(c.donations().unwrap().len(), 1);
}

#[test]
fn test_explicit_link_losing_capacity_is_rejected() {
    let store = Arc::new(FlakyStore::default());
    let c = FulfillmentCoordinator::new(store.clone(), fast_config(3));
    let r = c.create_request(NewRequest::new(RECIPIENT, "rice", "20 kg")).unwrap();

    store.compete_before_next_increment(units(10));
    let err = c
        .submit_donation(DonationSubmission::new(DONOR, "rice", "15 kg").for_request(r.id))
        .unwrap_err();

    assert!(matches!(
        err,
        FulfillmentError::CapacityExceeded { remaining, .. } if remaining == units(10)
    ));
    assert!(c.donations().unwrap().is_empty());
}

#[test]
fn test_unlinked_submission_needs_no_increment() {
    let store = Arc::new(FlakyStore::failing_increments(u32::MAX));
    let c = FulfillmentCoordinator::new(store.clone(), fast_config(1));

    let result = c.submit_donation(DonationSubmission::new(DONOR, "bread", "3 loaves")).unwrap();

    assert!(result.linked_request.is_none());
    assert_eq!(store.increment_calls.load(Ordering::SeqCst), 0);
}
