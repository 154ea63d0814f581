//! End-to-end donation submission and the donation lifecycle.
//!
//! ## Submission
//!
//! ```text
//! validate ─► load explicit request ─► parse quantity ─► auto-match?
//!    ─► capacity check ─► persist donation ─► atomic increment ─► settle
//! ```
//!
//! Everything up to the capacity check happens before any write, so a
//! rejected submission leaves no record behind. The increment is the only
//! step that races with other submissions. In strict mode it is a
//! conditional update, so the capacity check is re-done atomically; a lost
//! race removes the just-persisted donation and reports
//! [`FulfillmentError::CapacityExceeded`].
//!
//! Transient failures of the increment are retried with linear backoff.
//! When retries run out the donation stays persisted with a pending
//! contribution and [`FulfillmentError::InconsistentState`] is returned;
//! [`FulfillmentCoordinator::resume_fulfillment`] finishes the job.
//!
//! ## Release
//!
//! A release is the compensating action for a claim. If the donation's
//! quantity was applied to a request, the amount that actually landed is
//! subtracted again; a still-pending contribution is cancelled.

use std::sync::Arc;
use std::thread;

use serde::{Serialize, Serializer};
use tracing::{debug, error, info, info_span, warn};

use crate::config::EngineConfig;
use crate::engine::MatchResolver;
use crate::error::FulfillmentError;
use crate::ledger::{normalize_label, DonationStore, Increment, RequestStore, StoreError, StoreResult};
use crate::types::quantity;
use crate::types::{
    ActorId, Contribution, Donation, DonationId, DonationStatus, DonationSubmission, LedgerReceipt,
    NewRequest, Request, RequestId, RequestStatus, RequestUpdate,
};

/// Optimistic donation writes give up after this many lost races.
const MAX_DONATION_CAS_ATTEMPTS: u32 = 16;

/// Auto-match rounds before a donation is stored unlinked
const MAX_AUTO_MATCH_ATTEMPTS: u32 = 4;

pub type Result<T> = std::result::Result<T, FulfillmentError>;

/// Outcome of a coordinator write: the donation and, if linked, the
/// request state right after the write.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Fulfillment {
    pub donation: Donation,
    #[serde(serialize_with = "serialize_request_view")]
    pub linked_request: Option<Request>,
}

fn serialize_request_view<S: Serializer>(
    request: &Option<Request>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    request.as_ref().map(Request::view).serialize(serializer)
}

impl Fulfillment {
    /// Whether the donation exhausted its request
    pub fn completed_request(&self) -> bool {
        self.linked_request.as_ref().is_some_and(Request::is_fulfilled)
    }
}

/// Orchestrates submissions against a store.
pub struct FulfillmentCoordinator<S> {
    store: Arc<S>,
    resolver: MatchResolver,
    config: EngineConfig,
}

impl<S> FulfillmentCoordinator<S>
where
    S: RequestStore + DonationStore,
{
    pub fn new(store: Arc<S>, config: EngineConfig) -> Self {
        Self {
            store,
            resolver: MatchResolver::new(config.matching.tie_break),
            config,
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ========================================================================
    // Requests
    // ========================================================================

    /// Register a recipient request.
    pub fn create_request(&self, new: NewRequest) -> Result<Request> {
        if new.food_needed.trim().is_empty() {
            return Err(FulfillmentError::Validation("food needed is required".into()));
        }
        if new.quantity_label.trim().is_empty() && new.numeric_requested.is_none() {
            return Err(FulfillmentError::Validation("quantity is required".into()));
        }

        let request = self.store.insert_request(new)?;
        info!(
            request_id = request.id,
            food = %request.food_needed,
            requested = %quantity::from_fixed_trimmed(request.numeric_requested),
            "request created"
        );
        Ok(request)
    }

    /// Edit a request; the numeric fields are re-derived and re-clamped.
    pub fn update_request(&self, id: RequestId, update: RequestUpdate) -> Result<Request> {
        if update.food_needed.as_deref().is_some_and(|f| f.trim().is_empty()) {
            return Err(FulfillmentError::Validation("food needed cannot be blank".into()));
        }
        Ok(self.store.update_request(id, update)?)
    }

    pub fn request(&self, id: RequestId) -> Result<Request> {
        self.store
            .find_request(id)?
            .ok_or_else(|| FulfillmentError::request_not_found(id))
    }

    /// JSON payload of a request, including `remainingQuantity`.
    pub fn request_view(&self, id: RequestId) -> Result<serde_json::Value> {
        let request = self.request(id)?;
        serde_json::to_value(request.view())
            .map_err(|err| FulfillmentError::Validation(format!("request {id} is not serializable: {err}")))
    }

    /// Open and accepted requests, in creation order
    pub fn open_requests(&self) -> Result<Vec<Request>> {
        Ok(self.store.requests_by_status(&RequestStatus::MATCHABLE)?)
    }

    // ========================================================================
    // Submission
    // ========================================================================

    /// Create a donation, linking it to the explicit request or an
    /// auto-matched one, and apply its quantity to that request.
    ///
    /// An auto-matched request that fills up concurrently is matched again;
    /// with no request left to take it the donation is stored unlinked.
    pub fn submit_donation(&self, submission: DonationSubmission) -> Result<Fulfillment> {
        let _span = info_span!("submit_donation", donor = submission.donor).entered();

        let food = submission.food_type.trim().to_string();
        if food.is_empty() {
            return Err(FulfillmentError::Validation("food type is required".into()));
        }

        let explicit = match submission.request_id {
            Some(id) => Some(self.request(id)?),
            None => None,
        };

        let amount = quantity::parse(submission.quantity_label.as_str());
        if amount == 0 {
            return Err(FulfillmentError::Validation(format!(
                "quantity {:?} does not contain a positive amount",
                submission.quantity_label
            )));
        }

        if let Some(request) = explicit {
            let remaining = request.remaining();
            if amount > remaining {
                warn!(
                    request_id = request.id,
                    requested = %quantity::from_fixed_trimmed(amount),
                    remaining = %quantity::from_fixed_trimmed(remaining),
                    "donation exceeds remaining capacity"
                );
                return Err(FulfillmentError::CapacityExceeded {
                    request_id: request.id,
                    requested: amount,
                    remaining,
                });
            }
            return self.place(submission, amount, Some(&request));
        }

        if self.config.matching.auto_match {
            let label = normalize_label(&food);
            for attempt in 1..=MAX_AUTO_MATCH_ATTEMPTS {
                let candidates = self.store.match_candidates(&label)?;
                let Some(request) = self.resolver.resolve(&food, amount, &candidates).cloned() else {
                    break;
                };
                // The resolver only picks requests with room, so a capacity
                // failure here means a concurrent donation got there first.
                match self.place(submission.clone(), amount, Some(&request)) {
                    Err(FulfillmentError::CapacityExceeded { request_id, .. }) => {
                        debug!(request_id, attempt, "matched request filled concurrently, re-matching");
                    }
                    other => return other,
                }
            }
        }

        self.place(submission, amount, None)
    }

    /// Persist the donation, linked to `target` if given, and apply it.
    fn place(
        &self,
        submission: DonationSubmission,
        amount: u64,
        target: Option<&Request>,
    ) -> Result<Fulfillment> {
        let mut donation = submission.into_donation(amount);
        if let Some(request) = target {
            donation.link(request.id);
            if donation.donor != request.requester {
                donation.status = DonationStatus::Claimed;
                donation.claimed_by = Some(request.requester);
            }
        }

        let donation = self.store.insert_donation(donation)?;
        info!(
            donation_id = donation.id,
            request_id = donation.linked_request,
            quantity = %quantity::from_fixed_trimmed(amount),
            "donation stored"
        );

        match donation.linked_request {
            Some(request_id) => self.apply_contribution(donation, request_id),
            None => Ok(Fulfillment {
                donation,
                linked_request: None,
            }),
        }
    }

    /// Re-attempt the increment of a donation left pending by an
    /// [`FulfillmentError::InconsistentState`]. A no-op for donations whose
    /// contribution is not pending.
    pub fn resume_fulfillment(&self, donation_id: DonationId) -> Result<Fulfillment> {
        let donation = self.donation(donation_id)?;

        match (donation.contribution, donation.linked_request) {
            (Contribution::Pending, Some(request_id)) => {
                info!(donation_id, request_id, "resuming pending contribution");
                self.apply_contribution(donation, request_id)
            }
            (_, linked) => {
                let linked_request = match linked {
                    Some(id) => self.store.find_request(id)?,
                    None => None,
                };
                Ok(Fulfillment {
                    donation,
                    linked_request,
                })
            }
        }
    }

    /// Increment the linked request, then flip the donation from pending to
    /// applied. Only the caller that makes that flip keeps its increment; a
    /// donation released or applied in the meantime gets it taken back.
    fn apply_contribution(&self, donation: Donation, request_id: RequestId) -> Result<Fulfillment> {
        let amount = donation.numeric_quantity;
        let strict = self.config.capacity.strict;

        let incremented = self.with_retry("increment fulfilled", || {
            if strict {
                self.store
                    .try_increment_fulfilled(request_id, amount)
                    .map(|request| Increment { request, applied: amount })
            } else {
                self.store.increment_fulfilled(request_id, amount)
            }
        });

        let Increment { request, applied } = match incremented {
            Ok(increment) => increment,
            Err(StoreError::CapacityRejected { remaining, .. }) => {
                // Lost the race to a concurrent submission; undo the record.
                self.store.remove_donation(donation.id)?;
                warn!(
                    donation_id = donation.id,
                    request_id,
                    remaining = %quantity::from_fixed_trimmed(remaining),
                    "capacity taken by a concurrent donation, submission withdrawn"
                );
                return Err(FulfillmentError::CapacityExceeded {
                    request_id,
                    requested: amount,
                    remaining,
                });
            }
            Err(source) => {
                error!(
                    donation_id = donation.id,
                    request_id,
                    error = %source,
                    "increment failed after retries, contribution left pending"
                );
                return Err(FulfillmentError::InconsistentState {
                    donation_id: donation.id,
                    request_id,
                    amount,
                    source,
                });
            }
        };

        if applied < amount {
            warn!(
                donation_id = donation.id,
                request_id,
                requested = %quantity::from_fixed_trimmed(amount),
                applied = %quantity::from_fixed_trimmed(applied),
                "increment clamped at requested amount"
            );
        }

        let exhausted = request.remaining() == 0;
        let mut won = false;
        let donation = self
            .with_retry("mark contribution", || {
                self.cas_donation(donation.id, |d| {
                    won = d.contribution == Contribution::Pending;
                    if won {
                        d.contribution = Contribution::Applied;
                        d.applied_quantity = applied;
                        if exhausted {
                            d.advance_to(DonationStatus::Completed);
                        }
                    }
                    Ok::<(), StoreError>(())
                })
            })
            .map_err(|err| {
                error!(
                    donation_id = donation.id,
                    request_id,
                    error = %err,
                    "increment applied but donation could not be marked"
                );
                FulfillmentError::from(err)
            })?;

        if !won {
            warn!(
                donation_id = donation.id,
                request_id,
                contribution = ?donation.contribution,
                "donation settled concurrently, taking increment back"
            );
            let request = self
                .with_retry("decrement fulfilled", || {
                    self.store.decrement_fulfilled(request_id, applied)
                })
                .map_err(|err| {
                    error!(
                        donation_id = donation.id,
                        request_id,
                        error = %err,
                        "superseded increment could not be taken back"
                    );
                    FulfillmentError::from(err)
                })?;
            return Ok(Fulfillment {
                donation,
                linked_request: Some(request),
            });
        }

        info!(
            donation_id = donation.id,
            request_id,
            fulfilled = %quantity::from_fixed_trimmed(request.fulfilled_quantity),
            remaining = %quantity::from_fixed_trimmed(request.remaining()),
            status = ?request.status,
            "contribution applied"
        );

        Ok(Fulfillment {
            donation,
            linked_request: Some(request),
        })
    }

    // ========================================================================
    // Donation lifecycle
    // ========================================================================

    pub fn donation(&self, id: DonationId) -> Result<Donation> {
        self.store
            .find_donation(id)?
            .ok_or_else(|| FulfillmentError::donation_not_found(id))
    }

    /// A recipient claims an available donation.
    pub fn claim_donation(
        &self,
        id: DonationId,
        claimant: ActorId,
        claimant_phone: Option<String>,
    ) -> Result<Donation> {
        let donation = self.cas_donation(id, |d| {
            if d.status != DonationStatus::Available {
                return Err(FulfillmentError::Validation(format!(
                    "donation {} is {:?}, not available",
                    d.id, d.status
                )));
            }
            d.advance_to(DonationStatus::Claimed);
            d.claimed_by = Some(claimant);
            d.claimant_phone = claimant_phone.clone();
            Ok(())
        })?;
        info!(donation_id = id, claimant, "donation claimed");
        Ok(donation)
    }

    /// Roll a donation back to `available`, reversing its contribution to
    /// the linked request.
    ///
    /// An applied contribution is decremented by exactly the amount it
    /// added. A pending one is cancelled, so a later resume does nothing.
    pub fn release_donation(&self, id: DonationId) -> Result<Fulfillment> {
        let _span = info_span!("release_donation", donation_id = id).entered();

        let mut prior = Contribution::None;
        let donation = self.cas_donation(id, |d| {
            prior = d.contribution;
            if matches!(prior, Contribution::Applied | Contribution::Pending) {
                d.contribution = Contribution::Reversed;
            }
            d.release();
            Ok::<(), FulfillmentError>(())
        })?;

        let linked_request = match (prior, donation.linked_request) {
            (Contribution::Applied, Some(request_id)) => {
                let amount = donation.applied_quantity;
                let decremented = self.with_retry("decrement fulfilled", || {
                    self.store.decrement_fulfilled(request_id, amount)
                });
                match decremented {
                    Ok(request) => {
                        info!(
                            request_id,
                            amount = %quantity::from_fixed_trimmed(amount),
                            status = ?request.status,
                            "contribution reversed"
                        );
                        Some(request)
                    }
                    Err(source) => {
                        // Put the contribution back so the release can be retried.
                        self.cas_donation(id, |d| {
                            d.contribution = Contribution::Applied;
                            Ok::<(), StoreError>(())
                        })?;
                        return Err(FulfillmentError::InconsistentState {
                            donation_id: id,
                            request_id,
                            amount,
                            source,
                        });
                    }
                }
            }
            (Contribution::Pending, Some(request_id)) => {
                info!(request_id, "pending contribution cancelled");
                self.store.find_request(request_id)?
            }
            (_, Some(request_id)) => self.store.find_request(request_id)?,
            (_, None) => None,
        };

        Ok(Fulfillment {
            donation,
            linked_request,
        })
    }

    /// Forward-only status change.
    ///
    /// Moving back to `available` is a release; use
    /// [`release_donation`](Self::release_donation).
    pub fn set_donation_status(&self, id: DonationId, status: DonationStatus) -> Result<Donation> {
        self.cas_donation(id, |d| {
            if !d.advance_to(status) {
                return Err(FulfillmentError::Validation(format!(
                    "donation {} cannot move from {:?} to {:?}",
                    d.id, d.status, status
                )));
            }
            Ok(())
        })
    }

    /// Donations submitted by `donor`, in creation order
    pub fn donations_by_donor(&self, donor: ActorId) -> Result<Vec<Donation>> {
        Ok(self.store.donations_by_donor(donor)?)
    }

    pub fn donations(&self) -> Result<Vec<Donation>> {
        Ok(self.store.donations()?)
    }

    // ========================================================================
    // Audit
    // ========================================================================

    /// Summarize the ledger with a state root over all requests and
    /// donations in creation order.
    pub fn ledger_receipt(&self, timestamp: u64) -> Result<LedgerReceipt> {
        let requests = self.store.requests_by_status(&[
            RequestStatus::Open,
            RequestStatus::Accepted,
            RequestStatus::Fulfilled,
        ])?;
        let donations = self.store.donations()?;

        let mut state = Vec::with_capacity(requests.len() * 64 + donations.len() * 40);
        let mut total_requested = 0u64;
        let mut total_fulfilled = 0u64;
        for request in &requests {
            request.write_state(&mut state);
            total_requested = total_requested.saturating_add(request.numeric_requested);
            total_fulfilled = total_fulfilled.saturating_add(request.fulfilled_quantity);
        }
        for donation in &donations {
            donation.write_state(&mut state);
        }

        Ok(LedgerReceipt::with_computed_root(
            requests.len() as u64,
            donations.len() as u64,
            total_requested,
            total_fulfilled,
            &state,
            timestamp,
        ))
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    /// Retry `op` on transient store errors per the retry config.
    fn with_retry<T, F>(&self, what: &str, mut op: F) -> StoreResult<T>
    where
        F: FnMut() -> StoreResult<T>,
    {
        let max_attempts = self.config.retry.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op() {
                Err(err) if err.is_transient() && attempt < max_attempts => {
                    attempt += 1;
                    warn!(operation = what, attempt, error = %err, "transient store failure, retrying");
                    thread::sleep(self.config.retry.backoff(attempt));
                }
                other => return other,
            }
        }
    }

    /// Read-modify-write a donation with optimistic concurrency.
    ///
    /// `mutate` runs against a fresh copy on every attempt and may reject
    /// the change. Unchanged donations are not written.
    fn cas_donation<E, F>(&self, id: DonationId, mut mutate: F) -> std::result::Result<Donation, E>
    where
        E: From<StoreError>,
        F: FnMut(&mut Donation) -> std::result::Result<(), E>,
    {
        for _ in 0..MAX_DONATION_CAS_ATTEMPTS {
            let current = self
                .store
                .find_donation(id)?
                .ok_or_else(|| StoreError::donation_not_found(id))?;

            let mut next = current.clone();
            mutate(&mut next)?;
            if next == current {
                return Ok(current);
            }
            if self.store.replace_donation(&current, &next)? {
                return Ok(next);
            }
            debug!(donation_id = id, "donation changed concurrently, re-reading");
        }
        Err(StoreError::Unavailable(format!("donation {id} is under heavy contention")).into())
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
