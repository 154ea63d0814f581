//! In-memory ledger store.
//!
//! ## Architecture
//!
//! - **Slab**: Pre-allocated storage for request slots and donations
//! - **BTreeMap**: Id to slab key mapping; iteration order is creation order
//! - **Per-request Mutex**: Each request document has its own lock, so
//!   increments on one request are serialized while different requests
//!   proceed in parallel
//! - **LabelIndex**: Normalized food label to request ids
//!
//! ## Locking
//!
//! ```text
//! requests: RwLock<RequestTable>
//!   read  -> find / query / increment / decrement (slot Mutex held briefly)
//!   write -> insert / update (label index may change)
//! donations: Mutex<DonationTable>
//! ```
//!
//! An increment holds the table read lock and the slot lock for the
//! duration of one add plus [`derive_and_clamp`]; no lock is held across
//! calls.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{SystemTime, UNIX_EPOCH};

use slab::Slab;
use tracing::{debug, warn};

use crate::ledger::index::LabelIndex;
use crate::ledger::rules::{self, derive_and_clamp};
use crate::ledger::store::{DonationStore, Increment, RequestStore, StoreError, StoreResult};
use crate::types::{
    Donation, DonationId, NewRequest, Request, RequestId, RequestStatus, RequestUpdate,
};

#[derive(Debug, Default)]
struct RequestTable {
    slots: Slab<Mutex<Request>>,
    index: BTreeMap<RequestId, usize>,
    labels: LabelIndex,
    next_id: RequestId,
}

#[derive(Debug, Default)]
struct DonationTable {
    records: Slab<Donation>,
    index: BTreeMap<DonationId, usize>,
    next_id: DonationId,
}

/// Thread-safe in-memory implementation of both store traits.
#[derive(Debug)]
pub struct InMemoryStore {
    requests: RwLock<RequestTable>,
    donations: Mutex<DonationTable>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Wall-clock stamp for records submitted without a timestamp
fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

fn poisoned(what: &str) -> StoreError {
    StoreError::Unavailable(format!("{what} lock poisoned"))
}

impl InMemoryStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Create a store with pre-allocated capacity for `capacity` requests
    /// and as many donations
    ///
    /// ```
    /// use hungerlink_core::ledger::InMemoryStore;
    ///
    /// let store = InMemoryStore::with_capacity(1_000);
    /// assert_eq!(store.request_count(), 0);
    /// ```
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            requests: RwLock::new(RequestTable {
                slots: Slab::with_capacity(capacity),
                next_id: 1,
                ..RequestTable::default()
            }),
            donations: Mutex::new(DonationTable {
                records: Slab::with_capacity(capacity),
                next_id: 1,
                ..DonationTable::default()
            }),
        }
    }

    // ========================================================================
    // Size
    // ========================================================================

    /// Number of stored requests (0 if the table lock is poisoned)
    pub fn request_count(&self) -> usize {
        self.read_requests().map(|t| t.slots.len()).unwrap_or(0)
    }

    /// Number of stored donations (0 if the table lock is poisoned)
    pub fn donation_count(&self) -> usize {
        self.lock_donations().map(|t| t.records.len()).unwrap_or(0)
    }

    // ========================================================================
    // Lock helpers
    // ========================================================================

    fn read_requests(&self) -> StoreResult<RwLockReadGuard<'_, RequestTable>> {
        self.requests.read().map_err(|_| poisoned("request table"))
    }

    fn write_requests(&self) -> StoreResult<RwLockWriteGuard<'_, RequestTable>> {
        self.requests.write().map_err(|_| poisoned("request table"))
    }

    fn lock_donations(&self) -> StoreResult<MutexGuard<'_, DonationTable>> {
        self.donations.lock().map_err(|_| poisoned("donation table"))
    }

    /// Run `mutate` on request `id` under its slot lock, then settle it.
    ///
    /// `mutate` may refuse the change by returning an error, in which case
    /// the stored request is left as it was.
    fn with_request<F>(&self, id: RequestId, mutate: F) -> StoreResult<Request>
    where
        F: FnOnce(&mut Request) -> StoreResult<()>,
    {
        let table = self.read_requests()?;
        let key = *table
            .index
            .get(&id)
            .ok_or_else(|| StoreError::request_not_found(id))?;
        let mut slot = table.slots[key].lock().map_err(|_| poisoned("request slot"))?;

        let mut next = slot.clone();
        mutate(&mut next)?;
        *slot = derive_and_clamp(next, false);
        Ok(slot.clone())
    }
}

impl RequestStore for InMemoryStore {
    fn insert_request(&self, new: NewRequest) -> StoreResult<Request> {
        let mut table = self.write_requests()?;
        let id = table.next_id;
        table.next_id += 1;

        let mut request = new.into_request(id);
        if request.created_at == 0 {
            request.created_at = now_millis();
        }
        table.labels.insert(&request.food_needed, id);
        let key = table.slots.insert(Mutex::new(request.clone()));
        table.index.insert(id, key);

        debug!(request_id = id, requested = request.numeric_requested, "request stored");
        Ok(request)
    }

    fn find_request(&self, id: RequestId) -> StoreResult<Option<Request>> {
        let table = self.read_requests()?;
        match table.index.get(&id) {
            Some(&key) => {
                let slot = table.slots[key].lock().map_err(|_| poisoned("request slot"))?;
                Ok(Some(slot.clone()))
            }
            None => Ok(None),
        }
    }

    fn requests_by_status(&self, statuses: &[RequestStatus]) -> StoreResult<Vec<Request>> {
        let table = self.read_requests()?;
        let mut out = Vec::new();
        for &key in table.index.values() {
            let slot = table.slots[key].lock().map_err(|_| poisoned("request slot"))?;
            if statuses.contains(&slot.status) {
                out.push(slot.clone());
            }
        }
        Ok(out)
    }

    fn update_request(&self, id: RequestId, update: RequestUpdate) -> StoreResult<Request> {
        let mut table = self.write_requests()?;
        let key = *table
            .index
            .get(&id)
            .ok_or_else(|| StoreError::request_not_found(id))?;

        let (before, after) = {
            let mut slot = table.slots[key].lock().map_err(|_| poisoned("request slot"))?;
            let before = slot.food_needed.clone();
            *slot = update.apply(slot.clone());
            (before, slot.clone())
        };

        if before != after.food_needed {
            table.labels.remove(&before, id);
            table.labels.insert(&after.food_needed, id);
        }

        debug!(
            request_id = id,
            requested = after.numeric_requested,
            fulfilled = after.fulfilled_quantity,
            "request updated"
        );
        Ok(after)
    }

    fn increment_fulfilled(&self, id: RequestId, amount: u64) -> StoreResult<Increment> {
        let mut applied = 0;
        let request = self.with_request(id, |request| {
            applied = amount.min(rules::remaining(request));
            request.fulfilled_quantity += applied;
            Ok(())
        })?;
        debug!(
            request_id = id,
            amount,
            applied,
            fulfilled = request.fulfilled_quantity,
            "fulfilled incremented"
        );
        Ok(Increment { request, applied })
    }

    fn try_increment_fulfilled(&self, id: RequestId, amount: u64) -> StoreResult<Request> {
        let result = self.with_request(id, |request| {
            let remaining = rules::remaining(request);
            if amount > remaining {
                return Err(StoreError::CapacityRejected { amount, remaining });
            }
            request.fulfilled_quantity += amount;
            Ok(())
        });

        match &result {
            Ok(updated) => {
                debug!(request_id = id, amount, fulfilled = updated.fulfilled_quantity, "fulfilled incremented");
            }
            Err(StoreError::CapacityRejected { remaining, .. }) => {
                warn!(request_id = id, amount, remaining, "conditional increment rejected");
            }
            Err(_) => {}
        }
        result
    }

    fn decrement_fulfilled(&self, id: RequestId, amount: u64) -> StoreResult<Request> {
        let updated = self.with_request(id, |request| {
            request.fulfilled_quantity = request.fulfilled_quantity.saturating_sub(amount);
            Ok(())
        })?;
        debug!(request_id = id, amount, fulfilled = updated.fulfilled_quantity, "fulfilled decremented");
        Ok(updated)
    }

    fn match_candidates(&self, normalized_label: &str) -> StoreResult<Vec<Request>> {
        let table = self.read_requests()?;
        let mut out = Vec::new();
        for id in table.labels.candidates(normalized_label) {
            let Some(&key) = table.index.get(&id) else {
                continue;
            };
            let slot = table.slots[key].lock().map_err(|_| poisoned("request slot"))?;
            if slot.status.is_matchable() {
                out.push(slot.clone());
            }
        }
        Ok(out)
    }
}

impl DonationStore for InMemoryStore {
    fn insert_donation(&self, mut donation: Donation) -> StoreResult<Donation> {
        let mut table = self.lock_donations()?;
        donation.id = table.next_id;
        table.next_id += 1;
        if donation.created_at == 0 {
            donation.created_at = now_millis();
        }

        let id = donation.id;
        let key = table.records.insert(donation.clone());
        table.index.insert(id, key);
        Ok(donation)
    }

    fn find_donation(&self, id: DonationId) -> StoreResult<Option<Donation>> {
        let table = self.lock_donations()?;
        Ok(table.index.get(&id).map(|&key| table.records[key].clone()))
    }

    fn replace_donation(&self, expected: &Donation, next: &Donation) -> StoreResult<bool> {
        let mut table = self.lock_donations()?;
        let key = *table
            .index
            .get(&expected.id)
            .ok_or_else(|| StoreError::donation_not_found(expected.id))?;

        let current = &mut table.records[key];
        if *current != *expected {
            return Ok(false);
        }
        *current = next.clone();
        current.id = expected.id;
        Ok(true)
    }

    fn remove_donation(&self, id: DonationId) -> StoreResult<Option<Donation>> {
        let mut table = self.lock_donations()?;
        match table.index.remove(&id) {
            Some(key) => Ok(Some(table.records.remove(key))),
            None => Ok(None),
        }
    }

    fn donations(&self) -> StoreResult<Vec<Donation>> {
        let table = self.lock_donations()?;
        Ok(table
            .index
            .values()
            .map(|&key| table.records[key].clone())
            .collect())
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
