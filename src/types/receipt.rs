//! Ledger receipt for audit and determinism checks.
//!
//! A [`LedgerReceipt`] summarizes the ledger at a point in time, including a
//! state root that changes whenever any request's fulfilled quantity or any
//! donation's status or contribution changes.

use sha2::{Digest, Sha256};

/// Summary of the ledger.
///
/// ## State Root
///
/// The 32-byte state root is a SHA-256 hash over every request and donation
/// in creation order. Two stores that processed the same submissions in the
/// same order produce identical roots.
///
/// ## Example
///
/// ```
/// use hungerlink_core::types::LedgerReceipt;
///
/// let receipt = LedgerReceipt::with_computed_root(2, 3, 100, 40, b"state", 0);
/// assert_eq!(receipt.state_root_hex().len(), 64);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LedgerReceipt {
    /// Number of requests in the ledger
    pub requests: u64,

    /// Number of donations in the ledger
    pub donations: u64,

    /// Sum of `numeric_requested` (fixed-point)
    pub total_requested: u64,

    /// Sum of `fulfilled_quantity` (fixed-point)
    pub total_fulfilled: u64,

    /// SHA-256 over the ordered ledger state
    pub state_root: [u8; 32],

    /// Snapshot timestamp in milliseconds
    pub timestamp: u64,
}

impl LedgerReceipt {
    pub fn new(
        requests: u64,
        donations: u64,
        total_requested: u64,
        total_fulfilled: u64,
        state_root: [u8; 32],
        timestamp: u64,
    ) -> Self {
        Self {
            requests,
            donations,
            total_requested,
            total_fulfilled,
            state_root,
            timestamp,
        }
    }

    /// Create a receipt hashing `state_data` into the state root
    pub fn with_computed_root(
        requests: u64,
        donations: u64,
        total_requested: u64,
        total_fulfilled: u64,
        state_data: &[u8],
        timestamp: u64,
    ) -> Self {
        let state_root = Self::compute_hash(state_data);
        Self::new(requests, donations, total_requested, total_fulfilled, state_root, timestamp)
    }

    /// Compute SHA-256 hash of the given data
    pub fn compute_hash(data: &[u8]) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(data);
        let result = hasher.finalize();

        let mut hash = [0u8; 32];
        hash.copy_from_slice(&result);
        hash
    }

    /// Get the state root as a hex string
    pub fn state_root_hex(&self) -> String {
        hex::encode(self.state_root)
    }

    /// Check if the ledger holds no requests
    pub fn is_empty(&self) -> bool {
        self.requests == 0
    }

    /// Fraction of total requested quantity already fulfilled
    ///
    /// Returns None if nothing has been requested.
    pub fn fulfillment_rate(&self) -> Option<f64> {
        if self.total_requested == 0 {
            None
        } else {
            Some(self.total_fulfilled as f64 / self.total_requested as f64)
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
