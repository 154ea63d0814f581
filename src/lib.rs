//! # HungerLink Core
//!
//! Fulfillment reconciliation between food donations and recipient requests.
//!
//! ## Architecture
//!
//! The core consists of:
//! - **Types**: Core data structures (Request, Donation, LedgerReceipt)
//! - **Ledger**: Numeric invariants, the store contract and a slab-backed
//!   in-memory store
//! - **Engine**: Auto-match and the donation submission transaction
//!
//! ## Design Principles
//!
//! 1. **Bounded**: `0 <= fulfilled <= requested` after every write settles
//! 2. **No Floating Point**: All ledger math uses fixed-point arithmetic (10^8 scaling)
//! 3. **Atomic Increments**: Concurrent donations never lose updates
//! 4. **Validate First**: Rejected submissions persist nothing

// ============================================================================
// Module declarations
// ============================================================================

/// Core data types: Request, Donation, LedgerReceipt
pub mod types;

/// Request ledger: derive/clamp rules and storage
pub mod ledger;

/// Fulfillment engine: auto-match and submission coordinator
pub mod engine;

/// Engine configuration
pub mod config;

/// Error types
pub mod error;

// ============================================================================
// Re-exports for convenience
// ============================================================================

pub use config::{EngineConfig, TieBreak};
pub use engine::{Fulfillment, FulfillmentCoordinator, MatchResolver};
pub use error::{ConfigError, FulfillmentError};
pub use ledger::{DonationStore, InMemoryStore, RequestStore, StoreError};
pub use types::{Donation, DonationStatus, DonationSubmission, LedgerReceipt, NewRequest, Request, RequestStatus};
