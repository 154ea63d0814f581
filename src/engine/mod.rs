//! Fulfillment engine for HungerLink.
//!
//! ## Design Principles
//!
//! 1. **No over-fulfillment**: A donation is only applied if it fits the
//!    request's remaining capacity, checked atomically in strict mode
//! 2. **Fixed-Point Math**: Quantities never pass through floating point
//! 3. **Synchronous Execution**: No async/await; the store serializes
//!    writes per request
//! 4. **Deterministic Matching**: Auto-match ties break on creation order
//!
//! ## Submission Rules
//!
//! - **Explicit link**: the named request must exist and have room
//! - **Auto-match**: the first open/accepted request whose food label
//!   contains (or is contained in) the donation's food type and whose
//!   remaining capacity covers the whole donation
//! - **Partial fulfillment** is supported; a donation that exhausts its
//!   request is marked completed
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use hungerlink_core::config::EngineConfig;
//! use hungerlink_core::engine::FulfillmentCoordinator;
//! use hungerlink_core::ledger::InMemoryStore;
//! use hungerlink_core::types::{DonationStatus, DonationSubmission, NewRequest, RequestStatus};
//!
//! let coordinator = FulfillmentCoordinator::new(Arc::new(InMemoryStore::new()), EngineConfig::default());
//!
//! let request = coordinator.create_request(NewRequest::new(1, "meals", "50 meals")).unwrap();
//!
//! let result = coordinator
//!     .submit_donation(DonationSubmission::new(2, "meals", "50 meals").for_request(request.id))
//!     .unwrap();
//!
//! assert_eq!(result.donation.status, DonationStatus::Completed);
//! assert_eq!(result.linked_request.unwrap().status, RequestStatus::Fulfilled);
//! ```

pub mod coordinator;
pub mod matcher;

pub use coordinator::{Fulfillment, FulfillmentCoordinator};
pub use matcher::MatchResolver;
