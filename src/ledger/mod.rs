//! Request ledger: numeric invariants and the persistence contract.
//!
//! ## Invariant
//!
//! After every mutation settles, `0 <= fulfilled_quantity <= numeric_requested`
//! and the status is the pure function of the two (see [`status_for`]).
//!
//! ## Components
//!
//! - [`rules`]: Pure derive/clamp/status functions run by every write path
//! - [`RequestStore`] / [`DonationStore`]: Store contract with atomic
//!   increments
//! - [`InMemoryStore`]: Slab-backed reference store with per-request locks
//! - [`LabelIndex`]: Normalized food label index for match lookups
//!
//! ## Example
//!
//! ```
//! use hungerlink_core::ledger::{InMemoryStore, RequestStore};
//! use hungerlink_core::types::{NewRequest, RequestStatus};
//! use hungerlink_core::types::quantity::units;
//!
//! let store = InMemoryStore::new();
//! let request = store.insert_request(NewRequest::new(1, "rice", "100 meals")).unwrap();
//!
//! let request = store.increment_fulfilled(request.id, units(40)).unwrap().request;
//! assert_eq!(request.status, RequestStatus::Accepted);
//! assert_eq!(request.remaining(), units(60));
//! ```

pub mod index;
pub mod memory;
pub mod rules;
pub mod store;

pub use index::{labels_match, normalize_label, LabelIndex};
pub use memory::InMemoryStore;
pub use rules::{clamp, derive_and_clamp, derive_numeric_requested, derive_status, remaining, status_for};
pub use store::{DonationStore, Increment, RecordKind, RequestStore, StoreError, StoreResult};
