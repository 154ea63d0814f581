//! Core data types for the fulfillment ledger.
//!
//! ## Types
//!
//! - [`Request`]: A recipient's need, with fulfilled/remaining tracking
//! - [`Donation`]: A donor's offer, optionally linked to a request
//! - [`DonationSubmission`]: Inbound payload for the coordinator
//! - [`LedgerReceipt`]: Audit summary with a state root
//!
//! ## Fixed-Point Quantities
//!
//! All quantities are stored as `u64` scaled by 10^8.
//! Example: "12.5 kg" is stored as 1_250_000_000u64

mod donation;
mod location;
mod receipt;
mod request;
pub mod quantity;

/// Request identifier assigned by the store
pub type RequestId = u64;

/// Donation identifier assigned by the store
pub type DonationId = u64;

/// Authenticated actor (donor or recipient)
pub type ActorId = u64;

pub use donation::{
    Contribution, Donation, DonationStatus, DonationSubmission, QualityAnnotation, QualityLabel,
};
pub use location::Location;
pub use receipt::LedgerReceipt;
pub use request::{NewRequest, Request, RequestStatus, RequestUpdate, RequestView, RequesterType};
