//! Opaque pickup/delivery location.
//!
//! The engine never interprets locations; they are carried through so
//! payloads round-trip unchanged.

use serde::{Deserialize, Serialize};

/// Street address plus `[longitude, latitude]`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Location {
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub coordinates: [f64; 2],
}

impl Location {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            coordinates: [0.0, 0.0],
        }
    }
}
