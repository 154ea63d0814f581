//! Recipient requests.
//!
//! A [`Request`] states a need for some quantity of a food. Its numeric
//! fields are the ledger's shared mutable state: many donations may target
//! the same request, and every write path re-runs
//! [`ledger::derive_and_clamp`](crate::ledger::derive_and_clamp) so the
//! fulfilled quantity, remaining capacity and status never disagree.

use serde::{Deserialize, Serialize};

use crate::ledger;
use crate::types::{ActorId, Location, RequestId};

// ============================================================================
// RequestStatus enum
// ============================================================================

/// Fulfillment status of a request.
///
/// Represented as u8 in ledger state digests:
/// - Open = 0
/// - Accepted = 1
/// - Fulfilled = 2
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    /// Nothing contributed yet
    #[default]
    Open,
    /// Partially fulfilled
    Accepted,
    /// Fully fulfilled, no remaining capacity
    Fulfilled,
}

impl RequestStatus {
    /// Statuses the match resolver may link donations to
    pub const MATCHABLE: [RequestStatus; 2] = [RequestStatus::Open, RequestStatus::Accepted];

    /// Convert to u8 for state digests
    pub fn to_u8(self) -> u8 {
        match self {
            RequestStatus::Open => 0,
            RequestStatus::Accepted => 1,
            RequestStatus::Fulfilled => 2,
        }
    }

    /// Convert from u8
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(RequestStatus::Open),
            1 => Some(RequestStatus::Accepted),
            2 => Some(RequestStatus::Fulfilled),
            _ => None,
        }
    }

    /// Whether auto-matching may target a request in this status
    pub fn is_matchable(self) -> bool {
        Self::MATCHABLE.contains(&self)
    }
}

/// Who is asking: an organisation or a private person.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequesterType {
    Ngo,
    #[default]
    Individual,
}

// ============================================================================
// Request struct
// ============================================================================

/// A recipient's stated need.
///
/// ## Numeric fields
///
/// `numeric_requested` and `fulfilled_quantity` are fixed-point (scaled by
/// 10^8). `numeric_requested` is derived from `quantity_label` unless an
/// explicit override was supplied. The remaining quantity is never stored;
/// see [`Request::remaining`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    /// Unique request identifier (assigned by the store)
    pub id: RequestId,

    /// Recipient who raised the request
    pub requester: ActorId,

    /// Label of the desired food, e.g. "rice"
    pub food_needed: String,

    /// Free-form quantity label kept for display, e.g. "50 meals"
    pub quantity_label: String,

    /// Requested amount in fixed-point
    pub numeric_requested: u64,

    /// Amount contributed so far in fixed-point
    pub fulfilled_quantity: u64,

    pub status: RequestStatus,

    pub requester_type: RequesterType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requester_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requester_phone: Option<String>,

    #[serde(default)]
    pub location: Location,

    /// Unix timestamp in milliseconds
    pub created_at: u64,
}

impl Request {
    /// Remaining capacity: `max(0, requested - fulfilled)`
    #[inline]
    pub fn remaining(&self) -> u64 {
        ledger::remaining(self)
    }

    /// Whether the request has no remaining capacity
    pub fn is_fulfilled(&self) -> bool {
        self.status == RequestStatus::Fulfilled
    }

    /// Payload view carrying the derived remaining quantity
    pub fn view(&self) -> RequestView<'_> {
        RequestView {
            request: self,
            remaining_quantity: self.remaining(),
        }
    }

    /// Append this request's ledger-relevant state to a digest buffer.
    pub(crate) fn write_state(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.id.to_le_bytes());
        out.extend_from_slice(&self.requester.to_le_bytes());
        out.extend_from_slice(&self.numeric_requested.to_le_bytes());
        out.extend_from_slice(&self.fulfilled_quantity.to_le_bytes());
        out.push(self.status.to_u8());
        out.extend_from_slice(&(self.food_needed.len() as u64).to_le_bytes());
        out.extend_from_slice(self.food_needed.as_bytes());
    }
}

/// Serialized form of a request with `remainingQuantity` included.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestView<'a> {
    #[serde(flatten)]
    pub request: &'a Request,
    pub remaining_quantity: u64,
}

// ============================================================================
// Write payloads
// ============================================================================

/// Payload for creating a request.
///
/// `numeric_requested`, when present, overrides the value parsed from the
/// label.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRequest {
    pub requester: ActorId,
    pub food_needed: String,
    pub quantity_label: String,
    #[serde(default)]
    pub numeric_requested: Option<u64>,
    #[serde(default)]
    pub requester_type: RequesterType,
    #[serde(default)]
    pub requester_name: Option<String>,
    #[serde(default)]
    pub requester_phone: Option<String>,
    #[serde(default)]
    pub location: Location,
    #[serde(default)]
    pub created_at: u64,
}

impl NewRequest {
    /// Minimal request for `quantity_label` of `food_needed`
    pub fn new(requester: ActorId, food_needed: impl Into<String>, quantity_label: impl Into<String>) -> Self {
        Self {
            requester,
            food_needed: food_needed.into(),
            quantity_label: quantity_label.into(),
            ..Self::default()
        }
    }

    /// Builder: explicit numeric override
    pub fn with_numeric_requested(mut self, numeric: u64) -> Self {
        self.numeric_requested = Some(numeric);
        self
    }

    /// Builder: creation timestamp
    pub fn at(mut self, created_at: u64) -> Self {
        self.created_at = created_at;
        self
    }

    /// Materialize into a request with `id`, fulfilled quantity zero and the
    /// numeric fields derived.
    pub fn into_request(self, id: RequestId) -> Request {
        let request = Request {
            id,
            requester: self.requester,
            food_needed: self.food_needed,
            quantity_label: self.quantity_label,
            numeric_requested: self.numeric_requested.unwrap_or(0),
            fulfilled_quantity: 0,
            status: RequestStatus::Open,
            requester_type: self.requester_type,
            requester_name: self.requester_name,
            requester_phone: self.requester_phone,
            location: self.location,
            created_at: self.created_at,
        };
        // An explicit override is honored; otherwise the label is parsed.
        ledger::derive_and_clamp(request, false)
    }
}

/// Partial edit of a request.
///
/// When both `quantity_label` and `numeric_requested` are present the
/// explicit numeric value wins.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestUpdate {
    #[serde(default)]
    pub food_needed: Option<String>,
    #[serde(default)]
    pub quantity_label: Option<String>,
    #[serde(default)]
    pub numeric_requested: Option<u64>,
    #[serde(default)]
    pub requester_name: Option<String>,
    #[serde(default)]
    pub requester_phone: Option<String>,
    #[serde(default)]
    pub location: Option<Location>,
}

impl RequestUpdate {
    /// Update that only relabels the quantity
    pub fn relabel(label: impl Into<String>) -> Self {
        Self {
            quantity_label: Some(label.into()),
            ..Self::default()
        }
    }

    /// Apply to `request`, re-deriving and re-clamping the numeric fields.
    pub fn apply(self, mut request: Request) -> Request {
        if let Some(food) = self.food_needed {
            request.food_needed = food;
        }
        if let Some(name) = self.requester_name {
            request.requester_name = Some(name);
        }
        if let Some(phone) = self.requester_phone {
            request.requester_phone = Some(phone);
        }
        if let Some(location) = self.location {
            request.location = location;
        }

        let label_changed = match self.quantity_label {
            Some(label) if label != request.quantity_label => {
                request.quantity_label = label;
                true
            }
            _ => false,
        };

        match self.numeric_requested {
            Some(numeric) => {
                request.numeric_requested = numeric;
                ledger::derive_and_clamp(request, false)
            }
            None => ledger::derive_and_clamp(request, label_changed),
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
