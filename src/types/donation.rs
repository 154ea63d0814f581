//! Donor offers.
//!
//! ## Status lifecycle
//!
//! ```text
//! available ──► claimed ──► completed
//!     └────────────────────────▲
//! ```
//!
//! Transitions only move forward. The single exception is
//! [`Donation::release`], the compensating action used when a claim has to
//! be rolled back.
//!
//! ## Contribution
//!
//! A linked donation's quantity is added to its request in a separate atomic
//! step after the donation is persisted. [`Contribution`] records whether
//! that step has happened, so a failed increment can be resumed exactly once
//! and a release reverses exactly what was applied.

use serde::{Deserialize, Serialize};

use crate::types::{ActorId, DonationId, Location, RequestId};

// ============================================================================
// DonationStatus enum
// ============================================================================

/// Donation status.
///
/// Ranked for forward-only transitions:
/// - Available = 0
/// - Claimed = 1
/// - Completed = 2
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DonationStatus {
    #[default]
    Available,
    Claimed,
    Completed,
}

impl DonationStatus {
    /// Rank used for ordering and state digests
    pub fn to_u8(self) -> u8 {
        match self {
            DonationStatus::Available => 0,
            DonationStatus::Claimed => 1,
            DonationStatus::Completed => 2,
        }
    }

    /// Whether moving from `self` to `next` keeps the lifecycle forward-only
    pub fn can_advance_to(self, next: DonationStatus) -> bool {
        next.to_u8() >= self.to_u8()
    }
}

/// State of a donation's share of its linked request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Contribution {
    /// Not linked to any request
    #[default]
    None,
    /// Persisted, increment not yet applied
    Pending,
    /// Quantity added to the request's fulfilled total
    Applied,
    /// Quantity removed again by a release
    Reversed,
}

impl Contribution {
    fn to_u8(self) -> u8 {
        match self {
            Contribution::None => 0,
            Contribution::Pending => 1,
            Contribution::Applied => 2,
            Contribution::Reversed => 3,
        }
    }
}

// ============================================================================
// Quality annotation
// ============================================================================

/// Quality verdict from the external food-quality assessment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QualityLabel {
    Fresh,
    Check,
    NotSuitable,
}

/// Opaque quality assessment attached to a donation.
///
/// Carried for display only; it never affects fulfillment math.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct QualityAnnotation {
    #[serde(default)]
    pub quality: Option<QualityLabel>,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub reasons: Vec<String>,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

// ============================================================================
// Donation struct
// ============================================================================

/// A donor's offer of some quantity of food.
///
/// `numeric_quantity` is fixed-point (scaled by 10^8), computed once from
/// `quantity_label` at submission and immutable afterwards.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Donation {
    /// Unique donation identifier (assigned by the store)
    pub id: DonationId,

    /// Donor who submitted the offer
    pub donor: ActorId,

    pub food_type: String,

    pub quantity_label: String,

    pub numeric_quantity: u64,

    /// Request this donation fulfills; set at most once
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linked_request: Option<RequestId>,

    pub status: DonationStatus,

    pub contribution: Contribution,

    /// Amount this donation actually added to its request; below
    /// `numeric_quantity` when a clamped increment cut it
    #[serde(default)]
    pub applied_quantity: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claimed_by: Option<ActorId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claimant_phone: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub donor_phone: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manufacturing_date: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry_time: Option<String>,

    #[serde(default)]
    pub location: Location,

    /// Opaque reference from the photo storage collaborator
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_ref: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<QualityAnnotation>,

    /// Unix timestamp in milliseconds
    pub created_at: u64,
}

impl Donation {
    /// Link to `request_id`.
    ///
    /// Returns `false` (and leaves the donation untouched) if it is already
    /// linked; links are never reassigned.
    pub fn link(&mut self, request_id: RequestId) -> bool {
        if self.linked_request.is_some() {
            return false;
        }
        self.linked_request = Some(request_id);
        self.contribution = Contribution::Pending;
        true
    }

    /// Whether this donation is tied to a request
    pub fn is_linked(&self) -> bool {
        self.linked_request.is_some()
    }

    /// Move to `next` if the transition is forward.
    ///
    /// Returns `false` for a regression.
    pub fn advance_to(&mut self, next: DonationStatus) -> bool {
        if !self.status.can_advance_to(next) {
            return false;
        }
        self.status = next;
        true
    }

    /// Compensating rollback to `available`; drops the claimant.
    pub fn release(&mut self) {
        self.status = DonationStatus::Available;
        self.claimed_by = None;
        self.claimant_phone = None;
    }

    /// Append this donation's ledger-relevant state to a digest buffer.
    pub(crate) fn write_state(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.id.to_le_bytes());
        out.extend_from_slice(&self.donor.to_le_bytes());
        out.extend_from_slice(&self.numeric_quantity.to_le_bytes());
        out.extend_from_slice(&self.linked_request.unwrap_or(0).to_le_bytes());
        out.push(self.status.to_u8());
        out.push(self.contribution.to_u8());
        out.extend_from_slice(&self.applied_quantity.to_le_bytes());
    }
}

// ============================================================================
// Submission payload
// ============================================================================

/// Donation submission as handed over by the HTTP layer.
///
/// `donor` comes from the authentication collaborator; `photo_ref` and
/// `quality` are opaque attributes from the storage and quality-assessment
/// collaborators.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DonationSubmission {
    pub donor: ActorId,
    pub food_type: String,
    pub quantity_label: String,
    #[serde(default)]
    pub request_id: Option<RequestId>,
    #[serde(default)]
    pub photo_ref: Option<String>,
    #[serde(default)]
    pub quality: Option<QualityAnnotation>,
    #[serde(default)]
    pub donor_phone: Option<String>,
    #[serde(default)]
    pub manufacturing_date: Option<String>,
    #[serde(default)]
    pub expiry_time: Option<String>,
    #[serde(default)]
    pub location: Location,
    #[serde(default)]
    pub timestamp: u64,
}

impl DonationSubmission {
    /// Unlinked submission of `quantity_label` of `food_type`
    pub fn new(donor: ActorId, food_type: impl Into<String>, quantity_label: impl Into<String>) -> Self {
        Self {
            donor,
            food_type: food_type.into(),
            quantity_label: quantity_label.into(),
            ..Self::default()
        }
    }

    /// Builder: explicit target request
    pub fn for_request(mut self, request_id: RequestId) -> Self {
        self.request_id = Some(request_id);
        self
    }

    /// Builder: submission timestamp
    pub fn at(mut self, timestamp: u64) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Build the unpersisted donation (id 0) with `numeric_quantity` set.
    pub fn into_donation(self, numeric_quantity: u64) -> Donation {
        Donation {
            id: 0,
            donor: self.donor,
            food_type: self.food_type,
            quantity_label: self.quantity_label,
            numeric_quantity,
            linked_request: None,
            status: DonationStatus::Available,
            contribution: Contribution::None,
            applied_quantity: 0,
            claimed_by: None,
            claimant_phone: None,
            donor_phone: self.donor_phone,
            manufacturing_date: self.manufacturing_date,
            expiry_time: self.expiry_time,
            location: self.location,
            photo_ref: self.photo_ref,
            quality: self.quality,
            created_at: self.timestamp,
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn donation() -> Donation {
        DonationSubmission::new(1, "rice", "10 kg").into_donation(1_000_000_000)
    }

    #[test]
    fn test_status_forward_only() {
        use DonationStatus::*;

        assert!(Available.can_advance_to(Claimed));
        assert!(Available.can_advance_to(Completed));
        assert!(Claimed.can_advance_to(Completed));
        assert!(Claimed.can_advance_to(Claimed));
        assert!(!Completed.can_advance_to(Claimed));
        assert!(!Claimed.can_advance_to(Available));
    }

    #[test]
    fn test_link_is_set_once() {
        let mut d = donation();
        assert_eq!(d.contribution, Contribution::None);

        assert!(d.link(4));
        assert_eq!(d.contribution, Contribution::Pending);
        assert!(!d.link(5));
        assert_eq!(d.linked_request, Some(4));
    }

    #[test]
    fn test_advance_rejects_regression() {
        let mut d = donation();
        assert!(d.advance_to(DonationStatus::Completed));
        assert!(!d.advance_to(DonationStatus::Claimed));
        assert_eq!(d.status, DonationStatus::Completed);
    }

    #[test]
    fn test_release_clears_claimant() {
        let mut d = donation();
        d.advance_to(DonationStatus::Claimed);
        d.claimed_by = Some(9);
        d.claimant_phone = Some("555-0100".into());

        d.release();

        assert_eq!(d.status, DonationStatus::Available);
        assert!(d.claimed_by.is_none());
        assert!(d.claimant_phone.is_none());
    }

    #[test]
    fn test_quality_label_wire_names() {
        let json = serde_json::to_string(&QualityLabel::NotSuitable).unwrap();
        assert_eq!(json, "\"not-suitable\"");
    }

    #[test]
    fn test_submission_deserializes_from_payload() {
        let payload = r#"{
            "donor": 3,
            "foodType": "Bread",
            "quantityLabel": "20 loaves",
            "requestId": 11,
            "photoRef": "/uploads/photos/1.jpg",
            "quality": { "quality": "fresh", "confidence": 0.9, "reasons": ["crust intact"] }
        }"#;

        let submission: DonationSubmission = serde_json::from_str(payload).unwrap();

        assert_eq!(submission.request_id, Some(11));
        assert_eq!(submission.photo_ref.as_deref(), Some("/uploads/photos/1.jpg"));
        let quality = submission.quality.unwrap();
        assert_eq!(quality.quality, Some(QualityLabel::Fresh));
        assert!(quality.recommendations.is_empty());
    }
}
