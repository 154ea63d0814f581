//! Auto-match of unlinked donations to open requests.
//!
//! ## Rule
//!
//! 1. Normalize the donation's food type and each candidate's food label
//!    (trim + case-fold).
//! 2. Only `open` and `accepted` requests are considered.
//! 3. Labels match by symmetric containment ("rice" ~ "basmati rice").
//! 4. The candidate's remaining capacity must cover the whole donation.
//! 5. Among the survivors, the configured [`TieBreak`] picks one; with no
//!    survivor the donation stays unlinked.
//!
//! Creation order is the store-assigned id sequence, not the caller-supplied
//! `created_at`. Both tie-breaks end on the id, so the result never depends
//! on the order the store happened to return.

use tracing::debug;

use crate::config::TieBreak;
use crate::ledger::{labels_match, normalize_label, remaining};
use crate::types::Request;

/// Picks a target request for an unlinked donation.
#[derive(Debug, Clone, Copy, Default)]
pub struct MatchResolver {
    tie_break: TieBreak,
}

impl MatchResolver {
    pub fn new(tie_break: TieBreak) -> Self {
        Self { tie_break }
    }

    pub fn tie_break(&self) -> TieBreak {
        self.tie_break
    }

    /// Whether `candidate` could take a donation of `quantity` labelled
    /// `normalized_food` (already normalized).
    pub fn accepts(candidate: &Request, normalized_food: &str, quantity: u64) -> bool {
        candidate.status.is_matchable()
            && labels_match(&normalize_label(&candidate.food_needed), normalized_food)
            && remaining(candidate) >= quantity
    }

    /// Choose among `candidates` for a donation of `quantity` of `food_type`.
    ///
    /// # Example
    ///
    /// ```
    /// use hungerlink_core::engine::MatchResolver;
    /// use hungerlink_core::types::NewRequest;
    /// use hungerlink_core::types::quantity::units;
    ///
    /// let candidates = vec![
    ///     NewRequest::new(1, "bread", "10 loaves").into_request(1),
    ///     NewRequest::new(1, "rice", "20 kg").into_request(2),
    /// ];
    ///
    /// let resolver = MatchResolver::default();
    /// let chosen = resolver.resolve(" Rice ", units(15), &candidates);
    /// assert_eq!(chosen.map(|r| r.id), Some(2));
    /// ```
    pub fn resolve<'a>(
        &self,
        food_type: &str,
        quantity: u64,
        candidates: &'a [Request],
    ) -> Option<&'a Request> {
        let food = normalize_label(food_type);
        if food.is_empty() {
            return None;
        }

        let eligible = candidates
            .iter()
            .filter(|candidate| Self::accepts(candidate, &food, quantity));

        let chosen = match self.tie_break {
            TieBreak::CreationOrder => eligible.min_by_key(|r| r.id),
            TieBreak::TightestFit => eligible.min_by_key(|r| (remaining(r), r.id)),
        };

        match chosen {
            Some(request) => debug!(
                food = %food,
                request_id = request.id,
                remaining = remaining(request),
                "auto-match selected request"
            ),
            None => debug!(food = %food, quantity, "no request can take donation"),
        }
        chosen
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
