//! Food-label index for match candidate lookup.
//!
//! ## Design
//!
//! Requests are grouped by normalized food label, much like orders grouped
//! at a price level. A lookup walks the distinct labels once and applies
//! the containment rule per label, instead of per request.
//!
//! ```text
//! "basmati rice" -> {3, 9}
//! "rice"         -> {1, 4, 12}
//! "tomatoes"     -> {2}
//! ```
//!
//! A donation labelled "Rice" hits both rice groups; the merged ids come
//! back in ascending order, which is creation order.

use std::collections::{BTreeMap, BTreeSet};

use crate::types::RequestId;

/// Normalize a food label: trim and case-fold.
pub fn normalize_label(label: &str) -> String {
    label.trim().to_lowercase()
}

/// Symmetric containment on normalized labels.
///
/// Empty labels never match; otherwise an empty request label would
/// swallow every donation.
pub fn labels_match(a: &str, b: &str) -> bool {
    if a.is_empty() || b.is_empty() {
        return false;
    }
    a.contains(b) || b.contains(a)
}

/// Normalized label → ids of requests carrying that label.
#[derive(Debug, Clone, Default)]
pub struct LabelIndex {
    groups: BTreeMap<String, BTreeSet<RequestId>>,
}

impl LabelIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index request `id` under `label` (raw; normalized here)
    pub fn insert(&mut self, label: &str, id: RequestId) {
        self.groups.entry(normalize_label(label)).or_default().insert(id);
    }

    /// Remove request `id` from `label`'s group, dropping empty groups
    pub fn remove(&mut self, label: &str, id: RequestId) {
        let key = normalize_label(label);
        if let Some(ids) = self.groups.get_mut(&key) {
            ids.remove(&id);
            if ids.is_empty() {
                self.groups.remove(&key);
            }
        }
    }

    /// Ids whose label matches `normalized_label`, ascending
    pub fn candidates(&self, normalized_label: &str) -> Vec<RequestId> {
        let mut ids: Vec<RequestId> = self
            .groups
            .iter()
            .filter(|(label, _)| labels_match(label, normalized_label))
            .flat_map(|(_, ids)| ids.iter().copied())
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Number of distinct labels
    pub fn label_count(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
