//! Pure derivation rules for a request's numeric state.
//!
//! Every write path (create, edit, increment, decrement) finishes with
//! [`derive_and_clamp`]. Nothing is re-derived implicitly on save.

use crate::types::quantity;
use crate::types::{Request, RequestStatus};

/// Re-derive `numeric_requested` from the quantity label.
///
/// The label is parsed when no numeric value is set yet (zero) or when the
/// label just changed. An explicit non-zero value is otherwise kept.
pub fn derive_numeric_requested(request: &mut Request, label_changed: bool) {
    if request.numeric_requested == 0 || label_changed {
        request.numeric_requested = quantity::parse(request.quantity_label.as_str());
    }
}

/// Clamp `fulfilled_quantity` into `[0, numeric_requested]`.
#[inline]
pub fn clamp(request: &mut Request) {
    request.fulfilled_quantity = request.fulfilled_quantity.min(request.numeric_requested);
}

/// Status as a pure function of `(requested, fulfilled, current)`.
///
/// A zero-capacity request keeps its current status.
pub fn status_for(requested: u64, fulfilled: u64, current: RequestStatus) -> RequestStatus {
    if requested == 0 {
        current
    } else if fulfilled >= requested {
        RequestStatus::Fulfilled
    } else if fulfilled > 0 {
        RequestStatus::Accepted
    } else {
        RequestStatus::Open
    }
}

/// Apply [`status_for`] to `request`.
#[inline]
pub fn derive_status(request: &mut Request) {
    request.status = status_for(
        request.numeric_requested,
        request.fulfilled_quantity,
        request.status,
    );
}

/// Remaining capacity: `max(0, requested - fulfilled)`
#[inline]
pub fn remaining(request: &Request) -> u64 {
    request.numeric_requested.saturating_sub(request.fulfilled_quantity)
}

/// Derive the requested amount, clamp the fulfilled amount, then derive
/// the status, in that order.
pub fn derive_and_clamp(mut request: Request, label_changed: bool) -> Request {
    derive_numeric_requested(&mut request, label_changed);
    clamp(&mut request);
    derive_status(&mut request);
    request
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::quantity::units;

    fn request(requested: u64, fulfilled: u64) -> Request {
        Request {
            id: 1,
            food_needed: "rice".into(),
            quantity_label: format!("{} meals", requested),
            numeric_requested: units(requested),
            fulfilled_quantity: units(fulfilled),
            ..Request::default()
        }
    }

    #[test]
    fn test_status_table() {
        let open = RequestStatus::Open;
        assert_eq!(status_for(units(100), 0, open), RequestStatus::Open);
        assert_eq!(status_for(units(100), units(40), open), RequestStatus::Accepted);
        assert_eq!(status_for(units(100), units(100), open), RequestStatus::Fulfilled);
    }

    #[test]
    fn test_status_drops_back_when_fulfilled_shrinks() {
        let fulfilled = RequestStatus::Fulfilled;
        assert_eq!(status_for(units(100), units(60), fulfilled), RequestStatus::Accepted);
        assert_eq!(status_for(units(100), 0, fulfilled), RequestStatus::Open);
    }

    #[test]
    fn test_zero_capacity_keeps_status() {
        assert_eq!(status_for(0, 0, RequestStatus::Accepted), RequestStatus::Accepted);
        assert_eq!(status_for(0, 0, RequestStatus::Open), RequestStatus::Open);
    }

    #[test]
    fn test_overfill_clamps_before_status() {
        let settled = derive_and_clamp(request(100, 150), false);

        assert_eq!(settled.fulfilled_quantity, units(100));
        assert_eq!(settled.status, RequestStatus::Fulfilled);
        assert_eq!(remaining(&settled), 0);
    }

    #[test]
    fn test_remaining_floors_at_zero() {
        // Unsettled state straight from a raw write
        let raw = request(10, 12);
        assert_eq!(remaining(&raw), 0);
        assert_eq!(remaining(&request(10, 4)), units(6));
    }

    #[test]
    fn test_derive_numeric_from_label_when_unset() {
        let mut r = request(0, 0);
        r.quantity_label = "75 meals".into();

        derive_numeric_requested(&mut r, false);

        assert_eq!(r.numeric_requested, units(75));
    }

    #[test]
    fn test_derive_numeric_keeps_override() {
        let mut r = request(40, 0);
        r.quantity_label = "75 meals".into();

        derive_numeric_requested(&mut r, false);
        assert_eq!(r.numeric_requested, units(40));

        derive_numeric_requested(&mut r, true);
        assert_eq!(r.numeric_requested, units(75));
    }

    #[test]
    fn test_unparseable_label_leaves_zero_capacity() {
        let mut r = request(0, 0);
        r.quantity_label = "some meals".into();
        r.status = RequestStatus::Open;

        let settled = derive_and_clamp(r, true);

        assert_eq!(settled.numeric_requested, 0);
        assert_eq!(settled.fulfilled_quantity, 0);
        assert_eq!(settled.status, RequestStatus::Open);
    }

    #[test]
    fn test_invariant_holds_for_any_fulfilled_value() {
        for fulfilled in [0u64, 1, 49, 50, 51, 1_000] {
            let settled = derive_and_clamp(request(50, fulfilled), false);
            assert!(settled.fulfilled_quantity <= settled.numeric_requested);
        }
    }
}
