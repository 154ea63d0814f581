//! Fixed-point quantities and the free-form quantity parser.
//!
//! ## Overview
//!
//! Every quantity in the ledger (requested, fulfilled, donated) is stored as
//! a `u64` scaled by 10^8. Ledger arithmetic never touches floating point, so
//! concurrent increments sum exactly regardless of ordering.
//!
//! ## Parsing
//!
//! Users type quantities as labels ("50 meals", "12.5 kg"). [`parse`]
//! extracts the first decimal numeral from the label and converts it to
//! fixed-point. Absent input, non-finite numbers and labels without a
//! numeral all parse to `0`.
//!
//! ## Examples
//!
//! ```
//! use hungerlink_core::types::quantity::{parse, units, from_fixed_trimmed};
//!
//! assert_eq!(parse("50 meals"), units(50));
//! assert_eq!(parse("meals"), 0);
//! assert_eq!(from_fixed_trimmed(parse("12.5 kg")), "12.5");
//! ```

use std::sync::OnceLock;

use regex::Regex;
use rust_decimal::prelude::*;
use rust_decimal::Decimal;

/// Scaling factor for fixed-point quantities: 10^8
pub const SCALE: u64 = 100_000_000;

/// Largest whole-unit quantity that can be represented
pub const MAX_UNITS: u64 = u64::MAX / SCALE;

/// ASCII digits only; `\d` would also accept non-ASCII numerals.
const NUMERAL_PATTERN: &str = r"[0-9]+(?:\.[0-9]+)?";

fn numeral_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(NUMERAL_PATTERN).expect("numeral pattern is valid"))
}

// ============================================================================
// Parser input
// ============================================================================

/// Raw quantity as it arrives from a collaborator.
///
/// Payloads carry either a label, a bare number, or nothing at all.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum QuantityInput<'a> {
    /// No quantity supplied
    Absent,
    /// A bare number (may be non-finite if the caller got it from JSON math)
    Number(f64),
    /// A free-form label such as "50 meals"
    Text(&'a str),
}

impl<'a> From<&'a str> for QuantityInput<'a> {
    fn from(s: &'a str) -> Self {
        QuantityInput::Text(s)
    }
}

impl<'a> From<&'a String> for QuantityInput<'a> {
    fn from(s: &'a String) -> Self {
        QuantityInput::Text(s.as_str())
    }
}

impl From<f64> for QuantityInput<'_> {
    fn from(n: f64) -> Self {
        QuantityInput::Number(n)
    }
}

impl<'a, T> From<Option<T>> for QuantityInput<'a>
where
    T: Into<QuantityInput<'a>>,
{
    fn from(value: Option<T>) -> Self {
        value.map_or(QuantityInput::Absent, Into::into)
    }
}

// ============================================================================
// Parsing
// ============================================================================

/// Parse a quantity into fixed-point.
///
/// - `Absent` → `0`
/// - `Number` → the value itself if finite and non-negative, else `0`
/// - `Text` → the first numeral (`digits[.digits]`), else `0`
///
/// Values that overflow the fixed-point range also parse to `0`, which the
/// coordinator rejects as a non-positive quantity.
///
/// # Example
///
/// ```
/// use hungerlink_core::types::quantity::{parse, to_fixed, QuantityInput};
///
/// assert_eq!(parse("about 15 kg of rice"), to_fixed("15").unwrap());
/// assert_eq!(parse(12.5), to_fixed("12.5").unwrap());
/// assert_eq!(parse(f64::NAN), 0);
/// assert_eq!(parse(QuantityInput::Absent), 0);
/// ```
pub fn parse<'a>(input: impl Into<QuantityInput<'a>>) -> u64 {
    match input.into() {
        QuantityInput::Absent => 0,
        QuantityInput::Number(n) => {
            if !n.is_finite() {
                return 0;
            }
            Decimal::from_f64(n).and_then(decimal_to_fixed).unwrap_or(0)
        }
        QuantityInput::Text(s) => numeral_regex()
            .find(s)
            .and_then(|m| to_fixed(m.as_str()))
            .unwrap_or(0),
    }
}

// ============================================================================
// Conversion Functions
// ============================================================================

/// Whole units to fixed-point (saturating)
///
/// ```
/// use hungerlink_core::types::quantity::{units, SCALE};
///
/// assert_eq!(units(3), 3 * SCALE);
/// ```
pub fn units(n: u64) -> u64 {
    n.saturating_mul(SCALE)
}

/// Convert a decimal string to fixed-point u64
///
/// Returns `None` if parsing fails or the value is negative or out of range.
pub fn to_fixed(s: &str) -> Option<u64> {
    let decimal = Decimal::from_str(s).ok()?;
    decimal_to_fixed(decimal)
}

/// Convert a Decimal to fixed-point u64, rounding to 8 decimal places
pub fn decimal_to_fixed(d: Decimal) -> Option<u64> {
    if d.is_sign_negative() && !d.is_zero() {
        return None;
    }

    let scaled = d.checked_mul(Decimal::from(SCALE))?;
    scaled.round_dp(0).to_u64()
}

/// Convert fixed-point u64 to a Decimal
pub fn fixed_to_decimal(value: u64) -> Decimal {
    Decimal::from(value) / Decimal::from(SCALE)
}

/// Human-readable rendering with trailing zeros trimmed
///
/// ```
/// use hungerlink_core::types::quantity::from_fixed_trimmed;
///
/// assert_eq!(from_fixed_trimmed(5_000_000_000), "50");
/// assert_eq!(from_fixed_trimmed(150_000_000), "1.5");
/// ```
pub fn from_fixed_trimmed(value: u64) -> String {
    fixed_to_decimal(value).normalize().to_string()
}

// ============================================================================
// Unit Tests
// ============================================================================
