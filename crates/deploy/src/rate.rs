//! Percentage codec for the fixed-point rates used throughout asset configuration.
//!
//! Rates are written as human readable percentages (`"0.06%"`) and stored as integers
//! scaled by [`RATE_SCALE`], so `1%` is `1_000_000` and `100%` is [`RATE_ONE`].
//! Parsing goes through an exact decimal so that the same string always yields the same
//! integer, whatever the platform.

use alloy_core::primitives::U256;
use rust_decimal::{Decimal, RoundingStrategy, prelude::ToPrimitive};

/// Integer units per percentage point.
pub const RATE_SCALE: u64 = 1_000_000;

/// Fixed-point value of `100%`.
pub const RATE_ONE: u64 = 100 * RATE_SCALE;

/// Error returned when a rate string cannot be converted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormatError {
    #[error("rate `{0}` must end with `%`")]
    MissingSuffix(String),
    #[error("rate `{0}` is not a valid decimal")]
    InvalidDecimal(String),
    #[error("rate `{0}` must not be negative")]
    Negative(String),
    #[error("rate `{0}` does not fit the fixed-point range")]
    Overflow(String),
}

/// Parse a percentage string such as `"0.06%"` into its fixed-point value.
///
/// The numeric prefix is multiplied by [`RATE_SCALE`] and rounded half away from zero.
pub fn parse_rate(text: &str) -> Result<U256, FormatError> {
    let digits = text
        .strip_suffix('%')
        .ok_or_else(|| FormatError::MissingSuffix(text.to_string()))?;

    let value = Decimal::from_str_exact(significant_prefix(digits))
        .map_err(|_| FormatError::InvalidDecimal(text.to_string()))?;

    if value.is_sign_negative() && digits.bytes().any(|b| matches!(b, b'1'..=b'9')) {
        return Err(FormatError::Negative(text.to_string()));
    }

    let scaled = value
        .checked_mul(Decimal::from(RATE_SCALE))
        .ok_or_else(|| FormatError::Overflow(text.to_string()))?
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);

    scaled
        .abs()
        .to_u128()
        .map(U256::from)
        .ok_or_else(|| FormatError::Overflow(text.to_string()))
}

/// Fractional digits that can affect a parsed rate: six survive the scaling and the
/// seventh alone decides the rounding.
const SIGNIFICANT_FRACTION_DIGITS: usize = 7;

/// Drop the fractional digits past [`SIGNIFICANT_FRACTION_DIGITS`], so that inputs longer
/// than the 28 digits a [`Decimal`] holds still parse to the exact rounded value.
fn significant_prefix(digits: &str) -> &str {
    let Some((whole, fraction)) = digits.split_once('.') else {
        return digits;
    };
    if fraction.len() <= SIGNIFICANT_FRACTION_DIGITS
        || !fraction.bytes().all(|b| b.is_ascii_digit())
    {
        return digits;
    }
    &digits[..whole.len() + 1 + SIGNIFICANT_FRACTION_DIGITS]
}

/// Render a fixed-point rate back into its percentage string.
///
/// `parse_rate(&format_rate(x)) == Ok(x)` holds for every value `parse_rate` can produce.
pub fn format_rate(value: U256) -> String {
    let scale = U256::from(RATE_SCALE);
    let whole = value / scale;
    // The remainder is below RATE_SCALE, so the low limb holds all of it.
    let fraction = (value % scale).as_limbs()[0];

    if fraction == 0 {
        return format!("{whole}%");
    }

    let fraction = format!("{fraction:06}");
    format!("{whole}.{}%", fraction.trim_end_matches('0'))
}
