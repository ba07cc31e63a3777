//! Pure rate-accuracy and market analytics.
//!
//! Everything here is synchronous and free of I/O.

pub mod anomaly;
pub mod change;
pub mod confidence;
pub mod dates;
pub mod notify;
pub mod oracle;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// `part / whole`, saturating at `Decimal::MAX` / `Decimal::MIN` instead of overflowing.
///
/// `whole` must be non-zero.
pub(crate) fn saturating_ratio(part: Decimal, whole: Decimal) -> Decimal {
    part.checked_div(whole).unwrap_or_else(|| saturated(part, whole))
}

/// `part / whole * 100`, saturating like [`saturating_ratio`].
pub(crate) fn saturating_percent(part: Decimal, whole: Decimal) -> Decimal {
    saturating_ratio(part, whole)
        .checked_mul(dec!(100))
        .unwrap_or_else(|| saturated(part, whole))
}

fn saturated(part: Decimal, whole: Decimal) -> Decimal {
    if part.is_sign_negative() != whole.is_sign_negative() {
        Decimal::MIN
    } else {
        Decimal::MAX
    }
}
