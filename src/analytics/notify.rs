//! Subscriber alert threshold.
//!
//! Lower bar than the anomaly guard: a 10%+ move is worth telling
//! subscribers about even when it needs no admin confirmation.

use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;

/// Percent move above which subscribers are alerted.
pub const NOTIFY_THRESHOLD_PCT: Decimal = dec!(10);

pub fn should_notify(old_price: Decimal, new_price: Decimal) -> bool {
    if old_price.is_zero() {
        return false;
    }
    super::saturating_percent((new_price - old_price).abs(), old_price) > NOTIFY_THRESHOLD_PCT
}

/// Signed percent change, one decimal, for alert text.
pub fn signed_change_pct(old_price: Decimal, new_price: Decimal) -> Decimal {
    if old_price.is_zero() {
        return Decimal::ZERO;
    }
    super::saturating_percent(new_price - old_price, old_price)
        .round_dp_with_strategy(1, RoundingStrategy::MidpointAwayFromZero)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_is_exclusive() {
        assert!(should_notify(dec!(100), dec!(111)));
        assert!(!should_notify(dec!(100), dec!(110)));
        assert!(should_notify(dec!(100), dec!(89)));
        assert!(!should_notify(dec!(100), dec!(90)));
    }

    #[test]
    fn test_no_old_price_never_notifies() {
        assert!(!should_notify(Decimal::ZERO, dec!(500)));
    }

    #[test]
    fn test_signed_change_pct() {
        assert_eq!(signed_change_pct(dec!(100), dec!(135)), dec!(35.0));
        assert_eq!(signed_change_pct(dec!(300), dec!(250)), dec!(-16.7));
        assert_eq!(signed_change_pct(Decimal::ZERO, dec!(1)), Decimal::ZERO);
    }

    #[test]
    fn test_extreme_ratio_saturates() {
        let tiny = Decimal::new(1, 25);
        assert!(should_notify(tiny, dec!(10000000000)));
        assert_eq!(signed_change_pct(tiny, dec!(10000000000)), Decimal::MAX);
    }
}
