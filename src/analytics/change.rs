//! Period-over-period price change classification.

use rust_decimal::{Decimal, RoundingStrategy};

use crate::market::models::{ChangeStatus, RateChangeResult};

/// Classify the move from `price_previous` to `price_today`.
///
/// A previous price of zero means "no prior observation".
pub fn classify(price_today: Decimal, price_previous: Decimal) -> RateChangeResult {
    if price_previous.is_zero() {
        return RateChangeResult {
            status: ChangeStatus::Same,
            percent_diff: Decimal::ZERO,
            description: "No previous data".to_string(),
        };
    }

    let diff = price_today - price_previous;
    let percent_diff = percent_of(diff.abs(), price_previous);

    let status = if diff > Decimal::ZERO {
        ChangeStatus::Up
    } else if diff < Decimal::ZERO {
        ChangeStatus::Down
    } else {
        ChangeStatus::Same
    };

    let shown = percent_diff.normalize();
    let description = match status {
        ChangeStatus::Up => format!("Up {shown}%"),
        ChangeStatus::Down => format!("Down {shown}%"),
        ChangeStatus::Same => "No Change".to_string(),
    };

    RateChangeResult {
        status,
        percent_diff,
        description,
    }
}

/// `part / whole * 100`, rounded to two decimals.
fn percent_of(part: Decimal, whole: Decimal) -> Decimal {
    super::saturating_percent(part, whole).round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}
