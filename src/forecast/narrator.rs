//! Plain-language reading of a 7-day forecast.

use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;

use crate::market::models::PredictionPoint;

const STRONG_MOVE_PCT: Decimal = dec!(15);
const MODERATE_MOVE_PCT: Decimal = dec!(5);

pub const INSUFFICIENT_DATA: &str = "Insufficient data for a reliable forecast.";

/// Classify the forecast against today's price and recommend an action.
///
/// The first matching rule wins: week-long strong moves, then next-day
/// moves, then week-long moderate moves.
pub fn narrate(species_name: &str, current_price: Decimal, predictions: &[PredictionPoint]) -> String {
    let (Some(next_day), Some(week_end)) = (predictions.first(), predictions.last()) else {
        return INSUFFICIENT_DATA.to_string();
    };
    if current_price <= Decimal::ZERO {
        return INSUFFICIENT_DATA.to_string();
    }

    let short_term = percent_change(current_price, next_day.price);
    let long_term = percent_change(current_price, week_end.price);

    if long_term > STRONG_MOVE_PCT {
        format!(
            "Strong bullish trend detected for {species_name}. Prices are expected to surge by ~{}% over the week. Recommendation: Hold stock for better margins.",
            whole(long_term)
        )
    } else if long_term < -STRONG_MOVE_PCT {
        format!(
            "Bearish outlook for {species_name}. Prices might drop by ~{}% this week. Recommendation: Sell now to avoid further depreciation.",
            whole(long_term).abs()
        )
    } else if short_term > MODERATE_MOVE_PCT {
        "Short-term spike expected. Prices may rise tomorrow. Good opportunity for quick sales before stabilization.".to_string()
    } else if short_term < -MODERATE_MOVE_PCT {
        "Minor dip expected tomorrow. Buyers might find better deals if they wait 24 hours.".to_string()
    } else if long_term > MODERATE_MOVE_PCT {
        "Steady upward growth. Expect consistent but small gains throughout the week.".to_string()
    } else if long_term < -MODERATE_MOVE_PCT {
        "Slow decline predicted. Consider clearing stock sooner rather than later.".to_string()
    } else {
        format!(
            "Market is stable. {species_name} prices are expected to remain within a narrow range. Safe to trade as usual with low volatility."
        )
    }
}

fn percent_change(from: Decimal, to: Decimal) -> Decimal {
    crate::analytics::saturating_percent(to - from, from)
}

fn whole(pct: Decimal) -> Decimal {
    pct.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
}
