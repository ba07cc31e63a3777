//! Abnormal price-change detection for admin submissions.
//!
//! A soft gate: a flagged price is held back until the admin confirms it.
//! The guard itself keeps no confirmation state.

use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::Serialize;

/// Relative change above which a submission needs confirmation.
pub const ANOMALY_THRESHOLD: Decimal = dec!(0.30);

/// Whether `price_today` moved more than 30% away from `price_previous`.
///
/// A previous price of zero is the first observation and is never abnormal.
pub fn is_abnormal(price_today: Decimal, price_previous: Decimal) -> bool {
    if price_previous.is_zero() {
        return false;
    }
    relative_change(price_today, price_previous) > ANOMALY_THRESHOLD
}

fn relative_change(price_today: Decimal, price_previous: Decimal) -> Decimal {
    super::saturating_ratio((price_today - price_previous).abs(), price_previous)
}

/// What the submitting admin is shown when a price is held back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnomalyWarning {
    pub previous_price: Decimal,
    pub submitted_price: Decimal,
    /// Absolute change in percent, unrounded.
    pub percent: Decimal,
}

impl AnomalyWarning {
    /// Build a warning if the submission trips the guard.
    pub fn check(price_today: Decimal, price_previous: Decimal) -> Option<Self> {
        if !is_abnormal(price_today, price_previous) {
            return None;
        }
        Some(Self {
            previous_price: price_previous,
            submitted_price: price_today,
            percent: super::saturating_percent((price_today - price_previous).abs(), price_previous),
        })
    }

    pub fn message(&self) -> String {
        let shown = self
            .percent
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
        format!(
            "Warning: Abnormal price change detected ({shown}%). Previous: ₹{}. Please confirm.",
            self.previous_price.normalize()
        )
    }
}
