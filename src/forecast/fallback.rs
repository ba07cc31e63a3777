//! Deterministic-regime random-walk forecast.
//!
//! The species name picks a trend regime and a volatility band through a
//! stable string hash, so a species always "behaves" the same way. The
//! per-day steps draw from an ordinary RNG and differ between calls.

use chrono::NaiveDate;
use rand::Rng;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::analytics::dates;
use crate::market::models::PredictionPoint;

pub const FORECAST_DAYS: u64 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TrendRegime {
    Upward,
    Downward,
    Volatile,
}

/// Regime and volatility derived from a species name.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FallbackProfile {
    pub regime: TrendRegime,
    /// Maximum per-day relative move, in `[0.02, 0.11]`.
    pub volatility: f64,
}

impl FallbackProfile {
    pub fn for_species(species_name: &str) -> Self {
        let magnitude = species_hash(species_name).unsigned_abs();
        let regime = match magnitude % 3 {
            0 => TrendRegime::Upward,
            1 => TrendRegime::Downward,
            _ => TrendRegime::Volatile,
        };
        let volatility = f64::from(magnitude % 10) / 100.0 + 0.02;
        Self { regime, volatility }
    }

    /// Relative change for one day given a uniform draw in `[0, 1)`.
    fn step(&self, draw: f64) -> f64 {
        match self.regime {
            TrendRegime::Upward => draw * self.volatility,
            TrendRegime::Downward => -(draw * self.volatility),
            TrendRegime::Volatile => (draw - 0.5) * (self.volatility * 2.0),
        }
    }
}

/// 32-bit polynomial string hash (`h * 31 + c`) over UTF-16 code units.
pub fn species_hash(name: &str) -> i32 {
    name.encode_utf16().fold(0i32, |hash, unit| {
        i32::from(unit).wrapping_add(hash.wrapping_shl(5).wrapping_sub(hash))
    })
}

/// Seven days of synthetic prices following `anchor`, starting from `current_price`.
pub fn generate<R: Rng>(
    species_name: &str,
    current_price: Decimal,
    anchor: NaiveDate,
    rng: &mut R,
) -> Vec<PredictionPoint> {
    let profile = FallbackProfile::for_species(species_name);
    let mut price = current_price.to_f64().unwrap_or(0.0);

    dates::following_days(anchor, FORECAST_DAYS)
        .into_iter()
        .map(|date| {
            price += price * profile.step(rng.gen::<f64>());
            let rounded = Decimal::try_from(price.round()).unwrap_or(Decimal::ZERO);
            PredictionPoint {
                date,
                price: rounded.max(Decimal::ZERO),
            }
        })
        .collect()
}
