//! 7-day price forecasting.
//!
//! Asks the AI forecaster first and falls back to the deterministic-regime
//! random walk on any failure. Callers never see an error.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{info, warn};

use crate::ai::ForecastProvider;
use crate::analytics::dates;
use crate::forecast::fallback::{self, FORECAST_DAYS};
use crate::market::models::{PredictionPoint, Rate};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ForecastSource {
    Ai,
    Fallback,
}

#[derive(Debug, Clone, Serialize)]
pub struct Forecast {
    pub source: ForecastSource,
    pub points: Vec<PredictionPoint>,
}

pub struct ForecastEngine {
    provider: Option<Arc<dyn ForecastProvider>>,
    timeout: Duration,
}

impl ForecastEngine {
    pub fn new(provider: Option<Arc<dyn ForecastProvider>>, timeout: Duration) -> Self {
        Self { provider, timeout }
    }

    /// Engine that always uses the fallback.
    pub fn offline() -> Self {
        Self::new(None, Duration::ZERO)
    }

    /// Forecast the 7 days after the latest entry of `history`.
    ///
    /// `history` may be in any order. `current_price` seeds the fallback walk.
    pub async fn forecast(&self, species_name: &str, history: &[Rate], current_price: Decimal) -> Forecast {
        let mut chronological = history.to_vec();
        chronological.sort_by_key(|r| r.date);
        let anchor = chronological
            .last()
            .map(|r| r.date)
            .unwrap_or_else(dates::today);

        if let Some(points) = self.try_provider(species_name, &chronological, anchor).await {
            return Forecast {
                source: ForecastSource::Ai,
                points,
            };
        }

        let points = fallback::generate(species_name, current_price, anchor, &mut rand::thread_rng());
        info!(species = species_name, anchor = %anchor, "Using fallback forecast");
        Forecast {
            source: ForecastSource::Fallback,
            points,
        }
    }

    async fn try_provider(
        &self,
        species_name: &str,
        chronological: &[Rate],
        anchor: NaiveDate,
    ) -> Option<Vec<PredictionPoint>> {
        let provider = self.provider.as_ref()?;
        if chronological.is_empty() {
            return None;
        }

        let call = provider.generate_forecast(species_name, chronological);
        let points = match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(points)) => points,
            Ok(Err(e)) => {
                warn!(provider = provider.name(), species = species_name, error = %e, "Forecast provider failed");
                return None;
            }
            Err(_) => {
                warn!(provider = provider.name(), species = species_name, timeout = ?self.timeout, "Forecast provider timed out");
                return None;
            }
        };

        match validate_forecast(&points, anchor) {
            Ok(()) => Some(points),
            Err(e) => {
                warn!(provider = provider.name(), species = species_name, error = %e, "Rejected malformed forecast");
                None
            }
        }
    }
}

/// Exactly 7 non-negative points covering the days after `anchor`, in order.
pub fn validate_forecast(points: &[PredictionPoint], anchor: NaiveDate) -> Result<()> {
    if points.len() != FORECAST_DAYS as usize {
        bail!("expected {FORECAST_DAYS} points, got {}", points.len());
    }
    for (point, expected) in points.iter().zip(dates::following_days(anchor, FORECAST_DAYS)) {
        if point.date != expected {
            bail!("expected date {expected}, got {}", point.date);
        }
        if point.price < Decimal::ZERO {
            bail!("negative price {} on {}", point.price, point.date);
        }
    }
    Ok(())
}
