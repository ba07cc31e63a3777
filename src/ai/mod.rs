pub mod claude;
pub mod prompts;

use anyhow::Result;
use async_trait::async_trait;

use crate::market::models::{DailyRateSummary, PredictionPoint, Rate};

/// External forecaster. Any error means "unavailable" to callers.
#[async_trait]
pub trait ForecastProvider: Send + Sync {
    /// Predict the 7 days after the last entry of `history` (chronological order).
    async fn generate_forecast(&self, species_name: &str, history: &[Rate]) -> Result<Vec<PredictionPoint>>;

    fn name(&self) -> &str;
}

/// External market commentator. Any error means "unavailable" to callers.
#[async_trait]
pub trait NarrativeProvider: Send + Sync {
    async fn generate_narrative(&self, harbour_name: &str, summaries: &[DailyRateSummary]) -> Result<String>;

    fn name(&self) -> &str;
}
