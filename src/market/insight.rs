//! Harbour market commentary: AI narrative with the oracle as fallback.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::warn;

use crate::ai::NarrativeProvider;
use crate::analytics::oracle;
use crate::market::models::{DailyRateSummary, OracleSummary};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InsightSource {
    Ai,
    Oracle,
}

#[derive(Debug, Clone, Serialize)]
pub struct MarketInsight {
    pub source: InsightSource,
    pub text: String,
    pub oracle: OracleSummary,
}

pub struct MarketAnalyst {
    provider: Option<Arc<dyn NarrativeProvider>>,
    timeout: Duration,
}

impl MarketAnalyst {
    pub fn new(provider: Option<Arc<dyn NarrativeProvider>>, timeout: Duration) -> Self {
        Self { provider, timeout }
    }

    pub fn offline() -> Self {
        Self::new(None, Duration::ZERO)
    }

    pub async fn insight(&self, harbour_name: &str, summaries: &[DailyRateSummary]) -> MarketInsight {
        // Species without any rate say nothing about the market.
        let priced: Vec<DailyRateSummary> = summaries
            .iter()
            .filter(|s| s.latest_rate.is_some())
            .cloned()
            .collect();
        let oracle = oracle::summarize(&priced);

        if let Some(text) = self.try_provider(harbour_name, &priced).await {
            return MarketInsight {
                source: InsightSource::Ai,
                text,
                oracle,
            };
        }

        MarketInsight {
            source: InsightSource::Oracle,
            text: oracle.to_text(),
            oracle,
        }
    }

    async fn try_provider(&self, harbour_name: &str, summaries: &[DailyRateSummary]) -> Option<String> {
        let provider = self.provider.as_ref()?;
        if summaries.is_empty() {
            return None;
        }

        match tokio::time::timeout(self.timeout, provider.generate_narrative(harbour_name, summaries)).await {
            Ok(Ok(text)) if !text.trim().is_empty() => Some(text),
            Ok(Ok(_)) => {
                warn!(provider = provider.name(), harbour = harbour_name, "Narrative provider returned empty text");
                None
            }
            Ok(Err(e)) => {
                warn!(provider = provider.name(), harbour = harbour_name, error = %e, "Narrative provider failed");
                None
            }
            Err(_) => {
                warn!(provider = provider.name(), harbour = harbour_name, "Narrative provider timed out");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::dates::parse_date;
    use crate::market::models::{Rate, Species, VerificationLevel};
    use crate::market::summary::summarize_species;
    use anyhow::{bail, Result};
    use async_trait::async_trait;
    use rust_decimal_macros::dec;

    struct FixedNarrative(Option<&'static str>);

    #[async_trait]
    impl NarrativeProvider for FixedNarrative {
        async fn generate_narrative(&self, _harbour: &str, _summaries: &[DailyRateSummary]) -> Result<String> {
            match self.0 {
                Some(text) => Ok(text.to_string()),
                None => bail!("quota exceeded"),
            }
        }

        fn name(&self) -> &str {
            "fixed"
        }
    }

    fn summaries() -> Vec<DailyRateSummary> {
        let species = Species {
            id: "s1".to_string(),
            name_en: "Sardine".to_string(),
            name_local: "Mathi".to_string(),
            image_url: String::new(),
        };
        let rate = |date: &str, price| Rate {
            id: date.to_string(),
            harbour_id: "h1".to_string(),
            species_id: "s1".to_string(),
            price_per_kg: price,
            date: parse_date(date).unwrap(),
            source_admin_id: "admin".to_string(),
            verification_level: VerificationLevel::Verified,
            lots_checked: 2,
            rate_confidence_score: 60,
        };
        vec![summarize_species(species, &[rate("2025-04-02", dec!(120)), rate("2025-04-01", dec!(100))], 7)]
    }

    #[tokio::test]
    async fn test_ai_narrative_used() {
        let analyst = MarketAnalyst::new(Some(Arc::new(FixedNarrative(Some("Sardines are up.")))), Duration::from_secs(1));
        let insight = analyst.insight("Kochi", &summaries()).await;
        assert_eq!(insight.source, InsightSource::Ai);
        assert_eq!(insight.text, "Sardines are up.");
    }

    #[tokio::test]
    async fn test_failure_falls_back_to_oracle() {
        let analyst = MarketAnalyst::new(Some(Arc::new(FixedNarrative(None))), Duration::from_secs(1));
        let insight = analyst.insight("Kochi", &summaries()).await;
        assert_eq!(insight.source, InsightSource::Oracle);
        assert_eq!(insight.text, insight.oracle.to_text());
        assert!(insight.text.contains("Sardine"));
    }

    #[tokio::test]
    async fn test_empty_text_falls_back() {
        let analyst = MarketAnalyst::new(Some(Arc::new(FixedNarrative(Some("  ")))), Duration::from_secs(1));
        assert_eq!(analyst.insight("Kochi", &summaries()).await.source, InsightSource::Oracle);
    }

    #[tokio::test]
    async fn test_no_data_skips_provider() {
        let analyst = MarketAnalyst::new(Some(Arc::new(FixedNarrative(Some("made up")))), Duration::from_secs(1));
        let insight = analyst.insight("Kochi", &[]).await;
        assert_eq!(insight.source, InsightSource::Oracle);
        assert!(insight.text.starts_with("No market data available yet."));
    }
    #[tokio::test]
    async fn test_seeded_harbour_without_rates_reports_no_data() {
        let store = crate::db::store::Store::new(":memory:").await.unwrap();
        crate::market::catalogue::seed(&store).await.unwrap();
        let harbour = store.list_harbours().await.unwrap().remove(0);
        let summaries = crate::market::summary::build_daily_summaries(&store, &harbour.id, 7).await.unwrap();
        assert!(!summaries.is_empty());

        let analyst = MarketAnalyst::new(Some(Arc::new(FixedNarrative(Some("made up")))), Duration::from_secs(1));
        let insight = analyst.insight(&harbour.name, &summaries).await;
        assert_eq!(insight.source, InsightSource::Oracle);
        assert!(insight.text.starts_with("No market data available yet."));
        assert_eq!(insight.oracle.action, "Market status unknown.");
    }

    #[tokio::test]
    async fn test_unpriced_species_do_not_calm_the_market() {
        let mut all = summaries();
        let empty = Species {
            id: "s2".to_string(),
            name_en: "Mackerel".to_string(),
            name_local: "Ayala".to_string(),
            image_url: String::new(),
        };
        all.push(summarize_species(empty.clone(), &[], 7));
        all.push(summarize_species(Species { id: "s3".to_string(), ..empty }, &[], 7));

        let insight = MarketAnalyst::offline().insight("Kochi", &all).await;
        assert_eq!(insight.oracle, oracle::summarize(&summaries()));
        assert!(insight.text.contains("Sardine"));
    }
}
