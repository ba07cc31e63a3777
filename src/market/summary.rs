//! Per-species daily summaries for a harbour.

use std::cmp::Ordering;

use anyhow::Result;
use rust_decimal::Decimal;

use crate::analytics::change;
use crate::db::store::Store;
use crate::market::models::{DailyRateSummary, Rate, Species};

/// Build the summary for one species from its rates, newest first.
///
/// The change compares the latest two observations, however far apart.
pub fn summarize_species(species: Species, rates_newest_first: &[Rate], history_window: usize) -> DailyRateSummary {
    let latest_rate = rates_newest_first.first().cloned();
    let previous_rate = rates_newest_first.get(1).cloned();

    let change = change::classify(
        latest_rate.as_ref().map(|r| r.price_per_kg).unwrap_or(Decimal::ZERO),
        previous_rate.as_ref().map(|r| r.price_per_kg).unwrap_or(Decimal::ZERO),
    );

    DailyRateSummary {
        species,
        latest_rate,
        previous_rate,
        change,
        history: rates_newest_first.iter().take(history_window).cloned().collect(),
    }
}

/// Summaries for every known species at `harbour_id`, highest latest price first.
///
/// Species with no rates at this harbour sort last, by name.
pub async fn build_daily_summaries(store: &Store, harbour_id: &str, history_window: usize) -> Result<Vec<DailyRateSummary>> {
    let species = store.list_species().await?;
    let mut summaries = Vec::with_capacity(species.len());

    for sp in species {
        let rates = store.recent_rates(harbour_id, &sp.id, history_window.max(2)).await?;
        summaries.push(summarize_species(sp, &rates, history_window));
    }

    sort_by_latest_price(&mut summaries);
    Ok(summaries)
}

pub fn sort_by_latest_price(summaries: &mut [DailyRateSummary]) {
    summaries.sort_by(|a, b| match (a.latest_price(), b.latest_price()) {
        (Some(pa), Some(pb)) => pb.cmp(&pa),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.species.name_en.cmp(&b.species.name_en),
    });
}
