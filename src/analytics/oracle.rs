//! Deterministic market oracle.
//!
//! Produces a three-part narrative (trend, Captain's Call, outlook) from a
//! harbour's daily summaries. Used whenever the AI narrative is unavailable.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::market::models::{ChangeStatus, DailyRateSummary, OracleSummary};

/// Moves at or below this percent read as calm water.
const CALM_EPSILON_PCT: Decimal = dec!(2);

/// Moves above this percent are worth acting on, and count as volatile.
const MATERIAL_MOVE_PCT: Decimal = dec!(5);

/// More volatile species than this means a volatile outlook.
const VOLATILE_SPECIES_LIMIT: usize = 3;

pub fn summarize(summaries: &[DailyRateSummary]) -> OracleSummary {
    if summaries.is_empty() {
        return OracleSummary {
            trend: "No market data available yet.".to_string(),
            action: "Market status unknown.".to_string(),
            outlook: "Please check back later.".to_string(),
        };
    }

    OracleSummary {
        trend: trend_line(summaries),
        action: action_line(summaries),
        outlook: outlook_line(summaries),
    }
}

fn trend_line(summaries: &[DailyRateSummary]) -> String {
    let mover = largest_mover(summaries.iter().filter(|s| s.change.status != ChangeStatus::Same));

    match mover {
        Some(s) if s.change.percent_diff > CALM_EPSILON_PCT => {
            let (direction, impact) = match s.change.status {
                ChangeStatus::Up => ("surged", "Sellers are making good profit."),
                _ => ("dropped", "Buyers are finding great deals."),
            };
            format!(
                "🌊 Big Wave: {} prices {direction} by {:.1}% today. {impact}",
                s.species.name_en, s.change.percent_diff
            )
        }
        _ => "🌊 The waters are calm today. Prices are stable across the board.".to_string(),
    }
}

fn action_line(summaries: &[DailyRateSummary]) -> String {
    let top_drop = largest_mover(summaries.iter().filter(|s| s.change.status == ChangeStatus::Down));
    let top_gain = largest_mover(summaries.iter().filter(|s| s.change.status == ChangeStatus::Up));

    if let Some(s) = top_drop.filter(|s| s.change.percent_diff > MATERIAL_MOVE_PCT) {
        return format!(
            "⚓ Captain's Call: BUY {}! Price is down {:.1}%. Great time to stock up.",
            s.species.name_en, s.change.percent_diff
        );
    }
    if let Some(s) = top_gain.filter(|s| s.change.percent_diff > MATERIAL_MOVE_PCT) {
        return format!(
            "⚓ Captain's Call: SELL {}! Price is up {:.1}%. Lock in your profits.",
            s.species.name_en, s.change.percent_diff
        );
    }

    let up = count_status(summaries, ChangeStatus::Up);
    let down = count_status(summaries, ChangeStatus::Down);
    if up > down {
        "⚓ Captain's Call: It's a seller's market today. Most prices are trending up.".to_string()
    } else if down > up {
        "⚓ Captain's Call: It's a buyer's market today. Good deals available on many species."
            .to_string()
    } else {
        "⚓ Captain's Call: Hold steady. No major opportunities right now.".to_string()
    }
}

fn outlook_line(summaries: &[DailyRateSummary]) -> String {
    let volatile = summaries
        .iter()
        .filter(|s| s.change.percent_diff.abs() > MATERIAL_MOVE_PCT)
        .count();

    if volatile > VOLATILE_SPECIES_LIMIT {
        "🔮 The Horizon: High volatility detected. Expect rapid price changes tomorrow.".to_string()
    } else {
        "🔮 The Horizon: Prices are stable. Expect steady trading conditions tomorrow.".to_string()
    }
}

/// Largest absolute move; ties keep the first in input order.
fn largest_mover<'a>(
    summaries: impl Iterator<Item = &'a DailyRateSummary>,
) -> Option<&'a DailyRateSummary> {
    summaries.fold(None, |best: Option<&DailyRateSummary>, s| match best {
        Some(b) if b.change.percent_diff.abs() >= s.change.percent_diff.abs() => Some(b),
        _ => Some(s),
    })
}

fn count_status(summaries: &[DailyRateSummary], status: ChangeStatus) -> usize {
    summaries.iter().filter(|s| s.change.status == status).count()
}
