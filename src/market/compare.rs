//! Cross-harbour price comparison and catch revenue.

use anyhow::Result;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;

use crate::db::store::Store;
use crate::market::models::Species;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Cheaper {
    First,
    Second,
    Equal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HarbourComparison {
    pub species: Species,
    pub first_price: Option<Decimal>,
    pub second_price: Option<Decimal>,
    /// `second - first`, when both harbours have a price.
    pub difference: Option<Decimal>,
    pub cheaper: Option<Cheaper>,
}

/// Compare the latest price of each species at two harbours.
///
/// Uses the most recent rate at each harbour, whatever its date.
pub async fn compare_harbours(store: &Store, first_harbour: &str, second_harbour: &str) -> Result<Vec<HarbourComparison>> {
    let species = store.list_species().await?;
    let mut rows = Vec::with_capacity(species.len());

    for sp in species {
        let first_price = latest_price(store, first_harbour, &sp.id).await?;
        let second_price = latest_price(store, second_harbour, &sp.id).await?;
        rows.push(compare_prices(sp, first_price, second_price));
    }

    Ok(rows)
}

async fn latest_price(store: &Store, harbour_id: &str, species_id: &str) -> Result<Option<Decimal>> {
    let rates = store.recent_rates(harbour_id, species_id, 1).await?;
    Ok(rates.first().map(|r| r.price_per_kg))
}

pub fn compare_prices(species: Species, first_price: Option<Decimal>, second_price: Option<Decimal>) -> HarbourComparison {
    let (difference, cheaper) = match (first_price, second_price) {
        (Some(a), Some(b)) => {
            let cheaper = if a < b {
                Cheaper::First
            } else if b < a {
                Cheaper::Second
            } else {
                Cheaper::Equal
            };
            (Some(b - a), Some(cheaper))
        }
        _ => (None, None),
    };

    HarbourComparison {
        species,
        first_price,
        second_price,
        difference,
        cheaper,
    }
}

/// Revenue for `quantity_kg` of catch at `price_per_kg`. Negative quantities earn nothing.
pub fn estimate_revenue(quantity_kg: Decimal, price_per_kg: Decimal) -> Decimal {
    quantity_kg.max(Decimal::ZERO).saturating_mul(price_per_kg)
}

/// Whole-rupee amount with Indian digit grouping, e.g. `₹12,34,567`.
pub fn format_inr(amount: Decimal) -> String {
    let rounded = amount.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
    let sign = if rounded.is_sign_negative() && !rounded.is_zero() { "-" } else { "" };
    let digits = rounded.abs().trunc().to_string();

    format!("{sign}₹{}", group_indian(&digits))
}

/// Last three digits, then groups of two.
fn group_indian(digits: &str) -> String {
    if digits.len() <= 3 {
        return digits.to_string();
    }
    let (head, tail) = digits.split_at(digits.len() - 3);

    let mut groups: Vec<&str> = Vec::new();
    let mut end = head.len();
    while end > 0 {
        let start = end.saturating_sub(2);
        groups.push(&head[start..end]);
        end = start;
    }
    groups.reverse();

    format!("{},{tail}", groups.join(","))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn species() -> Species {
        Species {
            id: "s1".to_string(),
            name_en: "Seer Fish".to_string(),
            name_local: "Neymeen".to_string(),
            image_url: String::new(),
        }
    }

    #[test]
    fn test_format_inr() {
        assert_eq!(format_inr(dec!(0)), "₹0");
        assert_eq!(format_inr(dec!(999)), "₹999");
        assert_eq!(format_inr(dec!(1000)), "₹1,000");
        assert_eq!(format_inr(dec!(123456)), "₹1,23,456");
        assert_eq!(format_inr(dec!(1234567.5)), "₹12,34,568");
        assert_eq!(format_inr(dec!(-45210)), "-₹45,210");
        assert_eq!(format_inr(dec!(-0.4)), "₹0");
    }

    #[test]
    fn test_estimate_revenue() {
        assert_eq!(estimate_revenue(dec!(25.5), dec!(180)), dec!(4590));
        assert_eq!(estimate_revenue(dec!(-3), dec!(180)), Decimal::ZERO);
    }

    #[test]
    fn test_compare_prices() {
        let row = compare_prices(species(), Some(dec!(650)), Some(dec!(600)));
        assert_eq!(row.difference, Some(dec!(-50)));
        assert_eq!(row.cheaper, Some(Cheaper::Second));

        let row = compare_prices(species(), Some(dec!(600)), Some(dec!(600)));
        assert_eq!(row.cheaper, Some(Cheaper::Equal));

        let row = compare_prices(species(), None, Some(dec!(600)));
        assert!(row.difference.is_none());
        assert!(row.cheaper.is_none());
    }
}
