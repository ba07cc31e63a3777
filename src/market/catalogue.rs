//! Default harbours and species for a fresh install.

use anyhow::Result;
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::db::store::Store;
use crate::market::models::{Harbour, Species};

pub const DEFAULT_SPECIES_IMAGE: &str =
    "https://images.unsplash.com/photo-1524704654690-b56c05c78a00?auto=format&fit=crop&q=80&w=200";

/// (name, state)
pub const HARBOURS: &[(&str, &str)] = &[
    ("Veraval Harbour", "Gujarat"),
    ("Porbandar", "Gujarat"),
    ("Mangrol", "Gujarat"),
    ("Sassoon Dock", "Maharashtra"),
    ("Bhaucha Dhakka", "Maharashtra"),
    ("Ratnagiri", "Maharashtra"),
    ("Malpe Harbour", "Karnataka"),
    ("Mangalore Old Port", "Karnataka"),
    ("Karwar", "Karnataka"),
    ("Kochi Harbour", "Kerala"),
    ("Munambam", "Kerala"),
    ("Neendakara", "Kerala"),
    ("Thoothukudi", "Tamil Nadu"),
    ("Chennai Kasimedu", "Tamil Nadu"),
    ("Vizag Fishing Harbour", "Andhra Pradesh"),
    ("Kakinada", "Andhra Pradesh"),
    ("Paradip", "Odisha"),
    ("Digha Mohana", "West Bengal"),
];

/// (English name, local names)
pub const SPECIES: &[(&str, &str)] = &[
    ("Sardine", "Mathi / Tarli"),
    ("Mackerel", "Ayala / Bangda"),
    ("Seer Fish", "Neymeen / Surmai"),
    ("Prawns (Tiger)", "Chemmeen / Jhinga"),
    ("Prawns (White)", "Vella Chemmeen"),
    ("Tuna (Yellowfin)", "Choora / Kuppa"),
    ("Squid", "Koonthal / Calamari"),
    ("Cuttlefish", "Kanava"),
    ("Pomfret (Black)", "Karutha Avoli / Halwa"),
    ("Pomfret (Silver)", "Vella Avoli / Paplet"),
    ("Crab (Blue)", "Njandu / Kekda"),
    ("Anchovy", "Netholi / Kati"),
    ("Red Snapper", "Chemballi / Rane"),
    ("Grouper", "Kalava"),
    ("Barracuda", "Sheela"),
    ("Ribbon Fish", "Vaala / Pambadi"),
    ("Sole Fish", "Manthal / Lep"),
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SeedReport {
    pub harbours_added: usize,
    pub species_added: usize,
}

pub fn new_harbour(name: &str, state: &str) -> Harbour {
    Harbour {
        id: Uuid::new_v4().to_string(),
        name: name.trim().to_string(),
        state: state.trim().to_string(),
        last_updated_timestamp: chrono::Utc::now().timestamp_millis(),
    }
}

pub fn new_species(name_en: &str, name_local: &str) -> Species {
    Species {
        id: Uuid::new_v4().to_string(),
        name_en: name_en.trim().to_string(),
        name_local: name_local.trim().to_string(),
        image_url: DEFAULT_SPECIES_IMAGE.to_string(),
    }
}

/// Insert catalogue entries not already present. Matching is by name, so re-running is a no-op.
pub async fn seed(store: &Store) -> Result<SeedReport> {
    let mut report = SeedReport::default();

    for (name, state) in HARBOURS {
        if store.find_harbour_by_name(name).await?.is_none() {
            store.add_harbour(&new_harbour(name, state)).await?;
            report.harbours_added += 1;
        }
    }
    for (name_en, name_local) in SPECIES {
        if store.find_species_by_name(name_en).await?.is_none() {
            store.add_species(&new_species(name_en, name_local)).await?;
            report.species_added += 1;
        }
    }

    info!(harbours = report.harbours_added, species = report.species_added, "Catalogue seeded");
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalogue_sizes() {
        assert_eq!(HARBOURS.len(), 18);
        assert_eq!(SPECIES.len(), 17);
    }

    #[tokio::test]
    async fn test_seed_is_idempotent() {
        let store = Store::new(":memory:").await.unwrap();
        let first = seed(&store).await.unwrap();
        assert_eq!(first, SeedReport { harbours_added: 18, species_added: 17 });

        let second = seed(&store).await.unwrap();
        assert_eq!(second, SeedReport::default());
        assert_eq!(store.list_harbours().await.unwrap().len(), 18);
    }
}
