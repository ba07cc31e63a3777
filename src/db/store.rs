use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{FromRow, SqlitePool};
use std::str::FromStr;

use crate::analytics::dates::{format_date, parse_date};
use crate::market::models::{Harbour, Rate, Species, Subscriber, VerificationLevel};

pub struct Store {
    pool: SqlitePool,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct HarbourRecord {
    pub id: String,
    pub name: String,
    pub state: String,
    pub last_updated_timestamp: i64,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct SpeciesRecord {
    pub id: String,
    pub name_en: String,
    pub name_local: String,
    pub image_url: String,
}

/// Rate row as stored: price as TEXT, date as `YYYY-MM-DD`.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct RateRecord {
    pub id: String,
    pub harbour_id: String,
    pub species_id: String,
    pub price_per_kg: String,
    pub date: String,
    pub source_admin_id: String,
    pub verification_level: String,
    pub lots_checked: i64,
    pub rate_confidence_score: i64,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct SubscriberRecord {
    pub id: String,
    pub phone_number: String,
    pub harbour_id_subscribed: String,
    pub opt_in_date: String,
}

impl From<HarbourRecord> for Harbour {
    fn from(r: HarbourRecord) -> Self {
        Harbour {
            id: r.id,
            name: r.name,
            state: r.state,
            last_updated_timestamp: r.last_updated_timestamp,
        }
    }
}

impl From<SpeciesRecord> for Species {
    fn from(r: SpeciesRecord) -> Self {
        Species {
            id: r.id,
            name_en: r.name_en,
            name_local: r.name_local,
            image_url: r.image_url,
        }
    }
}

impl From<SubscriberRecord> for Subscriber {
    fn from(r: SubscriberRecord) -> Self {
        Subscriber {
            id: r.id,
            phone_number: r.phone_number,
            harbour_id_subscribed: r.harbour_id_subscribed,
            opt_in_date: r.opt_in_date,
        }
    }
}

impl TryFrom<RateRecord> for Rate {
    type Error = anyhow::Error;

    fn try_from(r: RateRecord) -> Result<Self> {
        let price_per_kg = Decimal::from_str(&r.price_per_kg)
            .with_context(|| format!("Corrupt price {:?} on rate {}", r.price_per_kg, r.id))?;
        let date = parse_date(&r.date).with_context(|| format!("Corrupt date on rate {}", r.id))?;
        let verification_level = VerificationLevel::from_str(&r.verification_level)
            .with_context(|| format!("Corrupt verification level on rate {}", r.id))?;

        Ok(Rate {
            id: r.id,
            harbour_id: r.harbour_id,
            species_id: r.species_id,
            price_per_kg,
            date,
            source_admin_id: r.source_admin_id,
            verification_level,
            lots_checked: u32::try_from(r.lots_checked).unwrap_or(0),
            rate_confidence_score: u8::try_from(r.rate_confidence_score).unwrap_or(0),
        })
    }
}

fn into_rates(records: Vec<RateRecord>) -> Result<Vec<Rate>> {
    records.into_iter().map(Rate::try_from).collect()
}

impl Store {
    /// Get a reference to the underlying connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn new(database_path: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(&format!("sqlite:{database_path}"))
            .context("Invalid database path")?
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

        // Every in-memory connection is its own database
        let max_connections = if database_path == ":memory:" { 1 } else { 5 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .context("Failed to connect to SQLite database")?;

        let store = Self { pool };
        store.migrate().await?;

        Ok(store)
    }

    async fn migrate(&self) -> Result<()> {
        let migration_sql = include_str!("../../migrations/001_init.sql");
        // Execute each statement separately (sqlx doesn't support multiple statements in one call)
        for statement in migration_sql.split(';') {
            let trimmed = statement.trim();
            if !trimmed.is_empty() {
                sqlx::query(trimmed)
                    .execute(&self.pool)
                    .await
                    .with_context(|| format!("Failed to execute migration: {trimmed}"))?;
            }
        }
        Ok(())
    }

    // --- Harbour operations ---

    pub async fn list_harbours(&self) -> Result<Vec<Harbour>> {
        let rows = sqlx::query_as::<_, HarbourRecord>("SELECT * FROM harbours ORDER BY name")
            .fetch_all(&self.pool)
            .await
            .context("Failed to fetch harbours")?;
        Ok(rows.into_iter().map(Harbour::from).collect())
    }

    pub async fn get_harbour(&self, id: &str) -> Result<Option<Harbour>> {
        let row = sqlx::query_as::<_, HarbourRecord>("SELECT * FROM harbours WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch harbour")?;
        Ok(row.map(Harbour::from))
    }

    pub async fn find_harbour_by_name(&self, name: &str) -> Result<Option<Harbour>> {
        let row = sqlx::query_as::<_, HarbourRecord>(
            "SELECT * FROM harbours WHERE lower(name) = lower(?) LIMIT 1",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch harbour by name")?;
        Ok(row.map(Harbour::from))
    }

    pub async fn add_harbour(&self, harbour: &Harbour) -> Result<()> {
        sqlx::query("INSERT INTO harbours (id, name, state, last_updated_timestamp) VALUES (?, ?, ?, ?)")
            .bind(&harbour.id)
            .bind(&harbour.name)
            .bind(&harbour.state)
            .bind(harbour.last_updated_timestamp)
            .execute(&self.pool)
            .await
            .with_context(|| format!("Failed to insert harbour {}", harbour.name))?;
        Ok(())
    }

    /// Set the harbour's last-updated time to now (epoch milliseconds).
    pub async fn touch_harbour(&self, id: &str) -> Result<i64> {
        let now = Utc::now().timestamp_millis();
        sqlx::query("UPDATE harbours SET last_updated_timestamp = ? WHERE id = ?")
            .bind(now)
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to update harbour timestamp")?;
        Ok(now)
    }

    // --- Species operations ---

    pub async fn list_species(&self) -> Result<Vec<Species>> {
        let rows = sqlx::query_as::<_, SpeciesRecord>("SELECT * FROM species ORDER BY name_en")
            .fetch_all(&self.pool)
            .await
            .context("Failed to fetch species")?;
        Ok(rows.into_iter().map(Species::from).collect())
    }

    pub async fn get_species(&self, id: &str) -> Result<Option<Species>> {
        let row = sqlx::query_as::<_, SpeciesRecord>("SELECT * FROM species WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch species")?;
        Ok(row.map(Species::from))
    }

    pub async fn find_species_by_name(&self, name_en: &str) -> Result<Option<Species>> {
        let row = sqlx::query_as::<_, SpeciesRecord>(
            "SELECT * FROM species WHERE lower(name_en) = lower(?) LIMIT 1",
        )
        .bind(name_en)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch species by name")?;
        Ok(row.map(Species::from))
    }

    pub async fn add_species(&self, species: &Species) -> Result<()> {
        sqlx::query("INSERT INTO species (id, name_en, name_local, image_url) VALUES (?, ?, ?, ?)")
            .bind(&species.id)
            .bind(&species.name_en)
            .bind(&species.name_local)
            .bind(&species.image_url)
            .execute(&self.pool)
            .await
            .with_context(|| format!("Failed to insert species {}", species.name_en))?;
        Ok(())
    }

    // --- Rate operations ---

    /// Rates filtered by harbour and/or species, newest first.
    pub async fn list_rates(&self, harbour_id: Option<&str>, species_id: Option<&str>) -> Result<Vec<Rate>> {
        let rows = sqlx::query_as::<_, RateRecord>(
            "SELECT * FROM rates
             WHERE (? IS NULL OR harbour_id = ?) AND (? IS NULL OR species_id = ?)
             ORDER BY date DESC, id",
        )
        .bind(harbour_id)
        .bind(harbour_id)
        .bind(species_id)
        .bind(species_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch rates")?;
        into_rates(rows)
    }

    /// Most recent rates for one harbour and species, newest first.
    pub async fn recent_rates(&self, harbour_id: &str, species_id: &str, limit: usize) -> Result<Vec<Rate>> {
        let rows = sqlx::query_as::<_, RateRecord>(
            "SELECT * FROM rates WHERE harbour_id = ? AND species_id = ? ORDER BY date DESC LIMIT ?",
        )
        .bind(harbour_id)
        .bind(species_id)
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch recent rates")?;
        into_rates(rows)
    }

    /// Latest rate for the harbour and species dated strictly before `date`.
    pub async fn latest_rate_before(&self, harbour_id: &str, species_id: &str, date: NaiveDate) -> Result<Option<Rate>> {
        let row = sqlx::query_as::<_, RateRecord>(
            "SELECT * FROM rates WHERE harbour_id = ? AND species_id = ? AND date < ?
             ORDER BY date DESC LIMIT 1",
        )
        .bind(harbour_id)
        .bind(species_id)
        .bind(format_date(date))
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch previous rate")?;
        row.map(Rate::try_from).transpose()
    }

    /// Insert the rate, or overwrite the existing one for the same harbour, species and date.
    ///
    /// An overwrite keeps the stored id. Returns the rate as persisted.
    pub async fn upsert_rate(&self, rate: &Rate) -> Result<Rate> {
        sqlx::query(
            "INSERT INTO rates (id, harbour_id, species_id, price_per_kg, date, source_admin_id, verification_level, lots_checked, rate_confidence_score)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT (harbour_id, species_id, date) DO UPDATE SET
                price_per_kg = excluded.price_per_kg,
                source_admin_id = excluded.source_admin_id,
                verification_level = excluded.verification_level,
                lots_checked = excluded.lots_checked,
                rate_confidence_score = excluded.rate_confidence_score",
        )
        .bind(&rate.id)
        .bind(&rate.harbour_id)
        .bind(&rate.species_id)
        .bind(rate.price_per_kg.to_string())
        .bind(format_date(rate.date))
        .bind(&rate.source_admin_id)
        .bind(rate.verification_level.as_str())
        .bind(i64::from(rate.lots_checked))
        .bind(i64::from(rate.rate_confidence_score))
        .execute(&self.pool)
        .await
        .context("Failed to upsert rate")?;

        let stored = sqlx::query_as::<_, RateRecord>(
            "SELECT * FROM rates WHERE harbour_id = ? AND species_id = ? AND date = ?",
        )
        .bind(&rate.harbour_id)
        .bind(&rate.species_id)
        .bind(format_date(rate.date))
        .fetch_one(&self.pool)
        .await
        .context("Failed to read back upserted rate")?;
        Rate::try_from(stored)
    }

    /// Returns false when no rate has that id.
    pub async fn update_rate_price(&self, id: &str, price_per_kg: Decimal) -> Result<bool> {
        let result = sqlx::query("UPDATE rates SET price_per_kg = ? WHERE id = ?")
            .bind(price_per_kg.to_string())
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to update rate price")?;
        Ok(result.rows_affected() > 0)
    }

    // --- Subscriber operations ---

    pub async fn list_subscribers(&self, harbour_id: &str) -> Result<Vec<Subscriber>> {
        let rows = sqlx::query_as::<_, SubscriberRecord>(
            "SELECT * FROM subscribers WHERE harbour_id_subscribed = ? ORDER BY opt_in_date",
        )
        .bind(harbour_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch subscribers")?;
        Ok(rows.into_iter().map(Subscriber::from).collect())
    }

    pub async fn add_subscriber(&self, subscriber: &Subscriber) -> Result<()> {
        sqlx::query("INSERT INTO subscribers (id, phone_number, harbour_id_subscribed, opt_in_date) VALUES (?, ?, ?, ?)")
            .bind(&subscriber.id)
            .bind(&subscriber.phone_number)
            .bind(&subscriber.harbour_id_subscribed)
            .bind(&subscriber.opt_in_date)
            .execute(&self.pool)
            .await
            .context("Failed to insert subscriber")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn d(s: &str) -> NaiveDate {
        parse_date(s).unwrap()
    }

    async fn seeded_store() -> Store {
        let store = Store::new(":memory:").await.expect("should create store");
        store
            .add_harbour(&Harbour {
                id: "h1".to_string(),
                name: "Kochi Fisheries Harbour".to_string(),
                state: "Kerala".to_string(),
                last_updated_timestamp: 0,
            })
            .await
            .unwrap();
        store
            .add_species(&Species {
                id: "s1".to_string(),
                name_en: "Sardine".to_string(),
                name_local: "Mathi".to_string(),
                image_url: String::new(),
            })
            .await
            .unwrap();
        store
    }

    fn rate(id: &str, date: &str, price: Decimal) -> Rate {
        Rate {
            id: id.to_string(),
            harbour_id: "h1".to_string(),
            species_id: "s1".to_string(),
            price_per_kg: price,
            date: d(date),
            source_admin_id: "admin_1".to_string(),
            verification_level: VerificationLevel::PhoneCall,
            lots_checked: 3,
            rate_confidence_score: 40,
        }
    }

    #[tokio::test]
    async fn test_store_create_and_migrate() {
        let store = seeded_store().await;
        assert_eq!(store.list_harbours().await.unwrap().len(), 1);
        assert_eq!(store.list_species().await.unwrap().len(), 1);
        assert!(store.get_harbour("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_find_by_name_is_case_insensitive() {
        let store = seeded_store().await;
        let harbour = store.find_harbour_by_name("kochi fisheries harbour").await.unwrap();
        assert_eq!(harbour.map(|h| h.id), Some("h1".to_string()));
        assert!(store.find_species_by_name("SARDINE").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_rates_round_trip_and_order() {
        let store = seeded_store().await;
        store.upsert_rate(&rate("r1", "2025-03-01", dec!(180.50))).await.unwrap();
        store.upsert_rate(&rate("r2", "2025-03-03", dec!(200))).await.unwrap();
        store.upsert_rate(&rate("r3", "2025-03-02", dec!(190))).await.unwrap();

        let rates = store.list_rates(Some("h1"), Some("s1")).await.unwrap();
        let ids: Vec<&str> = rates.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["r2", "r3", "r1"]);
        assert_eq!(rates[2].price_per_kg, dec!(180.50));
        assert_eq!(rates[0].verification_level, VerificationLevel::PhoneCall);

        assert_eq!(store.list_rates(None, None).await.unwrap().len(), 3);
        assert!(store.list_rates(Some("h2"), None).await.unwrap().is_empty());
        assert_eq!(store.recent_rates("h1", "s1", 2).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_upsert_preserves_identity() {
        let store = seeded_store().await;
        store.upsert_rate(&rate("original", "2025-03-01", dec!(100))).await.unwrap();
        let stored = store.upsert_rate(&rate("replacement", "2025-03-01", dec!(120))).await.unwrap();

        assert_eq!(stored.id, "original");
        assert_eq!(stored.price_per_kg, dec!(120));
        assert_eq!(store.list_rates(Some("h1"), Some("s1")).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_latest_rate_before_is_strict() {
        let store = seeded_store().await;
        store.upsert_rate(&rate("r1", "2025-03-01", dec!(100))).await.unwrap();
        store.upsert_rate(&rate("r2", "2025-03-05", dec!(150))).await.unwrap();

        let prev = store.latest_rate_before("h1", "s1", d("2025-03-05")).await.unwrap();
        assert_eq!(prev.map(|r| r.id), Some("r1".to_string()));
        let prev = store.latest_rate_before("h1", "s1", d("2025-03-06")).await.unwrap();
        assert_eq!(prev.map(|r| r.id), Some("r2".to_string()));
        assert!(store.latest_rate_before("h1", "s1", d("2025-03-01")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_rate_price() {
        let store = seeded_store().await;
        store.upsert_rate(&rate("r1", "2025-03-01", dec!(100))).await.unwrap();
        assert!(store.update_rate_price("r1", dec!(95)).await.unwrap());
        assert!(!store.update_rate_price("nope", dec!(95)).await.unwrap());
        let rates = store.list_rates(Some("h1"), None).await.unwrap();
        assert_eq!(rates[0].price_per_kg, dec!(95));
    }

    #[tokio::test]
    async fn test_touch_harbour_and_subscribers() {
        let store = seeded_store().await;
        let ts = store.touch_harbour("h1").await.unwrap();
        assert_eq!(store.get_harbour("h1").await.unwrap().unwrap().last_updated_timestamp, ts);

        store
            .add_subscriber(&Subscriber {
                id: "sub1".to_string(),
                phone_number: "+919800000001".to_string(),
                harbour_id_subscribed: "h1".to_string(),
                opt_in_date: "2025-03-01T06:00:00Z".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(store.list_subscribers("h1").await.unwrap().len(), 1);
        assert!(store.list_subscribers("h2").await.unwrap().is_empty());
    }
}
