//! Admin rate submission pipeline.
//!
//! validate → previous price → anomaly gate → confidence → alert → upsert → touch harbour

use std::sync::Arc;

use anyhow::Result;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::admin::bulk::{parse_bulk_rows, BulkLine};
use crate::analytics::anomaly::AnomalyWarning;
use crate::analytics::{change, confidence, notify};
use crate::db::store::Store;
use crate::error::ValidationError;
use crate::market::models::{Harbour, Rate, RateChangeResult, Species, VerificationLevel};
use crate::monitoring::alerts::{AlertSink, PriceAlert};

pub const BULK_ADMIN_ID: &str = "admin_bulk";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateSubmission {
    pub harbour_id: String,
    pub species_id: String,
    pub price_per_kg: Decimal,
    pub date: NaiveDate,
    pub source_admin_id: String,
    pub verification_level: VerificationLevel,
    pub lots_checked: u32,
    /// Set once the admin has acknowledged an anomaly warning.
    pub confirmed: bool,
}

impl RateSubmission {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.harbour_id.trim().is_empty() {
            return Err(ValidationError::EmptyField("harbour_id"));
        }
        if self.species_id.trim().is_empty() {
            return Err(ValidationError::EmptyField("species_id"));
        }
        if self.source_admin_id.trim().is_empty() {
            return Err(ValidationError::EmptyField("source_admin_id"));
        }
        if self.price_per_kg < Decimal::ZERO {
            return Err(ValidationError::NegativePrice(self.price_per_kg));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AcceptedRate {
    pub rate: Rate,
    pub previous_price: Decimal,
    pub change: RateChangeResult,
    pub alert_sent: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum SubmissionOutcome {
    /// Held back; resubmit with `confirmed` to store it.
    NeedsConfirmation(AnomalyWarning),
    Accepted(AcceptedRate),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeferredRow {
    pub line: usize,
    pub species_id: String,
    pub warning: AnomalyWarning,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectedRow {
    pub line: usize,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BulkReport {
    pub accepted: Vec<Rate>,
    pub deferred: Vec<DeferredRow>,
    pub rejected: Vec<RejectedRow>,
    pub alerts_sent: usize,
}

pub struct RateDesk {
    store: Arc<Store>,
    sink: Arc<dyn AlertSink>,
}

impl RateDesk {
    pub fn new(store: Arc<Store>, sink: Arc<dyn AlertSink>) -> Self {
        Self { store, sink }
    }

    pub async fn submit(&self, submission: RateSubmission) -> Result<SubmissionOutcome> {
        submission.validate()?;

        let harbour = self.require_harbour(&submission.harbour_id).await?;
        let species = self.require_species(&submission.species_id).await?;

        let previous_price = self
            .store
            .latest_rate_before(&harbour.id, &species.id, submission.date)
            .await?
            .map(|r| r.price_per_kg)
            .unwrap_or(Decimal::ZERO);

        if !submission.confirmed {
            if let Some(warning) = AnomalyWarning::check(submission.price_per_kg, previous_price) {
                info!(
                    harbour = %harbour.name,
                    species = %species.name_en,
                    previous = %previous_price,
                    submitted = %submission.price_per_kg,
                    "Submission held for confirmation"
                );
                return Ok(SubmissionOutcome::NeedsConfirmation(warning));
            }
        }

        let score = confidence::score(submission.verification_level, submission.lots_checked);
        let alert_sent = self
            .maybe_alert(&harbour, &species, previous_price, submission.price_per_kg)
            .await?;

        let rate = Rate {
            id: Uuid::new_v4().to_string(),
            harbour_id: harbour.id.clone(),
            species_id: species.id.clone(),
            price_per_kg: submission.price_per_kg,
            date: submission.date,
            source_admin_id: submission.source_admin_id,
            verification_level: submission.verification_level,
            lots_checked: submission.lots_checked.min(confidence::MAX_LOTS),
            rate_confidence_score: score,
        };
        let stored = self.store.upsert_rate(&rate).await?;
        self.store.touch_harbour(&harbour.id).await?;

        info!(
            harbour = %harbour.name,
            species = %species.name_en,
            price = %stored.price_per_kg,
            date = %stored.date,
            confidence = stored.rate_confidence_score,
            "Rate recorded"
        );

        Ok(SubmissionOutcome::Accepted(AcceptedRate {
            change: change::classify(stored.price_per_kg, previous_price),
            rate: stored,
            previous_price,
            alert_sent,
        }))
    }

    /// Submit pasted `species_id,price` lines for one harbour and date.
    ///
    /// Rows go in one at a time, in order. Anomalous rows are deferred
    /// unless `confirmed`, malformed or unknown ones are rejected.
    pub async fn submit_bulk(&self, harbour_id: &str, date: NaiveDate, csv_text: &str, confirmed: bool) -> Result<BulkReport> {
        let harbour = self.require_harbour(harbour_id).await?;
        let mut report = BulkReport::default();

        for BulkLine { line, parsed } in parse_bulk_rows(csv_text) {
            let row = match parsed {
                Ok(row) => row,
                Err(e) => {
                    report.rejected.push(RejectedRow {
                        line,
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            if self.store.get_species(&row.species_id).await?.is_none() {
                report.rejected.push(RejectedRow {
                    line,
                    reason: ValidationError::UnknownId {
                        kind: "species",
                        id: row.species_id.clone(),
                    }
                    .to_string(),
                });
                continue;
            }

            let submission = RateSubmission {
                harbour_id: harbour.id.clone(),
                species_id: row.species_id.clone(),
                price_per_kg: row.price_per_kg,
                date,
                source_admin_id: BULK_ADMIN_ID.to_string(),
                verification_level: VerificationLevel::Unconfirmed,
                lots_checked: 0,
                confirmed,
            };

            match self.submit(submission).await? {
                SubmissionOutcome::Accepted(accepted) => {
                    if accepted.alert_sent {
                        report.alerts_sent += 1;
                    }
                    report.accepted.push(accepted.rate);
                }
                SubmissionOutcome::NeedsConfirmation(warning) => {
                    report.deferred.push(DeferredRow {
                        line,
                        species_id: row.species_id,
                        warning,
                    });
                }
            }
        }

        info!(
            harbour = %harbour.name,
            accepted = report.accepted.len(),
            deferred = report.deferred.len(),
            rejected = report.rejected.len(),
            alerts = report.alerts_sent,
            "Bulk submission processed"
        );
        Ok(report)
    }

    /// Tell subscribers about a significant move. Delivery failures are logged, not raised.
    async fn maybe_alert(&self, harbour: &Harbour, species: &Species, old_price: Decimal, new_price: Decimal) -> Result<bool> {
        if !notify::should_notify(old_price, new_price) {
            return Ok(false);
        }
        let subscribers = self.store.list_subscribers(&harbour.id).await?;
        if subscribers.is_empty() {
            return Ok(false);
        }

        let alert = PriceAlert {
            harbour_id: harbour.id.clone(),
            harbour_name: harbour.name.clone(),
            species_name: species.name_en.clone(),
            old_price,
            new_price,
            change_pct: notify::signed_change_pct(old_price, new_price),
            recipients: subscribers.into_iter().map(|s| s.phone_number).collect(),
        };

        match self.sink.send_price_alert(&alert).await {
            Ok(()) => Ok(true),
            Err(e) => {
                warn!(sink = self.sink.name(), error = %e, harbour = %harbour.name, "Price alert delivery failed");
                Ok(false)
            }
        }
    }

    async fn require_harbour(&self, id: &str) -> Result<Harbour> {
        match self.store.get_harbour(id).await? {
            Some(harbour) => Ok(harbour),
            None => Err(ValidationError::UnknownId {
                kind: "harbour",
                id: id.to_string(),
            }
            .into()),
        }
    }

    async fn require_species(&self, id: &str) -> Result<Species> {
        match self.store.get_species(id).await? {
            Some(species) => Ok(species),
            None => Err(ValidationError::UnknownId {
                kind: "species",
                id: id.to_string(),
            }
            .into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::dates::parse_date;
    use crate::market::models::Subscriber;
    use async_trait::async_trait;
    use rust_decimal_macros::dec;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        alerts: Mutex<Vec<PriceAlert>>,
        fail: bool,
    }

    #[async_trait]
    impl AlertSink for RecordingSink {
        async fn send_price_alert(&self, alert: &PriceAlert) -> Result<()> {
            self.alerts.lock().unwrap().push(alert.clone());
            if self.fail {
                anyhow::bail!("webhook down");
            }
            Ok(())
        }

        fn name(&self) -> &str {
            "recording"
        }
    }

    fn d(s: &str) -> NaiveDate {
        parse_date(s).unwrap()
    }

    async fn setup(with_subscriber: bool, fail: bool) -> (Arc<Store>, Arc<RecordingSink>, RateDesk) {
        let store = Arc::new(Store::new(":memory:").await.unwrap());
        store
            .add_harbour(&Harbour {
                id: "h1".to_string(),
                name: "Kochi".to_string(),
                state: "Kerala".to_string(),
                last_updated_timestamp: 0,
            })
            .await
            .unwrap();
        for (id, name) in [("s1", "Sardine"), ("s2", "Tuna")] {
            store
                .add_species(&Species {
                    id: id.to_string(),
                    name_en: name.to_string(),
                    name_local: String::new(),
                    image_url: String::new(),
                })
                .await
                .unwrap();
        }
        if with_subscriber {
            store
                .add_subscriber(&Subscriber {
                    id: "sub1".to_string(),
                    phone_number: "+919800000001".to_string(),
                    harbour_id_subscribed: "h1".to_string(),
                    opt_in_date: "2025-01-01T00:00:00Z".to_string(),
                })
                .await
                .unwrap();
        }
        let sink = Arc::new(RecordingSink {
            fail,
            ..Default::default()
        });
        let desk = RateDesk::new(store.clone(), sink.clone());
        (store, sink, desk)
    }

    fn submission(species: &str, price: Decimal, date: &str) -> RateSubmission {
        RateSubmission {
            harbour_id: "h1".to_string(),
            species_id: species.to_string(),
            price_per_kg: price,
            date: d(date),
            source_admin_id: "admin_web".to_string(),
            verification_level: VerificationLevel::Verified,
            lots_checked: 5,
            confirmed: false,
        }
    }

    fn accepted(outcome: SubmissionOutcome) -> AcceptedRate {
        match outcome {
            SubmissionOutcome::Accepted(a) => a,
            other => panic!("expected accepted, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_first_observation_is_stored_without_alert() {
        let (store, sink, desk) = setup(true, false).await;
        let result = accepted(desk.submit(submission("s1", dec!(500), "2025-03-02")).await.unwrap());

        assert_eq!(result.previous_price, Decimal::ZERO);
        assert!(!result.alert_sent);
        assert_eq!(result.change.description, "No previous data");
        assert_eq!(result.rate.rate_confidence_score, 75);
        assert!(sink.alerts.lock().unwrap().is_empty());
        assert!(store.get_harbour("h1").await.unwrap().unwrap().last_updated_timestamp > 0);
    }

    #[tokio::test]
    async fn test_anomaly_deferred_then_confirmed_with_alert() {
        let (store, sink, desk) = setup(true, false).await;
        accepted(desk.submit(submission("s1", dec!(100), "2025-03-01")).await.unwrap());

        let outcome = desk.submit(submission("s1", dec!(135), "2025-03-02")).await.unwrap();
        let SubmissionOutcome::NeedsConfirmation(warning) = outcome else {
            panic!("expected confirmation request");
        };
        assert_eq!(warning.previous_price, dec!(100));
        assert_eq!(store.list_rates(Some("h1"), Some("s1")).await.unwrap().len(), 1);

        let mut confirmed = submission("s1", dec!(135), "2025-03-02");
        confirmed.confirmed = true;
        let result = accepted(desk.submit(confirmed).await.unwrap());
        assert!(result.alert_sent);
        assert_eq!(result.change.description, "Up 35%");

        let alerts = sink.alerts.lock().unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].change_pct, dec!(35.0));
        assert_eq!(alerts[0].recipients, vec!["+919800000001".to_string()]);
    }

    #[tokio::test]
    async fn test_no_alert_without_subscribers() {
        let (_store, sink, desk) = setup(false, false).await;
        accepted(desk.submit(submission("s1", dec!(100), "2025-03-01")).await.unwrap());
        let result = accepted(desk.submit(submission("s1", dec!(120), "2025-03-02")).await.unwrap());
        assert!(!result.alert_sent);
        assert!(sink.alerts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_sink_failure_does_not_block_storage() {
        let (store, _sink, desk) = setup(true, true).await;
        accepted(desk.submit(submission("s1", dec!(100), "2025-03-01")).await.unwrap());
        let result = accepted(desk.submit(submission("s1", dec!(120), "2025-03-02")).await.unwrap());
        assert!(!result.alert_sent);
        assert_eq!(store.list_rates(Some("h1"), Some("s1")).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_resubmission_same_day_overwrites() {
        let (store, _sink, desk) = setup(false, false).await;
        let first = accepted(desk.submit(submission("s1", dec!(100), "2025-03-01")).await.unwrap());
        let second = accepted(desk.submit(submission("s1", dec!(104), "2025-03-01")).await.unwrap());

        assert_eq!(first.rate.id, second.rate.id);
        // Same-day correction compares against the day before, not itself
        assert_eq!(second.previous_price, Decimal::ZERO);
        let rates = store.list_rates(Some("h1"), Some("s1")).await.unwrap();
        assert_eq!(rates.len(), 1);
        assert_eq!(rates[0].price_per_kg, dec!(104));
    }

    #[tokio::test]
    async fn test_previous_price_spans_gaps() {
        let (_store, _sink, desk) = setup(false, false).await;
        accepted(desk.submit(submission("s1", dec!(200), "2025-03-01")).await.unwrap());
        let result = accepted(desk.submit(submission("s1", dec!(210), "2025-03-09")).await.unwrap());
        assert_eq!(result.previous_price, dec!(200));
    }

    #[tokio::test]
    async fn test_validation_errors() {
        let (_store, _sink, desk) = setup(false, false).await;

        let err = desk.submit(submission("s1", dec!(-1), "2025-03-01")).await.unwrap_err();
        assert_eq!(err.downcast_ref::<ValidationError>(), Some(&ValidationError::NegativePrice(dec!(-1))));

        let err = desk.submit(submission("nope", dec!(1), "2025-03-01")).await.unwrap_err();
        assert!(matches!(err.downcast_ref::<ValidationError>(), Some(ValidationError::UnknownId { kind: "species", .. })));

        let mut blank = submission("s1", dec!(1), "2025-03-01");
        blank.source_admin_id = " ".to_string();
        assert!(desk.submit(blank).await.is_err());
    }

    #[tokio::test]
    async fn test_bulk_report() {
        let (store, sink, desk) = setup(true, false).await;
        accepted(desk.submit(submission("s1", dec!(100), "2025-03-01")).await.unwrap());
        accepted(desk.submit(submission("s2", dec!(300), "2025-03-01")).await.unwrap());

        let csv = "species_id,price\ns1,150\ns2,340\nghost,10\ns2,abc\n";
        let report = desk.submit_bulk("h1", d("2025-03-02"), csv, false).await.unwrap();

        assert_eq!(report.accepted.len(), 1);
        assert_eq!(report.accepted[0].species_id, "s2");
        assert_eq!(report.accepted[0].source_admin_id, BULK_ADMIN_ID);
        assert_eq!(report.accepted[0].verification_level, VerificationLevel::Unconfirmed);
        assert_eq!(report.accepted[0].rate_confidence_score, 5);
        assert_eq!(report.deferred.len(), 1);
        assert_eq!(report.deferred[0].line, 2);
        assert_eq!(report.rejected.iter().map(|r| r.line).collect::<Vec<_>>(), vec![4, 5]);
        // 300 -> 340 is 13.3%
        assert_eq!(report.alerts_sent, 1);
        assert_eq!(sink.alerts.lock().unwrap().len(), 1);
        assert_eq!(store.list_rates(Some("h1"), Some("s1")).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_bulk_unknown_harbour_is_an_error() {
        let (_store, _sink, desk) = setup(false, false).await;
        assert!(desk.submit_bulk("h9", d("2025-03-02"), "s1,1", false).await.is_err());
    }
}
