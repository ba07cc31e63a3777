//! Price-change alerts for harbour subscribers.
//!
//! The webhook sink posts to a chat webhook such as a WhatsApp bridge
//! and the log sink only records the alert.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::info;

/// A significant price move at one harbour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PriceAlert {
    pub harbour_id: String,
    pub harbour_name: String,
    pub species_name: String,
    pub old_price: Decimal,
    pub new_price: Decimal,
    /// Signed percent change, one decimal.
    pub change_pct: Decimal,
    /// Subscriber phone numbers.
    pub recipients: Vec<String>,
}

impl PriceAlert {
    pub fn message(&self) -> String {
        format!(
            "Alert: {} changed by {}% at {} (₹{} → ₹{}). Sent to {} subscribers.",
            self.species_name,
            self.change_pct,
            self.harbour_name,
            self.old_price.normalize(),
            self.new_price.normalize(),
            self.recipients.len()
        )
    }
}

#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn send_price_alert(&self, alert: &PriceAlert) -> Result<()>;

    fn name(&self) -> &str;
}

/// Webhook message format.
#[derive(Debug, Serialize)]
struct WebhookMessage {
    content: String,
    username: String,
}

/// Posts alerts to a chat webhook. A sink without a URL is a no-op.
pub struct WebhookAlertSink {
    webhook_url: Option<String>,
    sender_name: String,
    http: reqwest::Client,
    enabled: bool,
}

impl WebhookAlertSink {
    pub fn new(webhook_url: Option<String>, enabled: bool, sender_name: impl Into<String>) -> Self {
        Self {
            enabled: enabled && webhook_url.is_some(),
            webhook_url,
            sender_name: sender_name.into(),
            http: reqwest::Client::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}

#[async_trait]
impl AlertSink for WebhookAlertSink {
    async fn send_price_alert(&self, alert: &PriceAlert) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        let Some(ref url) = self.webhook_url else {
            return Ok(());
        };

        let payload = WebhookMessage {
            content: alert.message(),
            username: self.sender_name.clone(),
        };

        let response = self
            .http
            .post(url)
            .json(&payload)
            .send()
            .await
            .context("Failed to send alert webhook")?;

        if !response.status().is_success() {
            bail!("Alert webhook returned {}", response.status());
        }

        info!(harbour = %alert.harbour_name, species = %alert.species_name, "Price alert delivered");
        Ok(())
    }

    fn name(&self) -> &str {
        "webhook"
    }
}

/// Writes alerts to the log only.
pub struct LogAlertSink;

#[async_trait]
impl AlertSink for LogAlertSink {
    async fn send_price_alert(&self, alert: &PriceAlert) -> Result<()> {
        info!(
            harbour = %alert.harbour_name,
            species = %alert.species_name,
            change_pct = %alert.change_pct,
            subscribers = alert.recipients.len(),
            "{}",
            alert.message()
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "log"
    }
}
