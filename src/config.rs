use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub service: ServiceConfig,
    pub database: DatabaseConfig,
    pub analytics: AnalyticsConfig,
    pub ai: AiConfig,
    pub alerts: AlertsConfig,
    pub dashboard: DashboardConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    pub log_level: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnalyticsConfig {
    /// Days of history handed to the forecaster and kept in summaries.
    pub history_window: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AiConfig {
    pub model: String,
    pub max_tokens: u32,
    pub timeout_seconds: u64,
    pub requests_per_minute: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AlertsConfig {
    pub enabled: bool,
    pub sender_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DashboardConfig {
    pub bind: String,
    pub port: u16,
}

impl DashboardConfig {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

/// Secrets loaded exclusively from environment variables.
/// Not serializable, not stored in config files.
pub struct Secrets {
    pub anthropic_api_key: Option<String>,
    pub alert_webhook_url: Option<String>,
}

impl Secrets {
    pub fn from_env() -> Self {
        Self {
            anthropic_api_key: non_empty_var("ANTHROPIC_API_KEY"),
            alert_webhook_url: non_empty_var("ALERT_WEBHOOK_URL"),
        }
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

impl AppConfig {
    /// Load configuration from a TOML file, overlaying environment variables for secrets.
    pub fn load_from(config_path: &Path) -> Result<(Self, Secrets)> {
        dotenvy::dotenv().ok();

        let contents = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let config: AppConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse {}", config_path.display()))?;

        let secrets = Secrets::from_env();

        Ok((config, secrets))
    }
}
