use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use harbour_rates::admin::{RateDesk, RateSubmission, SubmissionOutcome};
use harbour_rates::ai::claude::ClaudeClient;
use harbour_rates::ai::{ForecastProvider, NarrativeProvider};
use harbour_rates::analytics::dates;
use harbour_rates::config::{AppConfig, Secrets};
use harbour_rates::db::store::Store;
use harbour_rates::forecast::{narrator, ForecastEngine};
use harbour_rates::market::insight::MarketAnalyst;
use harbour_rates::market::models::{Subscriber, VerificationLevel};
use harbour_rates::market::{catalogue, compare, summary};
use harbour_rates::monitoring::alerts::{AlertSink, LogAlertSink, WebhookAlertSink};
use harbour_rates::monitoring::dashboard::{self, DashboardState};
use harbour_rates::monitoring::logger;

#[derive(Parser)]
#[command(name = "harbour-rates")]
#[command(about = "Daily fish rates, confidence and forecasts for coastal harbours")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/default.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the read-only HTTP API
    Serve,
    /// Record one rate
    Submit {
        #[arg(long)]
        harbour: String,
        #[arg(long)]
        species: String,
        #[arg(long)]
        price: Decimal,
        /// Defaults to today
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(long, default_value = "Verified")]
        level: VerificationLevel,
        #[arg(long, default_value_t = 0)]
        lots: u32,
        #[arg(long, default_value = "admin_cli")]
        admin: String,
        /// Store even if the price moved abnormally
        #[arg(long)]
        confirm: bool,
    },
    /// Record `species_id,price` lines from a file
    Bulk {
        #[arg(long)]
        harbour: String,
        #[arg(long)]
        file: PathBuf,
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(long)]
        confirm: bool,
    },
    /// Print today's summaries and market insight for a harbour
    Summary {
        #[arg(long)]
        harbour: String,
    },
    /// Print a 7-day forecast for one species at a harbour
    Forecast {
        #[arg(long)]
        harbour: String,
        #[arg(long)]
        species: String,
    },
    /// Compare latest prices at two harbours
    Compare {
        #[arg(long)]
        first: String,
        #[arg(long)]
        second: String,
    },
    /// Subscribe a phone number to a harbour's price alerts
    Subscribe {
        #[arg(long)]
        harbour: String,
        #[arg(long)]
        phone: String,
    },
    AddHarbour {
        #[arg(long)]
        name: String,
        #[arg(long)]
        state: String,
    },
    AddSpecies {
        #[arg(long)]
        name_en: String,
        #[arg(long, default_value = "")]
        name_local: String,
    },
    /// Insert the default harbours and species
    Seed,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let (config, secrets) = AppConfig::load_from(&cli.config)?;

    logger::init_logging(&config.service)?;

    if let Some(parent) = std::path::Path::new(&config.database.path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }
    let store = Arc::new(Store::new(&config.database.path).await?);

    tracing::info!(database = %config.database.path, "Harbour rates starting");

    match cli.command {
        Command::Serve => serve(&config, &secrets, store).await,
        Command::Submit {
            harbour,
            species,
            price,
            date,
            level,
            lots,
            admin,
            confirm,
        } => {
            let desk = rate_desk(&config, &secrets, store);
            let outcome = desk
                .submit(RateSubmission {
                    harbour_id: harbour,
                    species_id: species,
                    price_per_kg: price,
                    date: date.unwrap_or_else(dates::today),
                    source_admin_id: admin,
                    verification_level: level,
                    lots_checked: lots,
                    confirmed: confirm,
                })
                .await?;
            if let SubmissionOutcome::NeedsConfirmation(warning) = &outcome {
                eprintln!("{}", warning.message());
            }
            print_json(&outcome)
        }
        Command::Bulk {
            harbour,
            file,
            date,
            confirm,
        } => {
            let csv = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let desk = rate_desk(&config, &secrets, store);
            let report = desk
                .submit_bulk(&harbour, date.unwrap_or_else(dates::today), &csv, confirm)
                .await?;
            print_json(&report)
        }
        Command::Summary { harbour } => {
            let Some(harbour) = store.get_harbour(&harbour).await? else {
                bail!("Unknown harbour: {harbour}");
            };
            let summaries =
                summary::build_daily_summaries(&store, &harbour.id, config.analytics.history_window).await?;
            let (_, analyst) = ai_services(&config, &secrets);
            let insight = analyst.insight(&harbour.name, &summaries).await;
            print_json(&serde_json::json!({
                "harbour": harbour,
                "summaries": summaries,
                "insight": insight,
            }))
        }
        Command::Forecast { harbour, species } => {
            let Some(species) = store.get_species(&species).await? else {
                bail!("Unknown species: {species}");
            };
            let history = store
                .recent_rates(&harbour, &species.id, config.analytics.history_window)
                .await?;
            let current_price = history.first().map(|r| r.price_per_kg).unwrap_or(Decimal::ZERO);
            let (engine, _) = ai_services(&config, &secrets);
            let forecast = engine.forecast(&species.name_en, &history, current_price).await;
            let narrative = narrator::narrate(&species.name_en, current_price, &forecast.points);
            print_json(&serde_json::json!({
                "species": species,
                "current_price": current_price,
                "forecast": forecast,
                "narrative": narrative,
            }))
        }
        Command::Compare { first, second } => {
            let rows = compare::compare_harbours(&store, &first, &second).await?;
            for row in &rows {
                let show = |p: Option<Decimal>| p.map(compare::format_inr).unwrap_or_else(|| "-".to_string());
                println!(
                    "{:<20} {:>12} {:>12}",
                    row.species.name_en,
                    show(row.first_price),
                    show(row.second_price)
                );
            }
            Ok(())
        }
        Command::Subscribe { harbour, phone } => {
            if store.get_harbour(&harbour).await?.is_none() {
                bail!("Unknown harbour: {harbour}");
            }
            let subscriber = Subscriber {
                id: Uuid::new_v4().to_string(),
                phone_number: phone.trim().to_string(),
                harbour_id_subscribed: harbour,
                opt_in_date: chrono::Utc::now().to_rfc3339(),
            };
            store.add_subscriber(&subscriber).await?;
            print_json(&subscriber)
        }
        Command::AddHarbour { name, state } => {
            let harbour = catalogue::new_harbour(&name, &state);
            store.add_harbour(&harbour).await?;
            print_json(&harbour)
        }
        Command::AddSpecies { name_en, name_local } => {
            let species = catalogue::new_species(&name_en, &name_local);
            store.add_species(&species).await?;
            print_json(&species)
        }
        Command::Seed => {
            let report = catalogue::seed(&store).await?;
            print_json(&report)
        }
    }
}

/// Serve the HTTP API until Ctrl-C.
async fn serve(config: &AppConfig, secrets: &Secrets, store: Arc<Store>) -> Result<()> {
    let (engine, analyst) = ai_services(config, secrets);
    let state = DashboardState::new(store, engine, analyst, config.analytics.history_window);
    let handle = dashboard::spawn_dashboard(state, config.dashboard.addr());

    tokio::signal::ctrl_c().await.context("Failed to listen for shutdown signal")?;
    tracing::info!("Shutting down");
    handle.abort();

    Ok(())
}

/// Forecast engine and market analyst, backed by Claude when a key is configured.
fn ai_services(config: &AppConfig, secrets: &Secrets) -> (ForecastEngine, MarketAnalyst) {
    let timeout = Duration::from_secs(config.ai.timeout_seconds);

    let client = secrets.anthropic_api_key.as_ref().and_then(|key| {
        match ClaudeClient::new(key.clone(), &config.ai) {
            Ok(c) => Some(Arc::new(c)),
            Err(e) => {
                tracing::warn!(error = %e, "Claude client unavailable, using deterministic fallbacks");
                None
            }
        }
    });

    let Some(client) = client else {
        tracing::info!("No ANTHROPIC_API_KEY set, using deterministic fallbacks");
        return (ForecastEngine::offline(), MarketAnalyst::offline());
    };

    let forecaster: Arc<dyn ForecastProvider> = client.clone();
    let narrator: Arc<dyn NarrativeProvider> = client;
    (
        ForecastEngine::new(Some(forecaster), timeout),
        MarketAnalyst::new(Some(narrator), timeout),
    )
}

fn rate_desk(config: &AppConfig, secrets: &Secrets, store: Arc<Store>) -> RateDesk {
    let sink: Arc<dyn AlertSink> = match &secrets.alert_webhook_url {
        Some(url) if config.alerts.enabled => Arc::new(WebhookAlertSink::new(
            Some(url.clone()),
            true,
            config.alerts.sender_name.clone(),
        )),
        _ => Arc::new(LogAlertSink),
    };
    RateDesk::new(store, sink)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{text}");
    Ok(())
}
