//! Read-only HTTP API for the fisherman app: harbours, summaries, insight, forecasts.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use axum::Router;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use crate::db::store::Store;
use crate::forecast::narrator;
use crate::forecast::ForecastEngine;
use crate::market::compare::compare_harbours;
use crate::market::insight::MarketAnalyst;
use crate::market::summary::build_daily_summaries;

/// Shared state accessible by all dashboard route handlers.
#[derive(Clone)]
pub struct DashboardState {
    store: Arc<Store>,
    forecasts: Arc<ForecastEngine>,
    analyst: Arc<MarketAnalyst>,
    history_window: usize,
    started_at: DateTime<Utc>,
}

impl DashboardState {
    pub fn new(store: Arc<Store>, forecasts: ForecastEngine, analyst: MarketAnalyst, history_window: usize) -> Self {
        Self {
            store,
            forecasts: Arc::new(forecasts),
            analyst: Arc::new(analyst),
            history_window,
            started_at: Utc::now(),
        }
    }
}

pub fn router(state: DashboardState) -> Router {
    Router::new()
        .route("/api/health", get(health_handler))
        .route("/api/harbours", get(harbours_handler))
        .route("/api/species", get(species_handler))
        .route("/api/harbours/{harbour_id}/summaries", get(summaries_handler))
        .route("/api/harbours/{harbour_id}/insight", get(insight_handler))
        .route(
            "/api/harbours/{harbour_id}/species/{species_id}/forecast",
            get(forecast_handler),
        )
        .route("/api/compare", get(compare_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Spawn the dashboard HTTP server. Returns a handle that can be aborted.
pub fn spawn_dashboard(state: DashboardState, addr: String) -> JoinHandle<()> {
    tokio::spawn(async move {
        let app = router(state);

        let listener = match tokio::net::TcpListener::bind(&addr).await {
            Ok(l) => {
                info!(addr = %addr, "Dashboard server listening");
                l
            }
            Err(e) => {
                warn!(error = %e, addr = %addr, "Failed to bind dashboard server");
                return;
            }
        };

        if let Err(e) = axum::serve(listener, app).await {
            warn!(error = %e, "Dashboard server error");
        }
    })
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(serde_json::json!({"error": message.into()}))).into_response()
}

fn internal_error(e: anyhow::Error) -> Response {
    warn!(error = %e, "Dashboard request failed");
    error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}

// -- Route Handlers --

async fn health_handler(State(state): State<DashboardState>) -> impl IntoResponse {
    let database = match sqlx::query("SELECT 1").execute(state.store.pool()).await {
        Ok(_) => "ok",
        Err(_) => "unavailable",
    };
    Json(serde_json::json!({
        "status": if database == "ok" { "ok" } else { "degraded" },
        "database": database,
        "started_at": state.started_at,
        "uptime_seconds": (Utc::now() - state.started_at).num_seconds(),
    }))
}

async fn harbours_handler(State(state): State<DashboardState>) -> Response {
    match state.store.list_harbours().await {
        Ok(harbours) => Json(harbours).into_response(),
        Err(e) => internal_error(e),
    }
}

async fn species_handler(State(state): State<DashboardState>) -> Response {
    match state.store.list_species().await {
        Ok(species) => Json(species).into_response(),
        Err(e) => internal_error(e),
    }
}

async fn summaries_handler(State(state): State<DashboardState>, Path(harbour_id): Path<String>) -> Response {
    match state.store.get_harbour(&harbour_id).await {
        Ok(Some(_)) => {}
        Ok(None) => return error_response(StatusCode::NOT_FOUND, "unknown harbour"),
        Err(e) => return internal_error(e),
    }
    match build_daily_summaries(&state.store, &harbour_id, state.history_window).await {
        Ok(summaries) => Json(summaries).into_response(),
        Err(e) => internal_error(e),
    }
}

async fn insight_handler(State(state): State<DashboardState>, Path(harbour_id): Path<String>) -> Response {
    let harbour = match state.store.get_harbour(&harbour_id).await {
        Ok(Some(h)) => h,
        Ok(None) => return error_response(StatusCode::NOT_FOUND, "unknown harbour"),
        Err(e) => return internal_error(e),
    };
    let summaries = match build_daily_summaries(&state.store, &harbour.id, state.history_window).await {
        Ok(s) => s,
        Err(e) => return internal_error(e),
    };

    let insight = state.analyst.insight(&harbour.name, &summaries).await;
    Json(insight).into_response()
}

async fn forecast_handler(
    State(state): State<DashboardState>,
    Path((harbour_id, species_id)): Path<(String, String)>,
) -> Response {
    match state.store.get_harbour(&harbour_id).await {
        Ok(Some(_)) => {}
        Ok(None) => return error_response(StatusCode::NOT_FOUND, "unknown harbour"),
        Err(e) => return internal_error(e),
    }
    let species = match state.store.get_species(&species_id).await {
        Ok(Some(s)) => s,
        Ok(None) => return error_response(StatusCode::NOT_FOUND, "unknown species"),
        Err(e) => return internal_error(e),
    };
    let history = match state
        .store
        .recent_rates(&harbour_id, &species.id, state.history_window)
        .await
    {
        Ok(h) => h,
        Err(e) => return internal_error(e),
    };

    let current_price = history.first().map(|r| r.price_per_kg).unwrap_or(Decimal::ZERO);
    let forecast = state.forecasts.forecast(&species.name_en, &history, current_price).await;
    let narrative = narrator::narrate(&species.name_en, current_price, &forecast.points);

    Json(serde_json::json!({
        "species": species,
        "current_price": current_price,
        "source": forecast.source,
        "predictions": forecast.points,
        "narrative": narrative,
    }))
    .into_response()
}

#[derive(Debug, Deserialize)]
struct CompareQuery {
    first: String,
    second: String,
}

async fn compare_handler(State(state): State<DashboardState>, Query(query): Query<CompareQuery>) -> Response {
    match compare_harbours(&state.store, &query.first, &query.second).await {
        Ok(rows) => Json(rows).into_response(),
        Err(e) => internal_error(e),
    }
}
