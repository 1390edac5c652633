use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;

use crate::config::AppConfig;
use crate::context::PipelineContext;
use crate::dispatch::{HandlerOutcome, SignalDispatcher};
use crate::error::ValidationError;
use crate::history::HistoryEntry;
use crate::ingest::MonitorScheduler;
use crate::signal::ClassifiedSignal;
use crate::stats::{StatsAggregator, StatsSnapshot};

pub const DEFAULT_HISTORY_LIMIT: usize = 50;

#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<SignalDispatcher>,
    pub stats: Arc<StatsAggregator>,
    pub config: Arc<AppConfig>,
    /// `None` when the HTTP surface runs without a monitor attached.
    pub monitor: Option<Arc<MonitorScheduler>>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(
        ctx: &PipelineContext,
        dispatcher: Arc<SignalDispatcher>,
        monitor: Option<Arc<MonitorScheduler>>,
    ) -> Self {
        Self {
            dispatcher,
            stats: Arc::clone(&ctx.stats),
            config: Arc::clone(&ctx.config),
            monitor,
            started_at: Instant::now(),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/status", get(status))
        .route("/signal", post(post_signal))
        .route("/signals/history", get(signal_history))
        .route("/test", post(echo))
        .route("/stats", get(stats))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

/// 400 body for a rejected inbound signal.
#[derive(Debug)]
pub struct ApiError(ValidationError);

impl From<ValidationError> for ApiError {
    fn from(e: ValidationError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "error": "Invalid signal format",
                "details": self.0.details,
            })),
        )
            .into_response()
    }
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "uptime": state.started_at.elapsed().as_secs_f64(),
        "timestamp": Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn status(State(state): State<AppState>) -> Json<Value> {
    let monitor = state
        .monitor
        .as_ref()
        .map(|m| m.state().as_str())
        .unwrap_or("detached");
    let sources = state.monitor.as_ref().map(|m| {
        json!({
            "intervalMs": u64::try_from(m.interval().as_millis()).unwrap_or(u64::MAX),
            "dedupWindowSecs": m.dedup_window_secs(),
            "cursors": m.cursors(),
        })
    });
    let cfg = &state.config;
    Json(json!({
        "status": "running",
        "handlers": state.dispatcher.handler_count(),
        "monitor": monitor,
        "sources": sources,
        "historyCapacity": state.dispatcher.history().capacity(),
        "config": {
            "host": cfg.server.host,
            "port": cfg.server.port,
            "monitorInterval": cfg.monitor.interval_ms,
            "minConfidence": cfg.parser.min_confidence,
            "maxHistorySize": cfg.parser.max_history_size,
        },
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

#[derive(Serialize)]
struct SignalAccepted {
    success: bool,
    message: &'static str,
    signal: ClassifiedSignal,
    results: Vec<HandlerOutcome>,
    timestamp: String,
}

async fn post_signal(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<SignalAccepted>, ApiError> {
    // parsed by hand so a malformed body is a structured 400, not a framework rejection
    let value: Value = serde_json::from_slice(&body)
        .map_err(|e| ValidationError::single(format!("Body is not valid JSON: {e}")))?;

    let (signal, results) = state.dispatcher.dispatch_json(&value).await.map_err(|e| {
        tracing::warn!(target: "api", error = %e, "inbound signal rejected");
        e
    })?;

    tracing::info!(
        target: "api",
        signal = %signal.summary(),
        handlers = results.len(),
        "inbound signal dispatched"
    );
    Ok(Json(SignalAccepted {
        success: true,
        message: "Signal processed successfully",
        signal,
        results,
        timestamp: Utc::now().to_rfc3339(),
    }))
}

#[derive(Deserialize)]
struct HistoryQuery {
    limit: Option<String>,
}

#[derive(Serialize)]
struct HistoryResp {
    signals: Vec<HistoryEntry>,
    count: usize,
    timestamp: String,
}

async fn signal_history(
    State(state): State<AppState>,
    Query(q): Query<HistoryQuery>,
) -> Json<HistoryResp> {
    let limit = q
        .limit
        .as_deref()
        .and_then(|s| s.trim().parse::<usize>().ok())
        .filter(|n| *n > 0)
        .unwrap_or(DEFAULT_HISTORY_LIMIT);
    let signals = state.dispatcher.history().recent(limit);
    Json(HistoryResp {
        count: signals.len(),
        signals,
        timestamp: Utc::now().to_rfc3339(),
    })
}

async fn echo(body: Bytes) -> Json<Value> {
    let received = serde_json::from_slice::<Value>(&body)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&body).into_owned()));
    tracing::debug!(target: "api", "test endpoint hit");
    Json(json!({
        "message": "Test endpoint working",
        "received": received,
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

async fn stats(State(state): State<AppState>) -> Json<StatsSnapshot> {
    Json(state.stats.snapshot(state.dispatcher.history()))
}
