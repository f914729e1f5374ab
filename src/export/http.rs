use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use parking_lot::RwLock;
use prometheus::{Encoder, TextEncoder};
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use super::metrics::EngineMetrics;
use crate::catalog::sqlstate;
use crate::error::EngineError;
use crate::event::{level, LogRecord};
use crate::hook::{LogHook, LogSink};
use crate::report::{IdentityResolver, Report};
use crate::state::Engine;

/// HTTP server exposing event ingestion, reports, admin resets and
/// self-metrics.
pub struct ExportServer {
    addr: String,
    state: Arc<AppState>,
    shutdown: parking_lot::Mutex<Option<CancellationToken>>,
    local_addr: parking_lot::Mutex<Option<SocketAddr>>,
}

impl ExportServer {
    pub fn new(
        addr: &str,
        engine: Arc<Engine>,
        resolver: Arc<dyn IdentityResolver>,
    ) -> Result<Self> {
        let metrics = EngineMetrics::new().context("creating engine metrics")?;
        Ok(Self {
            addr: addr.to_string(),
            state: Arc::new(AppState {
                hook: LogHook::new(Arc::clone(&engine)),
                engine,
                resolver: RwLock::new(resolver),
                metrics,
            }),
            shutdown: parking_lot::Mutex::new(None),
            local_addr: parking_lot::Mutex::new(None),
        })
    }

    /// Replaces the identity resolver used by subsequent reports.
    pub fn set_resolver(&self, resolver: Arc<dyn IdentityResolver>) {
        *self.state.resolver.write() = resolver;
    }

    /// Router with every route bound to this server's state.
    pub fn router(&self) -> Router {
        router(Arc::clone(&self.state))
    }

    /// Address the server is listening on, once started.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self.local_addr.lock()
    }

    /// Binds the listener and serves in a background task.
    pub async fn start(&self) -> Result<()> {
        let bind_addr = bind_address(&self.addr);

        let listener = TcpListener::bind(&bind_addr)
            .await
            .with_context(|| format!("listening on {bind_addr}"))?;

        let local_addr = listener.local_addr().context("getting local address")?;
        *self.local_addr.lock() = Some(local_addr);

        let cancel = CancellationToken::new();
        *self.shutdown.lock() = Some(cancel.clone());

        let app = self.router();

        tokio::spawn(async move {
            tracing::info!(addr = %local_addr, "export server started");

            let result = axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .with_graceful_shutdown(async move {
                cancel.cancelled().await;
            })
            .await;

            if let Err(e) = result {
                tracing::error!(error = %e, "export server error");
            }
        });

        Ok(())
    }

    /// Gracefully shuts down the server.
    pub async fn stop(&self) -> Result<()> {
        if let Some(cancel) = self.shutdown.lock().take() {
            cancel.cancel();
        }

        Ok(())
    }
}

/// Expands the ":port" shorthand to all interfaces.
fn bind_address(addr: &str) -> String {
    let addr = if addr.is_empty() { ":9187" } else { addr };
    if addr.starts_with(':') {
        format!("0.0.0.0{addr}")
    } else {
        addr.to_string()
    }
}

/// Shared state for axum handlers.
struct AppState {
    engine: Arc<Engine>,
    hook: LogHook,
    resolver: RwLock<Arc<dyn IdentityResolver>>,
    metrics: EngineMetrics,
}

fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/events", post(events_handler))
        .route("/errors", get(errors_handler))
        .route("/slow", get(slow_handler))
        .route("/slow/reset", post(slow_reset_handler))
        .route("/reset", post(reset_handler))
        .route("/metrics", get(metrics_handler))
        .route("/healthz", get(healthz_handler))
        .with_state(state)
}

/// Maps handler failures to HTTP status codes.
enum ApiError {
    Engine(EngineError),
    InvalidEvent(String),
}

impl From<EngineError> for ApiError {
    fn from(e: EngineError) -> Self {
        Self::Engine(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::Engine(e @ EngineError::NotReady) => {
                (StatusCode::SERVICE_UNAVAILABLE, e.to_string())
            }
            Self::Engine(e) => (StatusCode::BAD_REQUEST, e.to_string()),
            Self::InvalidEvent(message) => (StatusCode::BAD_REQUEST, message),
        };
        let body = Json(serde_json::json!({ "error": message }));
        (status, body).into_response()
    }
}

/// One log record submitted over HTTP.
#[derive(Debug, Deserialize)]
struct IngestEvent {
    /// Level name, e.g. "ERROR" or "LOG".
    level: String,
    /// Five-character SQLSTATE.
    sqlstate: String,
    #[serde(default)]
    db_id: u32,
    #[serde(default)]
    user_id: u32,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum IngestBody {
    One(IngestEvent),
    Batch(Vec<IngestEvent>),
}

impl IngestBody {
    fn into_events(self) -> Vec<IngestEvent> {
        match self {
            Self::One(event) => vec![event],
            Self::Batch(events) => events,
        }
    }
}

/// Parsed fields of an [`IngestEvent`] ready for the log hook.
fn parse_event(event: &IngestEvent) -> Result<(u8, i32), ApiError> {
    let raw_level = level::from_name(&event.level)
        .ok_or_else(|| ApiError::InvalidEvent(format!("unknown log level {:?}", event.level)))?;
    let code = sqlstate::parse(&event.sqlstate)
        .map_err(|e| ApiError::InvalidEvent(e.to_string()))?;
    Ok((raw_level, code))
}

/// POST /events - feed one record or a batch through the log hook.
///
/// The whole batch is rejected if any record is malformed.
async fn events_handler(
    State(state): State<Arc<AppState>>,
    Json(body): Json<IngestBody>,
) -> Result<StatusCode, ApiError> {
    if !state.engine.is_active() {
        return Err(EngineError::NotReady.into());
    }

    let events = body.into_events();
    let parsed = events
        .iter()
        .map(parse_event)
        .collect::<Result<Vec<_>, _>>()?;

    for (event, (raw_level, code)) in events.iter().zip(parsed) {
        state.hook.handle_record(&LogRecord {
            level: raw_level,
            sqlstate: code,
            db_id: event.db_id,
            user_id: event.user_id,
            message: &event.message,
        });
    }

    Ok(StatusCode::ACCEPTED)
}

#[derive(Debug, Deserialize)]
struct ErrorsQuery {
    /// Restrict the report to one window of this many intervals.
    window: Option<usize>,
}

/// GET /errors - totals plus short and long window rows as JSON.
async fn errors_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ErrorsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let resolver = state.resolver.read().clone();
    let rows = match query.window {
        Some(window) => Report::build_window(&state.engine, window, resolver.as_ref())?,
        None => Report::build(&state.engine, resolver.as_ref())?,
    };
    Ok(Json(rows))
}

/// GET /slow - slow-statement count and last reset time.
async fn slow_handler(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.engine.slow()?))
}

/// POST /slow/reset - zero the slow-statement counter.
async fn slow_reset_handler(
    State(state): State<Arc<AppState>>,
) -> Result<StatusCode, ApiError> {
    state.engine.reset_slow()?;
    tracing::info!("slow event counter reset");
    Ok(StatusCode::NO_CONTENT)
}

/// POST /reset - clear all stored events and counters.
async fn reset_handler(State(state): State<Arc<AppState>>) -> Result<StatusCode, ApiError> {
    state.engine.reset()?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /metrics - Prometheus text format.
async fn metrics_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state.metrics.observe(state.engine.stats().ok().as_ref());

    let encoder = TextEncoder::new();
    let metric_families = state.metrics.registry().gather();

    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "encoding metrics");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            "encoding error".to_string(),
        );
    }

    match String::from_utf8(buffer) {
        Ok(text) => (StatusCode::OK, text),
        Err(e) => {
            tracing::error!(error = %e, "converting metrics to string");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "encoding error".to_string(),
            )
        }
    }
}

/// GET /healthz - Simple health check.
async fn healthz_handler() -> &'static str {
    "ok"
}
