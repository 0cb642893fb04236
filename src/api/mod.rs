//! REST API for the simulated feeder
//!
//! Mirrors the device firmware's HTTP surface: status, dispense,
//! calibration and event log endpoints, plus the `/run` stepper preview.
//! Default port: 3000

use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tracing::{debug, info, warn};

use crate::config::ServerConfig;
use crate::device::{Calibration, CalibrationPatch, DeviceHandle, LogEntry, Snapshot};
use crate::error::DeviceError;
use crate::preview::{parse_speed, Direction, MotorPreview};


/// Default API port
pub const DEFAULT_API_PORT: u16 = 3000;

/// Shared state for API handlers
pub struct ApiState {
    /// Handle to the device actor
    pub device: DeviceHandle,
    /// Stateless stepper preview runner
    pub preview: MotorPreview,
}

/// API error response
#[derive(Debug)]
pub enum ApiError {
    /// Rejected by the device (validation) or device not running
    Device(DeviceError),
    /// Request body was not valid JSON for the endpoint
    InvalidBody(String),
}

impl From<DeviceError> for ApiError {
    fn from(err: DeviceError) -> Self {
        ApiError::Device(err)
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    ok: bool,
    error: &'static str,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            ApiError::Device(DeviceError::Unavailable) => {
                (StatusCode::SERVICE_UNAVAILABLE, DeviceError::Unavailable.code())
            }
            ApiError::Device(err) => (StatusCode::BAD_REQUEST, err.code()),
            ApiError::InvalidBody(_) => (StatusCode::BAD_REQUEST, "invalid_body"),
        };
        debug!(?self, %status, "Request failed");
        (status, Json(ErrorBody { ok: false, error: code })).into_response()
    }
}

/// Response for an accepted dispense
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DispenseResponse {
    pub ok: bool,
    pub enqueued: bool,
    pub eta_ms: u64,
}

/// Response for a successful calibration update
#[derive(Debug, Serialize)]
pub struct CalibrateResponse {
    pub ok: bool,
    pub calibration: Calibration,
}

/// Response listing the event log
#[derive(Debug, Serialize)]
pub struct LogsResponse {
    pub ok: bool,
    pub logs: Vec<LogEntry>,
}

#[derive(Debug, Serialize)]
struct OkResponse {
    ok: bool,
}

/// Query string of `/run`
#[derive(Debug, Default, Deserialize)]
pub struct RunQuery {
    pub dir: Option<String>,
    pub speed: Option<String>,
}

/// Build the API router
pub fn build_router(state: Arc<ApiState>, server: &ServerConfig) -> Router {
    let mut router = Router::new()
        .route("/api/status", get(get_status))
        .route("/api/dispense", post(dispense))
        .route("/api/calibrate", post(calibrate))
        .route("/api/logs", get(list_logs).delete(clear_logs))
        .route("/api/health", get(health_check))
        .route("/run", get(run_preview))
        .with_state(state);

    if let Some(dir) = &server.static_dir {
        if !dir.is_dir() {
            warn!("Static directory {} does not exist", dir.display());
        }
        router = router.fallback_service(ServeDir::new(dir));
    }

    if server.cors {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
        router = router.layer(cors);
    }

    router
}

/// GET /api/status - Telemetry snapshot
async fn get_status(State(state): State<Arc<ApiState>>) -> Result<Json<Snapshot>, ApiError> {
    Ok(Json(state.device.status().await?))
}

/// POST /api/dispense - Accept a dispense job and return its ETA
async fn dispense(
    State(state): State<Arc<ApiState>>,
    body: Bytes,
) -> Result<Json<DispenseResponse>, ApiError> {
    let body = parse_body(&body).map_err(count_overflow_to_invalid_count)?;
    let count = count_from_body(&body)
        .ok_or_else(|| DeviceError::InvalidCount(body["count"].to_string()))?;

    let ack = state.device.dispense(count).await?;

    Ok(Json(DispenseResponse {
        ok: true,
        enqueued: true,
        eta_ms: ack.eta_ms,
    }))
}

/// POST /api/calibrate - Update actuator calibration
async fn calibrate(
    State(state): State<Arc<ApiState>>,
    body: Bytes,
) -> Result<Json<CalibrateResponse>, ApiError> {
    let patch = match parse_body(&body)? {
        Value::Null => CalibrationPatch::default(),
        value => serde_json::from_value::<CalibrationPatch>(value)
            .map_err(|e| ApiError::InvalidBody(e.to_string()))?,
    };

    let calibration = state.device.calibrate(patch).await?;
    info!(mode = %calibration.mode, "Calibration updated");

    Ok(Json(CalibrateResponse {
        ok: true,
        calibration,
    }))
}

/// GET /api/logs - Event log, newest first
async fn list_logs(State(state): State<Arc<ApiState>>) -> Result<Json<LogsResponse>, ApiError> {
    Ok(Json(LogsResponse {
        ok: true,
        logs: state.device.logs().await?,
    }))
}

/// DELETE /api/logs - Purge the event log
async fn clear_logs(State(state): State<Arc<ApiState>>) -> Result<Json<OkResponse>, ApiError> {
    state.device.clear_logs().await?;
    info!("Event log cleared");
    Ok(Json(OkResponse { ok: true }))
}

/// GET /run?dir=forward|reverse&speed=1..15 - Simulated single revolution
async fn run_preview(State(state): State<Arc<ApiState>>, Query(query): Query<RunQuery>) -> String {
    let direction = Direction::from_query(query.dir.as_deref());
    let speed = query.speed.as_deref().and_then(parse_speed);
    state.preview.run(direction, speed).await
}

/// GET /api/health - Health check endpoint
async fn health_check() -> &'static str {
    "ok"
}

/// Decode a JSON body; an empty body decodes to `null`
fn parse_body(body: &[u8]) -> Result<Value, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    serde_json::from_slice(body).map_err(|e| ApiError::InvalidBody(e.to_string()))
}

/// A number too large for f64 (`1e400`) is a non-finite count, not a bad body
fn count_overflow_to_invalid_count(err: ApiError) -> ApiError {
    match err {
        ApiError::InvalidBody(msg) if msg.starts_with("number out of range") => {
            ApiError::Device(DeviceError::InvalidCount(msg))
        }
        other => other,
    }
}

/// Extract the requested dispense count
///
/// A missing or null `count` means one portion. Numeric strings count as
/// their number; anything else non-numeric yields `None`.
pub fn count_from_body(body: &Value) -> Option<f64> {
    match body.get("count") {
        None | Some(Value::Null) => Some(1.0),
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => {
            let s = s.trim();
            if s.is_empty() {
                Some(0.0)
            } else {
                s.parse::<f64>().ok()
            }
        }
        Some(_) => None,
    }
}

/// Start the API server, returning once `shutdown` resolves
pub async fn start_server(
    state: Arc<ApiState>,
    server: &ServerConfig,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let router = build_router(state, server);

    let listener = tokio::net::TcpListener::bind((server.host.as_str(), server.port))
        .await
        .with_context(|| format!("Failed to bind API server to {}:{}", server.host, server.port))?;

    let addr = listener.local_addr().context("Failed to read bound address")?;
    info!("Good Boy simulator running at http://{}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
        .context("API server error")?;

    Ok(())
}
