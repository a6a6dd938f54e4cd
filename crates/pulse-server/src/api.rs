use crate::{bootstrap, AppState};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Json, Router,
};
use pulse_monitor::{IncidentError, MonitorError, Readiness, RegistryError, TickOutcome};
use pulse_types::Target;
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::warn;

/// API 错误
#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    Conflict(String),
    BadRequest(String),
    Unavailable(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m),
            ApiError::Conflict(m) => (StatusCode::CONFLICT, m),
            ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m),
            ApiError::Unavailable(m) => (StatusCode::SERVICE_UNAVAILABLE, m),
            ApiError::Internal(m) => (StatusCode::INTERNAL_SERVER_ERROR, m),
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

impl From<RegistryError> for ApiError {
    fn from(e: RegistryError) -> Self {
        match e {
            RegistryError::NotFound(_) => ApiError::NotFound(e.to_string()),
            RegistryError::AlreadyExists(_) => ApiError::Conflict(e.to_string()),
            RegistryError::ConfigurationInvalid(_) => ApiError::BadRequest(e.to_string()),
        }
    }
}

impl From<IncidentError> for ApiError {
    fn from(e: IncidentError) -> Self {
        match e {
            IncidentError::NotFound(_) => ApiError::NotFound(e.to_string()),
            IncidentError::StillOpen(_) => ApiError::Conflict(e.to_string()),
        }
    }
}

impl From<MonitorError> for ApiError {
    fn from(e: MonitorError) -> Self {
        match e {
            MonitorError::Registry(e) => e.into(),
            MonitorError::Incident(e) => e.into(),
            MonitorError::Config(e) => ApiError::BadRequest(e.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

type ApiResult<T> = std::result::Result<T, ApiError>;

#[derive(Debug, Deserialize)]
pub struct ThresholdRequest {
    pub threshold_ms: u64,
}

#[derive(Debug, Deserialize)]
pub struct SetupRequest {
    pub output: PathBuf,
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/api/v1/status", get(get_status))
        .route("/api/v1/readiness", get(get_readiness))
        .route("/api/v1/incidents", get(list_incidents))
        .route("/api/v1/incidents/:id/clear", post(clear_incident))
        .route("/api/v1/targets", get(list_targets).post(add_target))
        .route("/api/v1/targets/:name", delete(remove_target))
        .route("/api/v1/targets/:name/threshold", put(set_threshold))
        .route("/api/v1/setup", post(setup))
        .route("/api/v1/reload", post(reload))
        .with_state(state)
}

async fn get_status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let snapshot = state.engine.status();
    Json((*snapshot).clone())
}

async fn get_readiness(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.engine.readiness().await;
    let status = match readiness {
        Readiness::Ready => StatusCode::OK,
        Readiness::Unconfigured => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status, Json(serde_json::json!({ "status": readiness })))
}

async fn list_incidents(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let limit = state.engine.settings().current().recent_incident_limit;
    let open = state.engine.open_incidents().await;
    let recent = state.engine.recent_incidents(limit).await;
    Json(serde_json::json!({ "open": open, "recent": recent }))
}

async fn clear_incident(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let incident = state.engine.clear_incident(&id).await?;
    Ok(Json(incident))
}

async fn list_targets(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.engine.registry().snapshot().await)
}

async fn add_target(
    State(state): State<Arc<AppState>>,
    Json(target): Json<Target>,
) -> ApiResult<impl IntoResponse> {
    let target = state.engine.add_target(target).await?;
    Ok((StatusCode::CREATED, Json(target)))
}

async fn remove_target(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let removed = state.engine.remove_target(&name).await?;
    Ok(Json(removed))
}

async fn set_threshold(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Json(req): Json<ThresholdRequest>,
) -> ApiResult<impl IntoResponse> {
    let target = state
        .engine
        .set_latency_threshold(&name, req.threshold_ms)
        .await?;
    Ok(Json(target))
}

async fn setup(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SetupRequest>,
) -> ApiResult<impl IntoResponse> {
    if req.output.as_os_str().is_empty() {
        return Err(ApiError::BadRequest("output path must not be empty".into()));
    }

    let outcome = state.engine.set_dashboard_output(req.output.clone()).await;
    let rendered = matches!(outcome, TickOutcome::Rendered { .. });
    if !rendered {
        warn!(path = %req.output.display(), "Initial dashboard render failed");
    }
    Ok(Json(serde_json::json!({
        "status": "configured",
        "output": req.output,
        "sequence": outcome.sequence(),
        "rendered": rendered,
    })))
}

async fn reload(State(state): State<Arc<AppState>>) -> ApiResult<impl IntoResponse> {
    let loader = state
        .loader
        .as_ref()
        .ok_or_else(|| ApiError::Unavailable("configuration reload is not available".into()))?;

    bootstrap::apply_reload(&state.engine, loader)
        .await
        .map_err(|e| ApiError::BadRequest(format!("Reload failed: {:#}", e)))?;
    Ok(Json(serde_json::json!({ "status": "reloaded" })))
}
