//! REST API handlers.

use aegis_metrics::{DashboardState, PollError, PollUpdate};
use axum::Json;
use axum::extract::{Query, State};
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::AppState;
use crate::bundle::{BUNDLE_FILENAME, BundleError, BundleRequest, build_bundle};

/// Response wrapper for consistent API format.
#[derive(Serialize)]
struct ApiResponse<T: Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
        })
    }
}

fn error_response(msg: &str, status: StatusCode) -> impl IntoResponse {
    (
        status,
        Json(ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(msg.to_string()),
        }),
    )
}

fn poll_error_response(e: &PollError) -> axum::response::Response {
    let status = match e {
        PollError::NotStarted => StatusCode::CONFLICT,
        _ => StatusCode::BAD_REQUEST,
    };
    error_response(&e.to_string(), status).into_response()
}

// ── Poller state ───────────────────────────────────────────────

/// Poller status plus the latest published scrape.
#[derive(Debug, Serialize)]
pub struct StateView {
    pub endpoint: String,
    pub running: bool,
    pub generation: u64,
    pub latest: Option<UpdateView>,
}

/// One published scrape, flattened for JSON.
#[derive(Debug, Serialize)]
pub struct UpdateView {
    pub generation: u64,
    pub endpoint: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<DashboardState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<PollUpdate> for UpdateView {
    fn from(update: PollUpdate) -> Self {
        let (state, error) = match update.outcome {
            Ok(state) => (Some(state), None),
            Err(e) => (None, Some(e.to_string())),
        };
        Self {
            generation: update.generation,
            endpoint: update.endpoint,
            state,
            error,
        }
    }
}

/// GET /api/state
pub async fn get_state(State(state): State<AppState>) -> impl IntoResponse {
    let poller = &state.poller;
    ApiResponse::ok(StateView {
        endpoint: poller.endpoint(),
        running: poller.is_running(),
        generation: poller.generation(),
        latest: poller.latest().map(UpdateView::from),
    })
}

/// Redirect request body.
#[derive(Debug, Deserialize)]
pub struct EndpointRequest {
    pub endpoint: String,
}

/// POST /api/endpoint
pub async fn set_endpoint(
    State(state): State<AppState>,
    Json(req): Json<EndpointRequest>,
) -> impl IntoResponse {
    let endpoint = req.endpoint.trim();
    if endpoint.is_empty() {
        return error_response("endpoint is required", StatusCode::BAD_REQUEST).into_response();
    }
    match state.poller.set_endpoint(endpoint) {
        Ok(generation) => ApiResponse::ok(serde_json::json!({
            "endpoint": endpoint,
            "generation": generation,
        }))
        .into_response(),
        Err(e) => poll_error_response(&e),
    }
}

/// POST /api/refresh
pub async fn refresh(State(state): State<AppState>) -> impl IntoResponse {
    match state.poller.refresh() {
        Ok(generation) => {
            ApiResponse::ok(serde_json::json!({ "generation": generation })).into_response()
        }
        Err(e) => poll_error_response(&e),
    }
}

// ── Scrape proxy ───────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct MetricsQuery {
    pub target: String,
}

/// GET /api/metrics?target=URL
///
/// Fetches the raw exposition text from `target` on the caller's behalf.
pub async fn proxy_metrics(
    State(state): State<AppState>,
    Query(query): Query<MetricsQuery>,
) -> impl IntoResponse {
    match state.fetcher.fetch(&query.target).await {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => {
            warn!(target = %query.target, error = %e, "metrics proxy failed");
            (StatusCode::BAD_GATEWAY, e.to_string()).into_response()
        }
    }
}

// ── Bundle ─────────────────────────────────────────────────────

/// POST /api/generate-config
pub async fn generate_config(Json(req): Json<BundleRequest>) -> impl IntoResponse {
    match build_bundle(&req) {
        Ok(bytes) => {
            info!(
                backend = %req.backend_url,
                redis = req.use_redis,
                bytes = bytes.len(),
                "deployment bundle generated"
            );
            (
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, "application/zip".to_string()),
                    (
                        header::CONTENT_DISPOSITION,
                        format!("attachment; filename={BUNDLE_FILENAME}"),
                    ),
                ],
                bytes,
            )
                .into_response()
        }
        Err(BundleError::Invalid(msg)) => {
            error_response(&msg, StatusCode::BAD_REQUEST).into_response()
        }
        Err(e) => error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR).into_response(),
    }
}
