//! HTTP surface for the key authority
//!
//! Routes:
//! - GET  /health  — pool health summary
//! - GET  /metrics — Prometheus text exposition
//! - POST /keys    — register or reactivate a key (admin bearer token)
//! - POST /lease   — obtain the current usable secret
//! - POST /report  — report the outcome of using the leased key

use std::collections::HashMap;
use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::http::{HeaderMap, HeaderName, StatusCode, header};
use axum::routing::{get, post};
use key_authority::{Error, FailureInfo, KeyAuthority};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use common::Secret;
use metrics_exporter_prometheus::PrometheusHandle;

/// Shared application state accessible from all handlers
#[derive(Clone)]
pub struct AppState {
    pub authority: Arc<KeyAuthority>,
    pub admin_token: Option<Arc<Secret<String>>>,
    pub prometheus: PrometheusHandle,
}

/// Uniform JSON response shape returned by every handler.
type JsonResponse = (StatusCode, [(HeaderName, &'static str); 1], String);

/// Build the axum router with all routes and shared state.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(render_metrics))
        .route("/keys", post(register_key))
        .route("/lease", post(lease_key))
        .route("/report", post(report_outcome))
        .with_state(state)
}

/// GET /health — pool summary; 503 only when no key is usable.
async fn health(State(state): State<AppState>) -> JsonResponse {
    match state.authority.health().await {
        Ok(summary) => {
            let status = if summary["status"] == "unhealthy" {
                StatusCode::SERVICE_UNAVAILABLE
            } else {
                StatusCode::OK
            };
            json_response(status, summary.to_string())
        }
        Err(e) => error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "store_error",
            &e.to_string(),
        ),
    }
}

/// GET /metrics — Prometheus text exposition format.
async fn render_metrics(State(state): State<AppState>) -> JsonResponse {
    (
        StatusCode::OK,
        [(
            header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        state.prometheus.render(),
    )
}

/// Request body for key registration.
#[derive(Deserialize)]
struct RegisterRequest {
    key: String,
}

/// POST /keys — register a new secret or reactivate a known one.
///
/// The response carries the record's id and state, never the secret itself.
async fn register_key(
    State(state): State<AppState>,
    headers: HeaderMap,
    axum::Json(req): axum::Json<RegisterRequest>,
) -> JsonResponse {
    if !authorized(&state, &headers) {
        warn!("rejected key registration without valid admin token");
        return error_response(
            StatusCode::UNAUTHORIZED,
            "unauthorized",
            "missing or invalid admin token",
        );
    }

    match state.authority.register_key(&req.key).await {
        Ok(record) => {
            info!(key_id = %record.id, "key registered");
            json_response(
                StatusCode::OK,
                json!({
                    "id": record.id,
                    "is_active": record.is_active,
                    "failure_count": record.failure_count,
                })
                .to_string(),
            )
        }
        Err(e) => error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "store_error",
            &e.to_string(),
        ),
    }
}

/// POST /lease — hand out the current usable secret.
async fn lease_key(State(state): State<AppState>) -> JsonResponse {
    match state.authority.get_key().await {
        Ok(secret) => json_response(StatusCode::OK, json!({ "key": secret }).to_string()),
        Err(Error::NoAvailableKey) => {
            crate::metrics::record_lease_error();
            error_response(
                StatusCode::SERVICE_UNAVAILABLE,
                "pool_exhausted",
                "no available API keys",
            )
        }
        Err(e) => {
            crate::metrics::record_lease_error();
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "store_error",
                &e.to_string(),
            )
        }
    }
}

/// Request body for outcome reporting.
#[derive(Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
enum ReportRequest {
    Success,
    Failure {
        status: Option<u16>,
        message: Option<String>,
        #[serde(default)]
        headers: HashMap<String, String>,
    },
}

/// POST /report — feed the outcome of the last call back into the authority.
async fn report_outcome(
    State(state): State<AppState>,
    axum::Json(req): axum::Json<ReportRequest>,
) -> JsonResponse {
    match req {
        ReportRequest::Success => {
            state.authority.report_success().await;
            json_response(StatusCode::OK, json!({ "ok": true }).to_string())
        }
        ReportRequest::Failure {
            status,
            message,
            headers,
        } => {
            let rate_limited = state
                .authority
                .report_failure(FailureInfo {
                    status,
                    message,
                    headers,
                })
                .await;
            json_response(
                StatusCode::OK,
                json!({ "rate_limited": rate_limited }).to_string(),
            )
        }
    }
}

/// Bearer token check for admin endpoints.
///
/// With no admin token configured, registration is open. That is intended
/// for development setups only; production configs set KEYD_ADMIN_TOKEN.
fn authorized(state: &AppState, headers: &HeaderMap) -> bool {
    let Some(expected) = &state.admin_token else {
        return true;
    };
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .is_some_and(|token| token == expected.expose())
}

fn json_response(status: StatusCode, body: String) -> JsonResponse {
    (status, [(header::CONTENT_TYPE, "application/json")], body)
}

fn error_response(status: StatusCode, error_type: &str, message: &str) -> JsonResponse {
    json_response(
        status,
        json!({ "error": { "type": error_type, "message": message } }).to_string(),
    )
}
