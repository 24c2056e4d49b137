//! HTTP routes
//!
//! JSON endpoints for the three access operations plus health, config and
//! metrics. Failures keep the operation's response shape (`success` or
//! `granted` set to false) and add an `error` tag.

use crate::access::{
    AccessRuleEngine, ReconcilePermissionsRequest, ReconcilePermissionsResponse,
    SetAccessRuleRequest, SetAccessRuleResponse, ValidateAccessRequest, ValidateAccessResponse,
};
use crate::config::AppConfig;
use crate::error::http::status_for;
use crate::error::{AccessError, ValidationError};
use crate::metrics::{AccessMetrics, MetricsSnapshot, Operation};
use crate::util::SecretString;
use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::{HeaderMap, Method, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared state for route handlers
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<AccessRuleEngine>,
    pub metrics: Option<Arc<AccessMetrics>>,
    pub config: Arc<AppConfig>,
}

/// Configuration info for the API
#[derive(Serialize)]
struct ConfigInfo {
    server_name: String,
    server_version: String,
    identity_provider: String,
    store_backend: String,
    drive_url: String,
    metrics_enabled: bool,
}

/// An engine failure rendered in the shape of the failed operation
pub struct ApiError {
    operation: Operation,
    error: AccessError,
}

impl ApiError {
    fn new(operation: Operation, error: impl Into<AccessError>) -> Self {
        Self {
            operation,
            error: error.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.error);
        let message = self.error.public_message();
        let kind = self.error.kind();

        let body = match self.operation {
            Operation::ValidateAccess => {
                json!({ "granted": false, "message": message, "error": kind })
            }
            Operation::SetAccessRule | Operation::ReconcilePermissions => {
                json!({ "success": false, "message": message, "error": kind })
            }
        };
        (status, Json(body)).into_response()
    }
}

/// Build the application router
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    Router::new()
        .route("/health", get(health))
        .route("/api/config", get(api_config))
        .route("/api/metrics", get(api_metrics))
        .route("/api/access-rules", post(set_access_rule))
        .route("/api/access-rules/validate", post(validate_access))
        .route("/api/permissions/reconcile", post(reconcile_permissions))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Credential from `Authorization: Bearer ...`, if the header is present
fn bearer_credential(headers: &HeaderMap) -> Option<SecretString> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then(|| SecretString::new(token))
}

fn body_error(rejection: JsonRejection) -> ValidationError {
    ValidationError::new("body", rejection.body_text())
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn api_config(State(state): State<AppState>) -> Json<ConfigInfo> {
    let config = &state.config;
    Json(ConfigInfo {
        server_name: config.server.name.clone(),
        server_version: config.server.version.clone(),
        identity_provider: format!("{:?}", config.identity.provider).to_lowercase(),
        store_backend: format!("{:?}", config.store.backend).to_lowercase(),
        drive_url: config.drive.url.clone(),
        metrics_enabled: state.metrics.is_some(),
    })
}

async fn api_metrics(State(state): State<AppState>) -> Result<Json<MetricsSnapshot>, Response> {
    match &state.metrics {
        Some(metrics) if state.config.metrics.expose_resources => Ok(Json(metrics.snapshot())),
        Some(metrics) => Ok(Json(metrics.snapshot().without_resource_ids())),
        None => Err((
            StatusCode::NOT_FOUND,
            Json(json!({ "message": "Metrics are disabled" })),
        )
            .into_response()),
    }
}

async fn set_access_rule(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<SetAccessRuleRequest>, JsonRejection>,
) -> Result<Json<SetAccessRuleResponse>, ApiError> {
    let op = Operation::SetAccessRule;
    let Json(mut request) = body.map_err(|e| ApiError::new(op, body_error(e)))?;
    if let Some(credential) = bearer_credential(&headers) {
        request.credential = Some(credential);
    }

    state
        .engine
        .set_access_rule(request)
        .await
        .map(Json)
        .map_err(|e| ApiError::new(op, e))
}

async fn validate_access(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<ValidateAccessRequest>, JsonRejection>,
) -> Result<Json<ValidateAccessResponse>, ApiError> {
    let op = Operation::ValidateAccess;
    let Json(mut request) = body.map_err(|e| ApiError::new(op, body_error(e)))?;
    if let Some(credential) = bearer_credential(&headers) {
        request.credential = Some(credential);
    }

    state
        .engine
        .validate_access(request)
        .await
        .map(Json)
        .map_err(|e| ApiError::new(op, e))
}

async fn reconcile_permissions(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<ReconcilePermissionsRequest>, JsonRejection>,
) -> Result<Json<ReconcilePermissionsResponse>, ApiError> {
    let op = Operation::ReconcilePermissions;
    let Json(mut request) = body.map_err(|e| ApiError::new(op, body_error(e)))?;
    if let Some(credential) = bearer_credential(&headers) {
        request.credential = Some(credential);
    }

    state
        .engine
        .reconcile_permissions(request)
        .await
        .map(Json)
        .map_err(|e| ApiError::new(op, e))
}
