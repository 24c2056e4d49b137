//! HTTP status mapping.
//!
//! Maps tagged access errors to HTTP status codes for the server boundary.
//!
//! # Strategy
//! - Caller problems (bad credential, identity mismatch, malformed input) → 4xx
//! - Policy store problems → 503, the caller may retry
//! - Permission API problems → 502
//!
//! Normal denials from ValidateAccess are not errors and never pass through here.

use axum::http::StatusCode;

use super::{AccessError, AuthError};

/// Maps an `AccessError` to the HTTP status code returned to the caller.
pub fn status_for(error: &AccessError) -> StatusCode {
    match error {
        AccessError::Authentication(AuthError::Timeout { .. }) => StatusCode::GATEWAY_TIMEOUT,
        AccessError::Authentication(AuthError::NotConfigured) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
        AccessError::Authentication(_) => StatusCode::UNAUTHORIZED,
        AccessError::Authorization(_) => StatusCode::FORBIDDEN,
        AccessError::Validation(_) => StatusCode::BAD_REQUEST,
        AccessError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        AccessError::PermissionApi(_) => StatusCode::BAD_GATEWAY,
    }
}
