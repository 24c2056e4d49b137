//! Error types for accessguard
//!
//! This module defines the error hierarchy used throughout the application.
//! We use `thiserror` for library-style errors that are part of the API,
//! and convert to HTTP responses at the boundary (see [`http`]).

pub mod http;

use thiserror::Error;

/// Top-level application error
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    #[error("Policy store error: {0}")]
    Store(#[from] StoreError),

    #[error("Drive API error: {0}")]
    Drive(#[from] DriveError),

    #[error("Access rule error: {0}")]
    Access(#[from] AccessError),
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(String),

    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Missing required configuration: {field}")]
    Missing { field: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Credential verification errors (the caller could not be identified)
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("No authentication configured")]
    NotConfigured,

    #[error("Missing credential")]
    MissingCredential,

    #[error("Invalid token format")]
    InvalidToken,

    #[error("Token expired")]
    TokenExpired,

    #[error("Token rejected: {0}")]
    Rejected(String),

    #[error("Identity verification timed out after {timeout_secs} seconds")]
    Timeout { timeout_secs: u64 },

    #[error("Authentication failed: {0}")]
    Failed(String),
}

/// The verified caller is not who the request claims it is
#[derive(Error, Debug)]
#[error("{field} does not match the verified principal")]
pub struct AuthorizationError {
    pub field: String,
}

impl AuthorizationError {
    pub fn owner_mismatch() -> Self {
        Self {
            field: "ownerId".into(),
        }
    }

    pub fn email_mismatch() -> Self {
        Self {
            field: "userEmail".into(),
        }
    }
}

/// Malformed request input
#[derive(Error, Debug)]
#[error("invalid {field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn empty(field: impl Into<String>) -> Self {
        Self::new(field, "must not be empty")
    }

    pub fn bad_email(field: impl Into<String>, email: &str) -> Self {
        Self::new(field, format!("'{}' is not a valid email address", email))
    }
}

/// Policy store errors; every variant is a transient "store unavailable" condition
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Policy store is not initialized")]
    NotInitialized,

    #[error("Policy store backend failure: {0}")]
    Backend(String),

    #[error("Stored policy for '{resource_id}' is unreadable: {reason}")]
    Corrupt { resource_id: String, reason: String },

    #[error("Policy store did not respond within {timeout_secs} seconds")]
    Timeout { timeout_secs: u64 },
}

/// Drive permission API errors
#[derive(Error, Debug)]
pub enum DriveError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Drive API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Rate limited, retry after {retry_after} seconds")]
    RateLimited { retry_after: u64 },

    #[error("Resource not found: {resource}")]
    NotFound { resource: String },

    #[error("Unauthorized: invalid or expired Drive credential")]
    Unauthorized,

    #[error("Forbidden: insufficient permissions for {action}")]
    Forbidden { action: String },

    #[error("Invalid response from Drive: {0}")]
    InvalidResponse(String),

    #[error("Request timeout after {timeout_secs} seconds")]
    Timeout { timeout_secs: u64 },
}

impl DriveError {
    /// Create an appropriate error from an HTTP status code and response body
    pub fn from_response(status: u16, body: &str) -> Self {
        match status {
            401 => DriveError::Unauthorized,
            403 => DriveError::Forbidden {
                action: "this operation".into(),
            },
            404 => DriveError::NotFound {
                resource: "requested resource".into(),
            },
            429 => DriveError::RateLimited { retry_after: 60 },
            _ => DriveError::Api {
                status,
                message: extract_api_message(body).unwrap_or_else(|| {
                    if body.is_empty() {
                        format!("HTTP {}", status)
                    } else {
                        body.to_string()
                    }
                }),
            },
        }
    }

    /// Message safe to show to callers: no response bodies, no external ids
    pub fn public_message(&self) -> String {
        match self {
            DriveError::Request(_) | DriveError::Timeout { .. } => {
                "the permission service could not be reached".into()
            }
            DriveError::Api { status, .. } => {
                format!("the permission service rejected the request (HTTP {})", status)
            }
            DriveError::RateLimited { .. } => "the permission service is rate limiting".into(),
            DriveError::NotFound { .. } => "the file or permission was not found".into(),
            DriveError::Unauthorized => "the service credential was rejected".into(),
            DriveError::Forbidden { .. } => {
                "the service is not allowed to change this file's permissions".into()
            }
            DriveError::InvalidResponse(_) => {
                "the permission service returned an unexpected response".into()
            }
        }
    }
}

/// Google APIs wrap errors as `{"error": {"message": ...}}`
fn extract_api_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value
        .get("error")?
        .get("message")?
        .as_str()
        .map(str::to_string)
}

/// Tagged failure of an access-rule operation
#[derive(Error, Debug)]
pub enum AccessError {
    #[error("Authentication failed: {0}")]
    Authentication(#[from] AuthError),

    #[error("Not authorized: {0}")]
    Authorization(#[from] AuthorizationError),

    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(#[from] StoreError),

    #[error("Permission API unavailable: {0}")]
    PermissionApi(#[from] DriveError),
}

impl AccessError {
    /// Stable tag that lets callers render distinct messages
    pub fn kind(&self) -> &'static str {
        match self {
            AccessError::Authentication(_) => "authentication_error",
            AccessError::Authorization(_) => "authorization_error",
            AccessError::Validation(_) => "validation_error",
            AccessError::StoreUnavailable(_) | AccessError::PermissionApi(_) => {
                "store_unavailable"
            }
        }
    }

    /// Whether the caller may retry the whole operation
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            AccessError::StoreUnavailable(_) | AccessError::PermissionApi(_)
        )
    }

    /// Caller-visible message; internals stay in the logs
    pub fn public_message(&self) -> String {
        match self {
            AccessError::Authentication(AuthError::MissingCredential) => {
                "No credential provided".into()
            }
            AccessError::Authentication(AuthError::Timeout { .. }) => {
                "Identity verification timed out".into()
            }
            AccessError::Authentication(_) => "Invalid or expired credential".into(),
            AccessError::Authorization(e) => format!("Unauthorized: {}", e),
            AccessError::Validation(e) => e.to_string(),
            AccessError::StoreUnavailable(_) => {
                "Access rules are temporarily unavailable, please retry".into()
            }
            AccessError::PermissionApi(e) => {
                format!("Failed to update permissions: {}", e.public_message())
            }
        }
    }
}

/// Result type alias for the application
pub type Result<T> = std::result::Result<T, AppError>;

/// Result type alias for access-rule operations
pub type AccessResult<T> = std::result::Result<T, AccessError>;

/// Result type alias for Drive API operations
pub type DriveResult<T> = std::result::Result<T, DriveError>;

/// Result type alias for policy store operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;
