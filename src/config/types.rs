//! Configuration types for accessguard
//!
//! This module defines the configuration structure that can be loaded from
//! TOML files and/or environment variables.

use serde::Deserialize;
use std::collections::HashMap;

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// HTTP server settings
    pub server: ServerConfig,

    /// Caller identity verification
    pub identity: IdentityConfig,

    /// Google Drive permission API settings
    pub drive: DriveConfig,

    /// Policy store backend
    pub store: StoreConfig,

    /// Access rule engine settings
    pub access: AccessConfig,

    /// Logging configuration
    pub logging: LoggingConfig,

    /// Access metrics
    pub metrics: MetricsConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind host
    pub host: String,

    /// Bind port
    pub port: u16,

    /// Server name reported by `/api/config`
    pub name: String,

    /// Server version reported by `/api/config`
    pub version: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 20390,
            name: "accessguard".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Which identity verifier to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentityProviderKind {
    /// Google-issued ID tokens, checked against the tokeninfo endpoint
    #[default]
    Google,
    /// Fixed token table from configuration (development only)
    Static,
}

/// Identity verification configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    pub provider: IdentityProviderKind,

    /// Google tokeninfo endpoint
    pub tokeninfo_url: String,

    /// Expected `aud` claim; unchecked when absent
    #[serde(default)]
    pub audience: Option<String>,

    /// Verification request timeout in seconds
    pub timeout_secs: u64,

    /// Token → principal table for the static provider
    #[serde(default)]
    pub static_tokens: HashMap<String, StaticPrincipalConfig>,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            provider: IdentityProviderKind::Google,
            tokeninfo_url: "https://oauth2.googleapis.com/tokeninfo".to_string(),
            audience: None,
            timeout_secs: 10,
            static_tokens: HashMap::new(),
        }
    }
}

/// A principal entry for the static identity provider
#[derive(Debug, Clone, Deserialize)]
pub struct StaticPrincipalConfig {
    pub id: String,
    pub email: String,
}

/// Google Drive connection configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DriveConfig {
    /// Drive API base URL
    pub url: String,

    /// OAuth access token (prefer env var GOOGLE_DRIVE_TOKEN)
    #[serde(default)]
    pub token: Option<String>,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Maximum retries for failed requests
    pub max_retries: u32,

    /// Notify users by e-mail when a permission is created
    pub send_notification_email: bool,
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            url: "https://www.googleapis.com/drive/v3".to_string(),
            token: None,
            timeout_secs: 30,
            max_retries: 3,
            send_notification_email: false,
        }
    }
}

impl DriveConfig {
    /// Base URL without a trailing slash
    pub fn api_url(&self) -> String {
        self.url.trim_end_matches('/').to_string()
    }
}

/// Policy store backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Process-local map, lost on restart
    #[default]
    Memory,
    /// Embedded redb database file
    Redb,
}

/// Policy store configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,

    /// Database file for the redb backend
    #[serde(default)]
    pub path: Option<String>,
}

/// Access rule engine configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AccessConfig {
    /// Prefix of the view link handed out on a grant
    pub view_url_base: String,

    /// Upper bound for each identity, store and permission API call
    pub operation_timeout_secs: u64,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            view_url_base: "https://drive.google.com/file/d".to_string(),
            operation_timeout_secs: 15,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Output format (pretty, json)
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable output
    #[default]
    Pretty,
    /// JSON structured output
    Json,
}

/// Access metrics configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Serve `/api/metrics`
    pub enabled: bool,

    /// Number of recent decisions kept
    pub recent_capacity: usize,

    /// Number of resources with their own stats; least recently used go first
    pub resource_capacity: usize,

    /// Include resource ids in `/api/metrics`. The endpoint is unauthenticated,
    /// so leave this off unless the listener is private
    pub expose_resources: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            recent_capacity: 100,
            resource_capacity: 1000,
            expose_resources: false,
        }
    }
}
