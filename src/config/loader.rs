//! Configuration loader with layered sources
//!
//! Loads configuration from multiple sources with the following precedence
//! (highest to lowest):
//! 1. Environment variables (ACCESSGUARD_*)
//! 2. Configuration file (TOML)
//! 3. Default values

use crate::config::types::{AppConfig, IdentityProviderKind, StoreBackend};
use crate::error::ConfigError;
use config::{Config, Environment, File, FileFormat};
use std::path::Path;

/// Default configuration file paths to check (in order)
const DEFAULT_CONFIG_PATHS: &[&str] = &[
    "accessguard.toml",
    ".accessguard.toml",
    "~/.config/accessguard/config.toml",
    "/etc/accessguard/config.toml",
];

/// Environment variables that may carry the Drive access token, in precedence order
pub const DRIVE_TOKEN_ENV_VARS: &[&str] = &["GOOGLE_DRIVE_TOKEN", "GOOGLE_OAUTH_ACCESS_TOKEN"];

/// Load configuration from a TOML string (useful for testing)
pub fn load_config_from_str(toml_str: &str) -> Result<AppConfig, ConfigError> {
    let config = Config::builder()
        .add_source(File::from_str(toml_str, FileFormat::Toml))
        .build()
        .map_err(|e| ConfigError::Load(e.to_string()))?;

    let app_config: AppConfig = config
        .try_deserialize()
        .map_err(|e| ConfigError::Load(e.to_string()))?;

    // Skip token validation for testing
    validate_config_relaxed(&app_config)?;

    Ok(app_config)
}

/// Load configuration from files and environment
pub fn load_config(config_path: Option<&str>) -> Result<AppConfig, ConfigError> {
    let mut builder = Config::builder();

    if let Some(path) = config_path {
        // Explicit path provided - must exist
        if !Path::new(path).exists() {
            return Err(ConfigError::Load(format!(
                "Configuration file not found: {}",
                path
            )));
        }
        builder = builder.add_source(File::new(path, FileFormat::Toml));
    } else {
        // Try default paths (first existing one wins)
        for path in DEFAULT_CONFIG_PATHS {
            let expanded = shellexpand::tilde(path);
            if Path::new(expanded.as_ref()).exists() {
                builder = builder.add_source(File::new(&expanded, FileFormat::Toml));
                break;
            }
        }
    }

    // e.g., ACCESSGUARD_SERVER__PORT, ACCESSGUARD_STORE__BACKEND
    // Double underscore (__) maps to nested keys (server.port)
    builder = builder.add_source(
        Environment::with_prefix("ACCESSGUARD")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true),
    );

    for env_var in DRIVE_TOKEN_ENV_VARS {
        if let Ok(token) = std::env::var(env_var) {
            builder = builder
                .set_override("drive.token", token)
                .map_err(|e| ConfigError::Load(e.to_string()))?;
            break;
        }
    }

    let config = builder
        .build()
        .map_err(|e| ConfigError::Load(e.to_string()))?;

    let app_config: AppConfig = config
        .try_deserialize()
        .map_err(|e| ConfigError::Load(e.to_string()))?;

    validate_config(&app_config)?;

    Ok(app_config)
}

/// Validate configuration values (relaxed - for testing without token)
fn validate_config_relaxed(config: &AppConfig) -> Result<(), ConfigError> {
    validate_url(&config.drive.url, "drive.url")?;
    validate_url(&config.identity.tokeninfo_url, "identity.tokeninfo_url")?;
    validate_url(&config.access.view_url_base, "access.view_url_base")?;

    validate_nonzero(config.drive.timeout_secs, "drive.timeout_secs")?;
    validate_nonzero(config.identity.timeout_secs, "identity.timeout_secs")?;
    validate_nonzero(
        config.access.operation_timeout_secs,
        "access.operation_timeout_secs",
    )?;

    if config.server.port == 0 {
        return Err(ConfigError::Invalid {
            message: "server.port must be greater than 0".to_string(),
        });
    }

    if config.store.backend == StoreBackend::Redb
        && config.store.path.as_deref().is_none_or(str::is_empty)
    {
        return Err(ConfigError::Missing {
            field: "store.path (required for the redb backend)".to_string(),
        });
    }

    if config.identity.provider == IdentityProviderKind::Static
        && config.identity.static_tokens.is_empty()
    {
        return Err(ConfigError::Missing {
            field: "identity.static_tokens (required for the static provider)".to_string(),
        });
    }

    if config.metrics.recent_capacity == 0 {
        return Err(ConfigError::Invalid {
            message: "metrics.recent_capacity must be greater than 0".to_string(),
        });
    }

    if config.metrics.resource_capacity == 0 {
        return Err(ConfigError::Invalid {
            message: "metrics.resource_capacity must be greater than 0".to_string(),
        });
    }

    Ok(())
}

/// Validate configuration values
fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    validate_config_relaxed(config)?;

    if config.drive.token.as_deref().is_none_or(str::is_empty) {
        return Err(ConfigError::Missing {
            field: "drive.token (set GOOGLE_DRIVE_TOKEN environment variable)".to_string(),
        });
    }

    Ok(())
}

fn validate_url(url: &str, field: &str) -> Result<(), ConfigError> {
    if url.is_empty() {
        return Err(ConfigError::Missing {
            field: field.to_string(),
        });
    }

    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(ConfigError::Invalid {
            message: format!("{} must start with http:// or https://, got: {}", field, url),
        });
    }

    Ok(())
}

fn validate_nonzero(value: u64, field: &str) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::Invalid {
            message: format!("{} must be greater than 0", field),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_config_from_str_basic() {
        let toml = r#"
[server]
name = "test-server"

[drive]
token = "ya29.test"
"#;

        let config = load_config_from_str(toml).unwrap();
        assert_eq!(config.drive.token, Some("ya29.test".to_string()));
        assert_eq!(config.server.name, "test-server");
    }

    #[test]
    fn test_invalid_drive_url_error() {
        let toml = r#"
[drive]
url = "not-a-url"
"#;

        let result = load_config_from_str(toml);
        assert!(matches!(result, Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn test_redb_backend_requires_path() {
        let toml = r#"
[store]
backend = "redb"
"#;

        let result = load_config_from_str(toml);
        assert!(matches!(result, Err(ConfigError::Missing { .. })));
    }

    #[test]
    fn test_static_provider_requires_tokens() {
        let toml = r#"
[identity]
provider = "static"
"#;

        let result = load_config_from_str(toml);
        assert!(matches!(result, Err(ConfigError::Missing { .. })));
    }

    #[test]
    fn test_strict_validation_requires_drive_token() {
        let config = AppConfig::default();
        let result = validate_config(&config);
        assert!(matches!(result, Err(ConfigError::Missing { .. })));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let toml = r#"
[access]
operation_timeout_secs = 0
"#;

        let result = load_config_from_str(toml);
        assert!(result.is_err());
    }
}
