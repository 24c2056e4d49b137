//! Configuration module
//!
//! Handles loading and validating configuration from TOML files and environment variables.

pub mod loader;
pub mod types;

pub use loader::{DRIVE_TOKEN_ENV_VARS, load_config, load_config_from_str};
pub use types::*;
