//! Authentication module
//!
//! Outbound credentials for the Drive permission API. Inbound caller
//! identity is handled by [`crate::identity`].

pub mod provider;
pub mod token;

pub use provider::{AuthHeader, AuthProvider, BoxedAuthProvider};
pub use token::BearerTokenProvider;

use crate::config::DriveConfig;
use crate::error::AuthError;

/// Create an auth provider from configuration
pub fn create_auth_provider(config: &DriveConfig) -> Result<BoxedAuthProvider, AuthError> {
    if let Some(token) = &config.token {
        Ok(Box::new(BearerTokenProvider::new(token.clone())?))
    } else {
        Ok(Box::new(BearerTokenProvider::from_env()?))
    }
}
