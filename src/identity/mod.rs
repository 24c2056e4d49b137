//! Caller identity verification
//!
//! Every access operation starts by turning the caller's bearer credential
//! into a [`Principal`] and comparing it with the identity the request asserts.

pub mod fixed;
pub mod google;
pub mod verifier;

pub use fixed::StaticTokenVerifier;
pub use google::GoogleTokenVerifier;
pub use verifier::{IdentityVerifier, Principal};

use crate::config::{IdentityConfig, IdentityProviderKind};
use crate::error::AuthError;
use std::sync::Arc;

/// Create the configured identity verifier
pub fn create_identity_verifier(
    config: &IdentityConfig,
) -> Result<Arc<dyn IdentityVerifier>, AuthError> {
    match config.provider {
        IdentityProviderKind::Google => Ok(Arc::new(GoogleTokenVerifier::new(config)?)),
        IdentityProviderKind::Static => {
            if config.static_tokens.is_empty() {
                return Err(AuthError::NotConfigured);
            }
            Ok(Arc::new(StaticTokenVerifier::from_config(&config.static_tokens)))
        }
    }
}
