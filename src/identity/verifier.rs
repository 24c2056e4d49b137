//! Identity verifier trait
//!
//! Turns an opaque bearer credential into a verified [`Principal`].

use crate::error::AuthError;
use crate::util::SecretString;
// async_trait required for dyn-compatibility with Arc<dyn IdentityVerifier>
use async_trait::async_trait;
use serde::Serialize;

/// A verified identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Principal {
    /// Stable user id (the token subject)
    pub id: String,
    pub email: String,
}

impl Principal {
    pub fn new(id: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: email.into(),
        }
    }
}

/// Credential verification
///
/// Implementations are side-effect free and never retry on their own.
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn verify(&self, credential: &SecretString) -> Result<Principal, AuthError>;

    /// Short name for logs
    fn verifier_type(&self) -> &'static str;
}
