//! Static OAuth access token authentication

use crate::auth::provider::{AuthHeader, AuthProvider};
use crate::config::DRIVE_TOKEN_ENV_VARS;
use crate::error::AuthError;
use crate::util::SecretString;
use async_trait::async_trait;

/// Bearer access token provider for the Drive API
#[derive(Debug, Clone)]
pub struct BearerTokenProvider {
    token: SecretString,
}

impl BearerTokenProvider {
    /// Create a new bearer token provider
    pub fn new(token: impl Into<String>) -> Result<Self, AuthError> {
        let token = SecretString::new(token);

        if token.is_blank() {
            return Err(AuthError::InvalidToken);
        }

        Ok(Self { token })
    }

    /// Create from environment variable
    ///
    /// Checks GOOGLE_DRIVE_TOKEN, then GOOGLE_OAUTH_ACCESS_TOKEN.
    pub fn from_env() -> Result<Self, AuthError> {
        for var in DRIVE_TOKEN_ENV_VARS {
            if let Ok(token) = std::env::var(var)
                && !token.is_empty()
            {
                return Self::new(token);
            }
        }

        Err(AuthError::NotConfigured)
    }
}

#[async_trait]
impl AuthProvider for BearerTokenProvider {
    async fn get_auth_header(&self) -> Result<AuthHeader, AuthError> {
        Ok(AuthHeader::Bearer(self.token.clone()))
    }

    fn needs_refresh(&self) -> bool {
        // Static tokens are replaced by restarting with a new one
        false
    }

    async fn refresh(&mut self) -> Result<(), AuthError> {
        Ok(())
    }

    fn auth_type(&self) -> &'static str {
        "OAuth access token"
    }
}
