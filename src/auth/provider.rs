//! Authentication provider trait
//!
//! Supplies the credential the Drive client attaches to outbound requests.
//! A static OAuth access token is supported today; a refreshing service
//! account flow can implement the same trait.

use crate::error::AuthError;
use crate::util::SecretString;
// async_trait required for dyn-compatibility with Box<dyn AuthProvider>
use async_trait::async_trait;

/// Authentication provider trait
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Get the authentication header value
    async fn get_auth_header(&self) -> Result<AuthHeader, AuthError>;

    /// Check if the credentials need to be refreshed
    fn needs_refresh(&self) -> bool;

    /// Refresh the credentials if needed
    async fn refresh(&mut self) -> Result<(), AuthError>;

    /// Get a description of the auth method (for logging)
    fn auth_type(&self) -> &'static str;
}

/// Authentication header to use with requests
#[derive(Debug, Clone)]
pub enum AuthHeader {
    /// OAuth bearer token
    Bearer(SecretString),
}

impl AuthHeader {
    /// Get the header name for this auth type
    pub fn header_name(&self) -> &'static str {
        match self {
            AuthHeader::Bearer(_) => "Authorization",
        }
    }

    /// Get the header value for this auth type
    pub fn header_value(&self) -> String {
        match self {
            AuthHeader::Bearer(token) => format!("Bearer {}", token.expose_secret()),
        }
    }
}

/// Box type alias for auth providers
pub type BoxedAuthProvider = Box<dyn AuthProvider>;
