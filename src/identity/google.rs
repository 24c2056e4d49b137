//! Google ID token verification
//!
//! Validates Google-issued ID tokens against the `tokeninfo` endpoint, which
//! checks signature and expiry server-side.

use crate::config::IdentityConfig;
use crate::error::AuthError;
use crate::identity::verifier::{IdentityVerifier, Principal};
use crate::util::{QueryBuilder, SecretString};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Claims returned by `tokeninfo`; every value arrives as a string
#[derive(Debug, Deserialize)]
struct TokenInfo {
    #[serde(default)]
    sub: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    aud: Option<String>,
    #[serde(default)]
    email_verified: Option<String>,
}

pub struct GoogleTokenVerifier {
    http: Client,
    tokeninfo_url: String,
    audience: Option<String>,
    timeout_secs: u64,
}

impl GoogleTokenVerifier {
    pub fn new(config: &IdentityConfig) -> Result<Self, AuthError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(format!("accessguard/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AuthError::Failed(e.to_string()))?;

        Ok(Self {
            http,
            tokeninfo_url: config.tokeninfo_url.clone(),
            audience: config.audience.clone(),
            timeout_secs: config.timeout_secs,
        })
    }

    fn check_claims(&self, info: TokenInfo) -> Result<Principal, AuthError> {
        if let Some(expected) = &self.audience
            && info.aud.as_deref() != Some(expected.as_str())
        {
            return Err(AuthError::Rejected("audience mismatch".into()));
        }

        if info.email_verified.as_deref() == Some("false") {
            return Err(AuthError::Rejected("email address is not verified".into()));
        }

        match (info.sub, info.email) {
            (Some(sub), Some(email)) if !sub.is_empty() && !email.is_empty() => {
                Ok(Principal::new(sub, email))
            }
            _ => Err(AuthError::InvalidToken),
        }
    }
}

#[async_trait]
impl IdentityVerifier for GoogleTokenVerifier {
    #[instrument(skip_all)]
    async fn verify(&self, credential: &SecretString) -> Result<Principal, AuthError> {
        if credential.is_blank() {
            return Err(AuthError::MissingCredential);
        }

        let query = QueryBuilder::new()
            .param("id_token", credential.expose_secret())
            .build();
        let url = format!("{}{}", self.tokeninfo_url, query);

        let response = self.http.get(&url).send().await.map_err(|e| {
            if e.is_timeout() {
                AuthError::Timeout {
                    timeout_secs: self.timeout_secs,
                }
            } else {
                warn!(error = %e.without_url(), "tokeninfo request failed");
                AuthError::Failed("identity service unreachable".into())
            }
        })?;

        let status = response.status();
        if status == StatusCode::BAD_REQUEST || status == StatusCode::UNAUTHORIZED {
            debug!(status = status.as_u16(), "ID token rejected");
            return Err(AuthError::Rejected("token rejected by issuer".into()));
        }
        if !status.is_success() {
            return Err(AuthError::Failed(format!(
                "identity service returned HTTP {}",
                status.as_u16()
            )));
        }

        let info: TokenInfo = response.json().await.map_err(|_| AuthError::InvalidToken)?;
        let principal = self.check_claims(info)?;
        debug!(principal_id = %principal.id, "ID token verified");
        Ok(principal)
    }

    fn verifier_type(&self) -> &'static str {
        "google"
    }
}
