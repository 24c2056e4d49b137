//! Configured token table
//!
//! Maps fixed tokens to principals. Meant for local development, where no
//! Google sign-in is available.

use crate::config::StaticPrincipalConfig;
use crate::error::AuthError;
use crate::identity::verifier::{IdentityVerifier, Principal};
use crate::util::SecretString;
use async_trait::async_trait;
use std::collections::HashMap;

pub struct StaticTokenVerifier {
    principals: HashMap<String, Principal>,
}

impl StaticTokenVerifier {
    pub fn new(principals: impl IntoIterator<Item = (String, Principal)>) -> Self {
        Self {
            principals: principals.into_iter().collect(),
        }
    }

    pub fn from_config(tokens: &HashMap<String, StaticPrincipalConfig>) -> Self {
        Self::new(
            tokens
                .iter()
                .map(|(token, p)| (token.clone(), Principal::new(&p.id, &p.email))),
        )
    }
}

#[async_trait]
impl IdentityVerifier for StaticTokenVerifier {
    async fn verify(&self, credential: &SecretString) -> Result<Principal, AuthError> {
        if credential.is_blank() {
            return Err(AuthError::MissingCredential);
        }
        self.principals
            .get(credential.expose_secret())
            .cloned()
            .ok_or_else(|| AuthError::Rejected("unknown token".into()))
    }

    fn verifier_type(&self) -> &'static str {
        "static"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verifier() -> StaticTokenVerifier {
        StaticTokenVerifier::new([(
            "tok-alice".to_string(),
            Principal::new("uid-alice", "alice@x.com"),
        )])
    }

    #[tokio::test]
    async fn test_known_token() {
        let principal = verifier()
            .verify(&SecretString::new("tok-alice"))
            .await
            .unwrap();
        assert_eq!(principal.id, "uid-alice");
        assert_eq!(principal.email, "alice@x.com");
    }

    #[tokio::test]
    async fn test_unknown_token_rejected() {
        let result = verifier().verify(&SecretString::new("tok-bob")).await;
        assert!(matches!(result, Err(AuthError::Rejected(_))));
    }

    #[tokio::test]
    async fn test_blank_token_missing() {
        let result = verifier().verify(&SecretString::new("")).await;
        assert!(matches!(result, Err(AuthError::MissingCredential)));
    }
}
