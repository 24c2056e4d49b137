//! Identity verifier tests against a mock tokeninfo endpoint

use accessguard::config::{IdentityConfig, IdentityProviderKind, StaticPrincipalConfig};
use accessguard::error::AuthError;
use accessguard::identity::{GoogleTokenVerifier, IdentityVerifier, create_identity_verifier};
use accessguard::util::SecretString;
use serde_json::json;
use std::collections::HashMap;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn google_verifier(mock_server: &MockServer, audience: Option<&str>) -> GoogleTokenVerifier {
    let config = IdentityConfig {
        tokeninfo_url: format!("{}/tokeninfo", mock_server.uri()),
        audience: audience.map(str::to_string),
        timeout_secs: 5,
        ..Default::default()
    };
    GoogleTokenVerifier::new(&config).unwrap()
}

#[tokio::test]
async fn test_valid_token_yields_principal() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/tokeninfo"))
        .and(query_param("id_token", "good-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "sub": "110169484474386276334",
            "email": "alice@example.com",
            "email_verified": "true",
            "aud": "client-1.apps.googleusercontent.com"
        })))
        .mount(&mock_server)
        .await;

    let verifier = google_verifier(&mock_server, Some("client-1.apps.googleusercontent.com"));
    let principal = verifier
        .verify(&SecretString::new("good-token"))
        .await
        .unwrap();

    assert_eq!(principal.id, "110169484474386276334");
    assert_eq!(principal.email, "alice@example.com");
}

#[tokio::test]
async fn test_rejected_token() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/tokeninfo"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_token",
            "error_description": "Invalid Value"
        })))
        .mount(&mock_server)
        .await;

    let verifier = google_verifier(&mock_server, None);
    let result = verifier.verify(&SecretString::new("expired")).await;

    assert!(matches!(result, Err(AuthError::Rejected(_))));
}

#[tokio::test]
async fn test_audience_mismatch_is_rejected() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/tokeninfo"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "sub": "1",
            "email": "alice@example.com",
            "aud": "someone-else"
        })))
        .mount(&mock_server)
        .await;

    let verifier = google_verifier(&mock_server, Some("client-1"));
    let result = verifier.verify(&SecretString::new("token")).await;

    assert!(matches!(result, Err(AuthError::Rejected(_))));
}

#[tokio::test]
async fn test_missing_email_claim_is_invalid() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/tokeninfo"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"sub": "1"})))
        .mount(&mock_server)
        .await;

    let verifier = google_verifier(&mock_server, None);
    let result = verifier.verify(&SecretString::new("token")).await;

    assert!(matches!(result, Err(AuthError::InvalidToken)));
}

#[tokio::test]
async fn test_issuer_outage_is_not_a_rejection() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock_server)
        .await;

    let verifier = google_verifier(&mock_server, None);
    let result = verifier.verify(&SecretString::new("token")).await;

    assert!(matches!(result, Err(AuthError::Failed(_))));
}

#[tokio::test]
async fn test_blank_credential_skips_network() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let verifier = google_verifier(&mock_server, None);
    let result = verifier.verify(&SecretString::new("")).await;

    assert!(matches!(result, Err(AuthError::MissingCredential)));
}

#[tokio::test]
async fn test_static_provider_from_config() {
    let mut static_tokens = HashMap::new();
    static_tokens.insert(
        "dev-token".to_string(),
        StaticPrincipalConfig {
            id: "dev".to_string(),
            email: "dev@example.com".to_string(),
        },
    );
    let config = IdentityConfig {
        provider: IdentityProviderKind::Static,
        static_tokens,
        ..Default::default()
    };

    let verifier = create_identity_verifier(&config).unwrap();
    assert_eq!(verifier.verifier_type(), "static");

    let principal = verifier
        .verify(&SecretString::new("dev-token"))
        .await
        .unwrap();
    assert_eq!(principal.email, "dev@example.com");
    assert!(verifier.verify(&SecretString::new("other")).await.is_err());
}

#[test]
fn test_static_provider_without_tokens_is_not_configured() {
    let config = IdentityConfig {
        provider: IdentityProviderKind::Static,
        ..Default::default()
    };
    assert!(matches!(
        create_identity_verifier(&config),
        Err(AuthError::NotConfigured)
    ));
}
