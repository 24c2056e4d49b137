//! Drive client integration tests with mock server

use accessguard::access::{DesiredPermission, ObservedRole, Role};
use accessguard::auth::{AuthHeader, AuthProvider, BearerTokenProvider, BoxedAuthProvider};
use accessguard::config::DriveConfig;
use accessguard::drive::{DriveClient, PermissionApi};
use accessguard::error::{AuthError, DriveError};
use accessguard::util::SecretString;
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Helper to create a test client pointing to mock server
fn create_test_client(mock_server: &MockServer, max_retries: u32) -> DriveClient {
    let auth = BearerTokenProvider::new("ya29.test").unwrap();
    create_client_with_auth(mock_server, max_retries, Box::new(auth))
}

fn create_client_with_auth(
    mock_server: &MockServer,
    max_retries: u32,
    auth: BoxedAuthProvider,
) -> DriveClient {
    let config = DriveConfig {
        url: mock_server.uri(),
        token: Some("ya29.test".to_string()),
        timeout_secs: 5,
        max_retries,
        send_notification_email: false,
    };
    DriveClient::new(&config, auth).unwrap()
}

#[tokio::test]
async fn test_list_permissions_follows_pages() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/files/file-1/permissions"))
        .and(query_param("pageToken", "next"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "permissions": [
                {"id": "3", "type": "user", "role": "writer", "emailAddress": "c@x.com"}
            ]
        })))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/files/file-1/permissions"))
        .and(header("Authorization", "Bearer ya29.test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "nextPageToken": "next",
            "permissions": [
                {"id": "0", "type": "user", "role": "owner", "emailAddress": "owner@x.com"},
                {"id": "1", "type": "user", "role": "reader", "emailAddress": "a@x.com"},
                {"id": "anyoneWithLink", "type": "anyone", "role": "reader"}
            ]
        })))
        .mount(&mock_server)
        .await;

    let client = create_test_client(&mock_server, 0);
    let observed = client.list_permissions("file-1").await.unwrap();

    // The "anyone" grant has no e-mail and is left out
    assert_eq!(observed.len(), 3);
    assert_eq!(observed[0].role, ObservedRole::Owner);
    assert_eq!(observed[1].email, "a@x.com");
    assert_eq!(observed[1].role, ObservedRole::Granted(Role::Viewer));
    assert_eq!(observed[2].permission_id, "3");
    assert_eq!(observed[2].role, ObservedRole::Granted(Role::Editor));
}

#[tokio::test]
async fn test_create_permission_sends_drive_role() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/files/file-1/permissions"))
        .and(query_param("sendNotificationEmail", "false"))
        .and(body_json(json!({
            "role": "commenter",
            "type": "user",
            "emailAddress": "b@x.com",
            "expirationTime": "2030-01-01T00:00:00Z"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "9"})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = create_test_client(&mock_server, 0);
    client
        .create_permission(
            "file-1",
            &DesiredPermission::new("b@x.com", Role::Commenter),
            Some("2030-01-01T00:00:00Z"),
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn test_update_permission_patches_role() {
    let mock_server = MockServer::start().await;

    Mock::given(method("PATCH"))
        .and(path("/files/file-1/permissions/1"))
        .and(body_json(json!({"role": "writer"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "1"})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = create_test_client(&mock_server, 0);
    client
        .update_permission("file-1", "1", Role::Editor)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_delete_permission() {
    let mock_server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/files/file-1/permissions/2"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = create_test_client(&mock_server, 0);
    client.delete_permission("file-1", "2").await.unwrap();
}

#[tokio::test]
async fn test_unauthorized_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": {"code": 401, "message": "Invalid Credentials"}
        })))
        .mount(&mock_server)
        .await;

    let client = create_test_client(&mock_server, 0);
    let result = client.list_permissions("file-1").await;

    assert!(matches!(result, Err(DriveError::Unauthorized)));
}

#[tokio::test]
async fn test_not_found_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": {"code": 404, "message": "Permission not found: 2."}
        })))
        .mount(&mock_server)
        .await;

    let client = create_test_client(&mock_server, 0);
    let result = client.delete_permission("file-1", "2").await;

    assert!(matches!(result, Err(DriveError::NotFound { .. })));
}

#[tokio::test]
async fn test_rate_limit_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "30"))
        .mount(&mock_server)
        .await;

    let client = create_test_client(&mock_server, 0);
    let result = client.list_permissions("file-1").await;

    assert!(matches!(
        result,
        Err(DriveError::RateLimited { retry_after: 30 })
    ));
}

#[tokio::test]
async fn test_server_error_message_extracted() {
    let mock_server = MockServer::start().await;

    Mock::given(method("PATCH"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": {"code": 400, "message": "The owner of a file cannot be changed."}
        })))
        .mount(&mock_server)
        .await;

    let client = create_test_client(&mock_server, 0);
    let err = client
        .update_permission("file-1", "0", Role::Viewer)
        .await
        .unwrap_err();

    match &err {
        DriveError::Api { status, message } => {
            assert_eq!(*status, 400);
            assert_eq!(message, "The owner of a file cannot be changed.");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    // Upstream text stays out of the caller-visible message
    assert!(!err.public_message().contains("owner"));
}

#[tokio::test]
async fn test_server_error_is_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&mock_server)
        .await;

    let client = create_test_client(&mock_server, 2);
    client.delete_permission("file-1", "2").await.unwrap();
}

#[tokio::test]
async fn test_failed_create_is_not_repeated() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = create_test_client(&mock_server, 2);
    let result = client
        .create_permission(
            "file-1",
            &DesiredPermission::new("b@x.com", Role::Viewer),
            None,
        )
        .await;

    assert!(matches!(result, Err(DriveError::Api { status: 503, .. })));
}

#[tokio::test]
async fn test_rate_limited_create_waits_and_retries() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "1"))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "9"})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = create_test_client(&mock_server, 2);
    let started = std::time::Instant::now();
    client
        .create_permission(
            "file-1",
            &DesiredPermission::new("b@x.com", Role::Viewer),
            None,
        )
        .await
        .unwrap();
    assert!(started.elapsed() >= std::time::Duration::from_secs(1));
}

#[tokio::test]
async fn test_long_retry_after_is_not_waited_for() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "120"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = create_test_client(&mock_server, 3);
    let result = client.list_permissions("file-1").await;

    assert!(matches!(
        result,
        Err(DriveError::RateLimited { retry_after: 120 })
    ));
}

/// Provider whose first token is stale until refreshed
struct RotatingProvider {
    token: SecretString,
    fresh: bool,
    refreshes: Arc<AtomicUsize>,
}

#[async_trait]
impl AuthProvider for RotatingProvider {
    async fn get_auth_header(&self) -> Result<AuthHeader, AuthError> {
        Ok(AuthHeader::Bearer(self.token.clone()))
    }

    fn needs_refresh(&self) -> bool {
        !self.fresh
    }

    async fn refresh(&mut self) -> Result<(), AuthError> {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        self.token = SecretString::new("ya29.rotated");
        self.fresh = true;
        Ok(())
    }

    fn auth_type(&self) -> &'static str {
        "rotating"
    }
}

#[tokio::test]
async fn test_stale_credential_is_refreshed_once() {
    let mock_server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(header("Authorization", "Bearer ya29.rotated"))
        .respond_with(ResponseTemplate::new(204))
        .expect(2)
        .mount(&mock_server)
        .await;

    let refreshes = Arc::new(AtomicUsize::new(0));
    let auth = RotatingProvider {
        token: SecretString::new("ya29.stale"),
        fresh: false,
        refreshes: refreshes.clone(),
    };
    let client = create_client_with_auth(&mock_server, 0, Box::new(auth));

    client.delete_permission("file-1", "1").await.unwrap();
    client.delete_permission("file-1", "2").await.unwrap();

    assert_eq!(refreshes.load(Ordering::SeqCst), 1);
}

/// Provider that cannot obtain a new credential
struct ExpiredProvider;

#[async_trait]
impl AuthProvider for ExpiredProvider {
    async fn get_auth_header(&self) -> Result<AuthHeader, AuthError> {
        Err(AuthError::TokenExpired)
    }

    fn needs_refresh(&self) -> bool {
        true
    }

    async fn refresh(&mut self) -> Result<(), AuthError> {
        Err(AuthError::TokenExpired)
    }

    fn auth_type(&self) -> &'static str {
        "expired"
    }
}

#[tokio::test]
async fn test_failed_refresh_sends_nothing() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let client = create_client_with_auth(&mock_server, 0, Box::new(ExpiredProvider));
    let result = client.list_permissions("file-1").await;

    assert!(matches!(result, Err(DriveError::Api { status: 401, .. })));
}
