//! Google Drive API client
//!
//! Provides a typed HTTP client for the Drive v3 permissions endpoints.

use crate::access::{DesiredPermission, ObservedPermission, Role};
use crate::auth::BoxedAuthProvider;
use crate::config::DriveConfig;
use crate::drive::api::PermissionApi;
use crate::drive::types::{
    CreatePermissionBody, PermissionList, UpdatePermissionBody,
};
use crate::error::{DriveError, DriveResult};
use crate::util::QueryBuilder;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{Serialize, de::DeserializeOwned};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, instrument, warn};

const LIST_FIELDS: &str = "nextPageToken,permissions(id,emailAddress,role,type)";

/// Longest `Retry-After` worth waiting for; longer ones fail straight away
const MAX_RETRY_AFTER_SECS: u64 = 5;

/// Drive API client
pub struct DriveClient {
    http: Client,
    base_url: String,
    auth: Arc<RwLock<BoxedAuthProvider>>,
    max_retries: u32,
    timeout_secs: u64,
    send_notification_email: bool,
}

impl DriveClient {
    /// Create a new Drive client from configuration
    pub fn new(config: &DriveConfig, auth: BoxedAuthProvider) -> DriveResult<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .user_agent(format!("accessguard/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(DriveError::Request)?;

        debug!(auth = auth.auth_type(), url = %config.api_url(), "Drive client ready");

        Ok(Self {
            http,
            base_url: config.api_url(),
            auth: Arc::new(RwLock::new(auth)),
            max_retries: config.max_retries,
            timeout_secs: config.timeout_secs,
            send_notification_email: config.send_notification_email,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn permissions_path(resource_id: &str) -> String {
        format!("/files/{}/permissions", urlencoding::encode(resource_id))
    }

    fn permission_path(resource_id: &str, permission_id: &str) -> String {
        format!(
            "/files/{}/permissions/{}",
            urlencoding::encode(resource_id),
            urlencoding::encode(permission_id)
        )
    }

    /// Add authentication to a request
    async fn authenticate(&self, request: RequestBuilder) -> DriveResult<RequestBuilder> {
        if self.auth.read().await.needs_refresh() {
            let mut auth = self.auth.write().await;
            // Another request may have refreshed while we waited for the lock
            if auth.needs_refresh() {
                auth.refresh().await.map_err(|e| DriveError::Api {
                    status: 401,
                    message: e.to_string(),
                })?;
                debug!(auth = auth.auth_type(), "Refreshed Drive credential");
            }
        }

        let auth = self.auth.read().await;
        let header = auth.get_auth_header().await.map_err(|e| DriveError::Api {
            status: 401,
            message: e.to_string(),
        })?;

        Ok(request.header(header.header_name(), header.header_value()))
    }

    /// Execute a request with retries.
    ///
    /// A request that is not `idempotent` is only repeated when Drive cannot
    /// have acted on it: a refused connection or a 429.
    async fn execute(&self, request: RequestBuilder, idempotent: bool) -> DriveResult<Response> {
        let mut last_error: Option<DriveError> = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = match &last_error {
                    Some(DriveError::RateLimited { retry_after }) => {
                        Duration::from_secs(*retry_after)
                    }
                    // Exponential backoff
                    _ => Duration::from_millis(100 * 2u64.pow(attempt - 1)),
                };
                tokio::time::sleep(delay).await;
                debug!("Retrying request (attempt {})", attempt + 1);
            }

            let req = request
                .try_clone()
                .ok_or_else(|| DriveError::InvalidResponse("Cannot clone request".to_string()))?;

            let error = match req.send().await {
                Ok(response) => match self.handle_response(response).await {
                    Ok(response) => return Ok(response),
                    Err(e) => e,
                },
                Err(e) if e.is_timeout() => DriveError::Timeout {
                    timeout_secs: self.timeout_secs,
                },
                Err(e) => DriveError::Request(e.without_url()),
            };

            warn!(error = %error, "Drive request failed");
            let retry = is_retryable(&error, idempotent);
            last_error = Some(error);
            if !retry {
                break;
            }
        }

        Err(last_error.unwrap_or_else(|| DriveError::InvalidResponse("Unknown error".to_string())))
    }

    /// Handle API response
    async fn handle_response(&self, response: Response) -> DriveResult<Response> {
        let status = response.status();

        if status.is_success() {
            return Ok(response);
        }

        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());
        let body = response.text().await.unwrap_or_default();

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(DriveError::RateLimited {
                retry_after: retry_after.unwrap_or(60),
            });
        }

        Err(DriveError::from_response(status.as_u16(), &body))
    }

    /// Make a GET request
    #[instrument(skip(self), fields(endpoint = %endpoint))]
    pub async fn get<T: DeserializeOwned>(&self, endpoint: &str) -> DriveResult<T> {
        let request = self.http.get(self.url(endpoint));
        let request = self.authenticate(request).await?;

        let response = self.execute(request, true).await?;
        response
            .json()
            .await
            .map_err(|e| DriveError::InvalidResponse(format!("Failed to parse response: {}", e)))
    }

    /// Make a POST request, ignoring the response body
    #[instrument(skip(self, body), fields(endpoint = %endpoint))]
    pub async fn post_no_content<B: Serialize + ?Sized>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> DriveResult<()> {
        let request = self.http.post(self.url(endpoint)).json(body);
        let request = self.authenticate(request).await?;

        self.execute(request, false).await?;
        Ok(())
    }

    /// Make a PATCH request, ignoring the response body
    #[instrument(skip(self, body), fields(endpoint = %endpoint))]
    pub async fn patch_no_content<B: Serialize + ?Sized>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> DriveResult<()> {
        let request = self.http.patch(self.url(endpoint)).json(body);
        let request = self.authenticate(request).await?;

        self.execute(request, true).await?;
        Ok(())
    }

    /// Make a DELETE request
    #[instrument(skip(self), fields(endpoint = %endpoint))]
    pub async fn delete(&self, endpoint: &str) -> DriveResult<()> {
        let request = self.http.delete(self.url(endpoint));
        let request = self.authenticate(request).await?;

        self.execute(request, true).await?;
        Ok(())
    }
}

#[async_trait]
impl PermissionApi for DriveClient {
    async fn list_permissions(&self, resource_id: &str) -> DriveResult<Vec<ObservedPermission>> {
        let mut observed = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let query = QueryBuilder::new()
                .param("fields", LIST_FIELDS)
                .param("supportsAllDrives", true)
                .optional("pageToken", page_token.as_deref())
                .build();
            let page: PermissionList = self
                .get(&format!("{}{}", Self::permissions_path(resource_id), query))
                .await?;

            observed.extend(
                page.permissions
                    .into_iter()
                    .filter_map(|p| p.into_observed()),
            );

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        Ok(observed)
    }

    async fn create_permission(
        &self,
        resource_id: &str,
        permission: &DesiredPermission,
        expiration_time: Option<&str>,
    ) -> DriveResult<()> {
        let query = QueryBuilder::new()
            .param("sendNotificationEmail", self.send_notification_email)
            .param("supportsAllDrives", true)
            .build();
        let body = CreatePermissionBody {
            role: permission.role.as_drive_role(),
            kind: "user",
            email_address: &permission.email,
            expiration_time,
        };
        self.post_no_content(
            &format!("{}{}", Self::permissions_path(resource_id), query),
            &body,
        )
        .await
    }

    async fn update_permission(
        &self,
        resource_id: &str,
        permission_id: &str,
        role: Role,
    ) -> DriveResult<()> {
        let query = QueryBuilder::new().param("supportsAllDrives", true).build();
        let body = UpdatePermissionBody {
            role: role.as_drive_role(),
        };
        self.patch_no_content(
            &format!(
                "{}{}",
                Self::permission_path(resource_id, permission_id),
                query
            ),
            &body,
        )
        .await
    }

    async fn delete_permission(&self, resource_id: &str, permission_id: &str) -> DriveResult<()> {
        let query = QueryBuilder::new().param("supportsAllDrives", true).build();
        self.delete(&format!(
            "{}{}",
            Self::permission_path(resource_id, permission_id),
            query
        ))
        .await
    }
}

/// Check if an error is retryable
fn is_retryable(error: &DriveError, idempotent: bool) -> bool {
    match error {
        DriveError::Request(e) => e.is_connect(),
        DriveError::RateLimited { retry_after } => *retry_after <= MAX_RETRY_AFTER_SECS,
        // Drive may already have applied the request
        DriveError::Timeout { .. } => idempotent,
        DriveError::Api { status, .. } => idempotent && *status >= 500,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_encode_ids() {
        assert_eq!(
            DriveClient::permissions_path("abc/def"),
            "/files/abc%2Fdef/permissions"
        );
        assert_eq!(
            DriveClient::permission_path("abc", "perm 1"),
            "/files/abc/permissions/perm%201"
        );
    }

    #[test]
    fn test_is_retryable() {
        let backend_error = DriveError::Api {
            status: 503,
            message: "Backend Error".to_string(),
        };
        assert!(is_retryable(&backend_error, true));
        assert!(!is_retryable(&backend_error, false));
        assert!(!is_retryable(&DriveError::Timeout { timeout_secs: 30 }, false));

        assert!(is_retryable(&DriveError::RateLimited { retry_after: 2 }, false));
        assert!(!is_retryable(&DriveError::RateLimited { retry_after: 60 }, true));

        assert!(!is_retryable(
            &DriveError::Api {
                status: 400,
                message: "Bad request".to_string()
            },
            true
        ));
        assert!(!is_retryable(&DriveError::Unauthorized, true));
    }
}
