//! Access rule engine
//!
//! Orchestrates the three caller-facing operations. Each one verifies the
//! credential first, checks the asserted identity, and then talks to the
//! policy store or the permission API under a bounded wait.
//!
//! The engine holds no locks of its own. The exactly-k-of-N guarantee for
//! concurrent validations comes from [`PolicyStore::increment_views_if_below_limit`],
//! which also refuses a view against a policy replaced since it was read.

use crate::access::clock::{Clock, SystemClock};
use crate::access::reconcile::reconcile;
use crate::access::requests::{
    ReconcilePermissionsRequest, ReconcilePermissionsResponse, SetAccessRuleRequest,
    SetAccessRuleResponse, ValidateAccessRequest, ValidateAccessResponse,
};
use crate::access::types::{
    AccessDecision, AccessPolicy, DenialReason, DesiredPermission, FailedItem,
    PermissionOperation, is_valid_email,
};
use crate::config::AccessConfig;
use crate::drive::PermissionApi;
use crate::error::{
    AccessError, AccessResult, AuthError, AuthorizationError, DriveError, DriveResult,
    StoreError, StoreResult, ValidationError,
};
use crate::identity::{IdentityVerifier, Principal};
use crate::metrics::{AccessMetrics, Operation};
use crate::store::PolicyStore;
use crate::util::SecretString;
use futures::future::BoxFuture;
use futures::{FutureExt, StreamExt, stream};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

/// How many permission changes run at once during reconciliation
const RECONCILE_CONCURRENCY: usize = 4;

/// Reads of a policy a single validation may make when the increment keeps
/// being refused (the last view went elsewhere, or the policy was replaced)
const SNAPSHOT_ATTEMPTS: usize = 3;

/// Access rule engine
pub struct AccessRuleEngine {
    identity: Arc<dyn IdentityVerifier>,
    store: Arc<dyn PolicyStore>,
    permissions: Arc<dyn PermissionApi>,
    clock: Arc<dyn Clock>,
    view_url_base: String,
    operation_timeout: Duration,
    metrics: Option<Arc<AccessMetrics>>,
}

impl AccessRuleEngine {
    pub fn new(
        identity: Arc<dyn IdentityVerifier>,
        store: Arc<dyn PolicyStore>,
        permissions: Arc<dyn PermissionApi>,
        config: &AccessConfig,
    ) -> Self {
        Self {
            identity,
            store,
            permissions,
            clock: Arc::new(SystemClock),
            view_url_base: config.view_url_base.trim_end_matches('/').to_string(),
            operation_timeout: Duration::from_secs(config.operation_timeout_secs),
            metrics: None,
        }
    }

    /// Replace the time source
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<AccessMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn metrics(&self) -> Option<&Arc<AccessMetrics>> {
        self.metrics.as_ref()
    }

    /// Link handed out on a grant
    pub fn view_link(&self, resource_id: &str) -> String {
        format!(
            "{}/{}/view?usp=sharing",
            self.view_url_base,
            urlencoding::encode(resource_id)
        )
    }

    /// Store (or replace) the policy for a resource.
    ///
    /// Only the verified owner may write; the new policy starts with zero views.
    #[instrument(skip_all, fields(resource_id = %request.resource_id))]
    pub async fn set_access_rule(
        &self,
        request: SetAccessRuleRequest,
    ) -> AccessResult<SetAccessRuleResponse> {
        let started = Instant::now();
        let resource_id = request.resource_id.clone();

        let result = self.set_access_rule_inner(request).await;
        match &result {
            Ok(_) => self.record_success(Operation::SetAccessRule, &resource_id, started),
            Err(e) => self.record_error(Operation::SetAccessRule, &resource_id, e, started),
        }
        result
    }

    async fn set_access_rule_inner(
        &self,
        request: SetAccessRuleRequest,
    ) -> AccessResult<SetAccessRuleResponse> {
        let principal = self.verify(request.credential.as_ref()).await?;
        if request.owner_id != principal.id {
            warn!(principal = %principal.id, "Rejected rule write from non-owner");
            return Err(AuthorizationError::owner_mismatch().into());
        }

        let policy = validate_rule(request)?;
        let view_limit = policy.view_limit;
        let allowed = policy.allowed_principals.len();

        let timeout_secs = self.operation_timeout.as_secs();
        self.bounded(self.store.put(policy), || StoreError::Timeout { timeout_secs })
            .await?;

        info!(view_limit, allowed, "Access rules saved");
        Ok(SetAccessRuleResponse::saved())
    }

    /// Check a recipient against the policy and consume one view on success.
    ///
    /// Denials are results, not errors; only credential, identity and store
    /// problems surface as `Err`.
    #[instrument(skip_all, fields(resource_id = %request.resource_id))]
    pub async fn validate_access(
        &self,
        request: ValidateAccessRequest,
    ) -> AccessResult<ValidateAccessResponse> {
        let started = Instant::now();
        let resource_id = request.resource_id.clone();

        match self.validate_access_inner(request).await {
            Ok(decision) => {
                if let Some(metrics) = &self.metrics {
                    metrics.record_validation(
                        &resource_id,
                        decision.denial_reason(),
                        started.elapsed(),
                    );
                }
                Ok(decision.into())
            }
            Err(e) => {
                self.record_error(Operation::ValidateAccess, &resource_id, &e, started);
                Err(e)
            }
        }
    }

    async fn validate_access_inner(
        &self,
        request: ValidateAccessRequest,
    ) -> AccessResult<AccessDecision> {
        let principal = self.verify(request.credential.as_ref()).await?;
        if request.user_email != principal.email {
            warn!("Asserted e-mail does not match the verified principal");
            return Err(AuthorizationError::email_mismatch().into());
        }
        if request.resource_id.is_empty() {
            debug!("Empty resource id has no rules");
            return Ok(AccessDecision::Denied(DenialReason::RulesNotFound));
        }

        let resource_id = request.resource_id.as_str();
        let timeout_secs = self.operation_timeout.as_secs();

        for _ in 0..SNAPSHOT_ATTEMPTS {
            let policy = self
                .bounded(self.store.get(resource_id), || StoreError::Timeout {
                    timeout_secs,
                })
                .await?;
            let Some(policy) = policy else {
                debug!("No access rules stored");
                return Ok(AccessDecision::Denied(DenialReason::RulesNotFound));
            };

            if let Some(reason) = policy.evaluate(&request.user_email, self.clock.now_millis()) {
                info!(reason = %reason, revision = policy.revision, "Access denied");
                return Ok(AccessDecision::Denied(reason));
            }

            // Consumed only if the snapshot just evaluated is still the stored one
            let consumed = self
                .store
                .increment_views_if_below_limit(
                    resource_id,
                    policy.revision,
                    self.operation_timeout,
                )
                .await
                .inspect_err(|e| {
                    warn!(backend = self.store.backend_name(), error = %e, "View increment failed")
                })?;
            if consumed {
                info!(
                    remaining = policy.remaining_views().saturating_sub(1),
                    revision = policy.revision,
                    "Access granted"
                );
                return Ok(AccessDecision::Granted {
                    view_link: self.view_link(resource_id),
                });
            }
            debug!(
                revision = policy.revision,
                "Increment refused, re-reading the policy"
            );
        }

        warn!("Policy kept changing under validation");
        Ok(AccessDecision::Denied(DenialReason::ViewLimitExceeded))
    }

    /// Move the resource's external permissions to the desired set.
    ///
    /// Each create, update and remove is attempted independently; failed
    /// items are reported while the rest stay applied.
    #[instrument(skip_all, fields(resource_id = %request.resource_id))]
    pub async fn reconcile_permissions(
        &self,
        request: ReconcilePermissionsRequest,
    ) -> AccessResult<ReconcilePermissionsResponse> {
        let started = Instant::now();
        let resource_id = request.resource_id.clone();

        let result = self.reconcile_permissions_inner(request).await;
        match &result {
            Ok(response) if response.success => {
                self.record_success(Operation::ReconcilePermissions, &resource_id, started)
            }
            Ok(_) => {
                if let Some(metrics) = &self.metrics {
                    metrics.record_error(
                        Operation::ReconcilePermissions,
                        Some(&resource_id),
                        "partial_failure",
                        started.elapsed(),
                    );
                }
            }
            Err(e) => self.record_error(Operation::ReconcilePermissions, &resource_id, e, started),
        }
        result
    }

    async fn reconcile_permissions_inner(
        &self,
        request: ReconcilePermissionsRequest,
    ) -> AccessResult<ReconcilePermissionsResponse> {
        let principal = self.verify(request.credential.as_ref()).await?;
        debug!(principal = %principal.id, "Reconciling permissions");

        if request.resource_id.is_empty() {
            return Err(ValidationError::empty("resourceId").into());
        }
        validate_desired(&request.desired)?;

        let resource_id = request.resource_id.as_str();
        let expiration_time = request
            .expiration_time
            .as_deref()
            .filter(|t| !t.trim().is_empty());

        let observed = self
            .bounded_drive(self.permissions.list_permissions(resource_id))
            .await
            .inspect_err(|e| warn!(error = %e, "Failed to list permissions"))?;

        let plan = reconcile(resource_id, &request.desired, &observed);
        let attempted = plan.len();
        if plan.is_empty() {
            return Ok(ReconcilePermissionsResponse::from_outcome(0, Vec::new()));
        }

        let mut jobs: Vec<BoxFuture<'_, Option<FailedItem>>> = Vec::with_capacity(attempted);
        for want in &plan.to_create {
            jobs.push(
                self.attempt(
                    PermissionOperation::Create,
                    &want.email,
                    self.permissions
                        .create_permission(resource_id, want, expiration_time),
                )
                .boxed(),
            );
        }
        for update in &plan.to_update {
            jobs.push(
                self.attempt(
                    PermissionOperation::Update,
                    &update.email,
                    self.permissions.update_permission(
                        resource_id,
                        &update.permission_id,
                        update.role,
                    ),
                )
                .boxed(),
            );
        }
        for removal in &plan.to_remove {
            jobs.push(
                self.attempt(
                    PermissionOperation::Remove,
                    &removal.email,
                    self.permissions
                        .delete_permission(resource_id, &removal.permission_id),
                )
                .boxed(),
            );
        }

        let failed: Vec<FailedItem> = stream::iter(jobs)
            .buffered(RECONCILE_CONCURRENCY)
            .collect::<Vec<_>>()
            .await
            .into_iter()
            .flatten()
            .collect();

        if failed.is_empty() {
            info!(changes = attempted, "Permissions reconciled");
        } else {
            warn!(
                changes = attempted,
                failed = failed.len(),
                "Permissions partially reconciled"
            );
        }
        Ok(ReconcilePermissionsResponse::from_outcome(attempted, failed))
    }

    /// Run one permission change; a failure becomes a reported item
    async fn attempt(
        &self,
        operation: PermissionOperation,
        email: &str,
        call: impl Future<Output = DriveResult<()>> + Send,
    ) -> Option<FailedItem> {
        match self.bounded_drive(call).await {
            Ok(()) => {
                debug!(%operation, "Permission change applied");
                None
            }
            Err(e) => {
                warn!(%operation, error = %e, "Permission change failed");
                Some(FailedItem {
                    email: email.to_string(),
                    operation,
                    error: e.public_message(),
                })
            }
        }
    }

    /// Verify the caller's credential under the operation timeout
    async fn verify(&self, credential: Option<&SecretString>) -> AccessResult<Principal> {
        let credential = credential
            .filter(|c| !c.is_blank())
            .ok_or(AuthError::MissingCredential)?;

        let principal = match tokio::time::timeout(
            self.operation_timeout,
            self.identity.verify(credential),
        )
        .await
        {
            Ok(result) => result.inspect_err(|e| {
                warn!(verifier = self.identity.verifier_type(), error = %e, "Credential rejected")
            })?,
            Err(_) => {
                warn!(verifier = self.identity.verifier_type(), "Credential verification timed out");
                return Err(AuthError::Timeout {
                    timeout_secs: self.operation_timeout.as_secs(),
                }
                .into());
            }
        };

        Ok(principal)
    }

    /// Await a store call, failing with `on_timeout` once the bound elapses
    async fn bounded<T>(
        &self,
        call: impl Future<Output = StoreResult<T>>,
        on_timeout: impl FnOnce() -> StoreError,
    ) -> StoreResult<T> {
        match tokio::time::timeout(self.operation_timeout, call).await {
            Ok(result) => result.inspect_err(|e| {
                warn!(backend = self.store.backend_name(), error = %e, "Policy store call failed")
            }),
            Err(_) => {
                warn!(backend = self.store.backend_name(), "Policy store call timed out");
                Err(on_timeout())
            }
        }
    }

    async fn bounded_drive<T>(&self, call: impl Future<Output = DriveResult<T>>) -> DriveResult<T> {
        tokio::time::timeout(self.operation_timeout, call)
            .await
            .unwrap_or(Err(DriveError::Timeout {
                timeout_secs: self.operation_timeout.as_secs(),
            }))
    }

    fn record_success(&self, operation: Operation, resource_id: &str, started: Instant) {
        if let Some(metrics) = &self.metrics {
            metrics.record_success(operation, resource_id, started.elapsed());
        }
    }

    /// Unverified callers are counted but never attributed to a resource
    fn record_error(
        &self,
        operation: Operation,
        resource_id: &str,
        error: &AccessError,
        started: Instant,
    ) {
        if let Some(metrics) = &self.metrics {
            let resource_id = match error {
                AccessError::Authentication(_) => None,
                _ => Some(resource_id),
            };
            metrics.record_error(operation, resource_id, error.kind(), started.elapsed());
        }
    }
}

/// Turn a rule request into a fresh policy, checking every field
fn validate_rule(request: SetAccessRuleRequest) -> Result<AccessPolicy, ValidationError> {
    if request.resource_id.is_empty() {
        return Err(ValidationError::empty("resourceId"));
    }
    if request.view_limit < 1 {
        return Err(ValidationError::new(
            "viewLimit",
            format!("must be at least 1, got {}", request.view_limit),
        ));
    }
    if let Some(bad) = request
        .allowed_principals
        .iter()
        .find(|email| !is_valid_email(email))
    {
        return Err(ValidationError::bad_email("allowedPrincipals", bad));
    }

    Ok(AccessPolicy::new(
        request.resource_id,
        request.owner_id,
        request.allowed_principals,
        request.view_limit as u64,
        request.expiry_timestamp,
    ))
}

/// Reject bad addresses and e-mails listed with two different roles
fn validate_desired(desired: &[DesiredPermission]) -> Result<(), ValidationError> {
    let mut roles = HashMap::with_capacity(desired.len());
    for want in desired {
        if !is_valid_email(&want.email) {
            return Err(ValidationError::bad_email("desired", &want.email));
        }
        if let Some(previous) = roles.insert(want.email.as_str(), want.role)
            && previous != want.role
        {
            return Err(ValidationError::new(
                "desired",
                format!(
                    "'{}' is listed as both {} and {}",
                    want.email, previous, want.role
                ),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::types::Role;

    fn rule(view_limit: i64, principals: &[&str]) -> SetAccessRuleRequest {
        SetAccessRuleRequest {
            resource_id: "file-1".to_string(),
            owner_id: "uid-1".to_string(),
            allowed_principals: principals.iter().map(|p| p.to_string()).collect(),
            view_limit,
            expiry_timestamp: None,
            credential: None,
        }
    }

    #[test]
    fn test_validate_rule_resets_views() {
        let policy = validate_rule(rule(3, &["a@x.com", "a@x.com"])).unwrap();
        assert_eq!(policy.views_count, 0);
        assert_eq!(policy.view_limit, 3);
        assert_eq!(policy.allowed_principals.len(), 1);
    }

    #[test]
    fn test_validate_rule_rejects_zero_limit() {
        let err = validate_rule(rule(0, &[])).unwrap_err();
        assert_eq!(err.field, "viewLimit");
    }

    #[test]
    fn test_validate_rule_rejects_bad_email() {
        let err = validate_rule(rule(1, &["a@x.com", "not-an-email"])).unwrap_err();
        assert_eq!(err.field, "allowedPrincipals");
        assert!(err.message.contains("not-an-email"));
    }

    #[test]
    fn test_validate_rule_allows_empty_principals() {
        assert!(validate_rule(rule(1, &[])).is_ok());
    }

    #[test]
    fn test_validate_desired_conflicting_roles() {
        let err = validate_desired(&[
            DesiredPermission::new("a@x.com", Role::Viewer),
            DesiredPermission::new("a@x.com", Role::Editor),
        ])
        .unwrap_err();
        assert!(err.message.contains("Viewer"));
    }

    #[test]
    fn test_validate_desired_exact_duplicates_collapse() {
        assert!(
            validate_desired(&[
                DesiredPermission::new("a@x.com", Role::Viewer),
                DesiredPermission::new("a@x.com", Role::Viewer),
            ])
            .is_ok()
        );
    }
}
