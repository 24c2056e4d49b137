//! Permission API seam
//!
//! The engine mutates external permissions only through this trait, so the
//! reconciliation driver can run against Drive or against a test double.

use crate::access::{DesiredPermission, ObservedPermission, Role};
use crate::error::DriveResult;
// async_trait required for dyn-compatibility with Arc<dyn PermissionApi>
use async_trait::async_trait;

#[async_trait]
pub trait PermissionApi: Send + Sync {
    /// Current e-mail addressed permissions of a resource
    async fn list_permissions(&self, resource_id: &str) -> DriveResult<Vec<ObservedPermission>>;

    async fn create_permission(
        &self,
        resource_id: &str,
        permission: &DesiredPermission,
        expiration_time: Option<&str>,
    ) -> DriveResult<()>;

    async fn update_permission(
        &self,
        resource_id: &str,
        permission_id: &str,
        role: Role,
    ) -> DriveResult<()>;

    async fn delete_permission(&self, resource_id: &str, permission_id: &str) -> DriveResult<()>;
}
