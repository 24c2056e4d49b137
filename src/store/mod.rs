//! Policy store
//!
//! Durable keyed storage for access policies. The engine never locks on its
//! own: atomicity of the conditional view increment is the store's job.

pub mod memory;
pub mod redb_store;

pub use memory::MemoryPolicyStore;
pub use redb_store::RedbPolicyStore;

use crate::access::AccessPolicy;
use crate::config::{StoreBackend, StoreConfig};
use crate::error::{StoreError, StoreResult};
// async_trait required for dyn-compatibility with Arc<dyn PolicyStore>
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

#[async_trait]
pub trait PolicyStore: Send + Sync {
    /// Consistent snapshot of the policy, if any
    async fn get(&self, resource_id: &str) -> StoreResult<Option<AccessPolicy>>;

    /// Replace the policy for `policy.resource_id` wholesale.
    ///
    /// The stored copy gets the next revision, whatever `policy.revision` says.
    async fn put(&self, policy: AccessPolicy) -> StoreResult<()>;

    /// Add one view if the stored policy is still at `revision` and
    /// `views_count < view_limit`, as a single atomic step.
    ///
    /// Returns whether the increment happened; `false` for a missing or
    /// replaced policy. Only the wait to begin the step is bounded by `wait`;
    /// once the step has begun it runs to completion and its result is
    /// returned, so a view is never consumed behind a timeout error.
    async fn increment_views_if_below_limit(
        &self,
        resource_id: &str,
        revision: u64,
        wait: Duration,
    ) -> StoreResult<bool>;

    /// Short name for logs
    fn backend_name(&self) -> &'static str;
}

/// Open the configured store backend
pub fn open_policy_store(config: &StoreConfig) -> StoreResult<Arc<dyn PolicyStore>> {
    match config.backend {
        StoreBackend::Memory => Ok(Arc::new(MemoryPolicyStore::new())),
        StoreBackend::Redb => {
            let path = config.path.as_deref().ok_or(StoreError::NotInitialized)?;
            let expanded = shellexpand::tilde(path);
            Ok(Arc::new(RedbPolicyStore::open(Path::new(expanded.as_ref()))?))
        }
    }
}
