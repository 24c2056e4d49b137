//! In-process policy store

use crate::access::AccessPolicy;
use crate::error::{StoreError, StoreResult};
use crate::store::PolicyStore;
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;

/// Policies in a map behind one lock; contents are lost on restart
#[derive(Default)]
pub struct MemoryPolicyStore {
    policies: RwLock<HashMap<String, AccessPolicy>>,
}

impl MemoryPolicyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.policies.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.policies.read().await.is_empty()
    }
}

#[async_trait]
impl PolicyStore for MemoryPolicyStore {
    async fn get(&self, resource_id: &str) -> StoreResult<Option<AccessPolicy>> {
        Ok(self.policies.read().await.get(resource_id).cloned())
    }

    async fn put(&self, mut policy: AccessPolicy) -> StoreResult<()> {
        let mut policies = self.policies.write().await;
        policy.revision = policies
            .get(&policy.resource_id)
            .map_or(0, |current| current.revision)
            + 1;
        policies.insert(policy.resource_id.clone(), policy);
        Ok(())
    }

    async fn increment_views_if_below_limit(
        &self,
        resource_id: &str,
        revision: u64,
        wait: Duration,
    ) -> StoreResult<bool> {
        // No await point once the lock is held
        let mut policies = tokio::time::timeout(wait, self.policies.write())
            .await
            .map_err(|_| StoreError::Timeout {
                timeout_secs: wait.as_secs(),
            })?;
        match policies.get_mut(resource_id) {
            Some(policy)
                if policy.revision == revision && policy.views_count < policy.view_limit =>
            {
                policy.views_count += 1;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(limit: u64) -> AccessPolicy {
        AccessPolicy::new("file-1", "owner-1", ["a@x.com".to_string()], limit, None)
    }

    #[tokio::test]
    async fn test_put_then_get() {
        let store = MemoryPolicyStore::new();
        store.put(policy(2)).await.unwrap();
        let stored = store.get("file-1").await.unwrap().unwrap();
        assert_eq!(stored.view_limit, 2);
        assert_eq!(store.len().await, 1);
    }

    const WAIT: Duration = Duration::from_secs(1);

    #[tokio::test]
    async fn test_increment_stops_at_limit() {
        let store = MemoryPolicyStore::new();
        store.put(policy(2)).await.unwrap();
        for expected in [true, true, false] {
            assert_eq!(
                store
                    .increment_views_if_below_limit("file-1", 1, WAIT)
                    .await
                    .unwrap(),
                expected
            );
        }
        assert_eq!(store.get("file-1").await.unwrap().unwrap().views_count, 2);
    }

    #[tokio::test]
    async fn test_increment_missing_policy() {
        let store = MemoryPolicyStore::new();
        assert!(!store.increment_views_if_below_limit("nope", 1, WAIT).await.unwrap());
    }

    #[tokio::test]
    async fn test_put_bumps_revision() {
        let store = MemoryPolicyStore::new();
        store.put(policy(2)).await.unwrap();
        assert_eq!(store.get("file-1").await.unwrap().unwrap().revision, 1);
        store.put(policy(2)).await.unwrap();
        assert_eq!(store.get("file-1").await.unwrap().unwrap().revision, 2);
    }

    #[tokio::test]
    async fn test_increment_refused_for_replaced_policy() {
        let store = MemoryPolicyStore::new();
        store.put(policy(2)).await.unwrap();
        store.put(policy(2)).await.unwrap();

        assert!(!store.increment_views_if_below_limit("file-1", 1, WAIT).await.unwrap());
        assert_eq!(store.get("file-1").await.unwrap().unwrap().views_count, 0);
        assert!(store.increment_views_if_below_limit("file-1", 2, WAIT).await.unwrap());
    }
}
