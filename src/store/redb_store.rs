//! Embedded policy store backed by redb
//!
//! Policies are stored as JSON values keyed by resource id. redb admits one
//! write transaction at a time, so the read-check-write of the conditional
//! increment runs inside a single write transaction and cannot interleave.
//!
//! The blocking task is always awaited to completion. A timeout is only
//! honoured before the transaction touches anything, never after.

use crate::access::AccessPolicy;
use crate::error::{StoreError, StoreResult};
use crate::store::PolicyStore;
use async_trait::async_trait;
use redb::{Database, ReadableTable, TableDefinition};
use std::fmt::Display;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

const POLICIES: TableDefinition<&str, &[u8]> = TableDefinition::new("access_policies");

pub struct RedbPolicyStore {
    db: Arc<Database>,
}

impl RedbPolicyStore {
    /// Open or create a database at the given path.
    pub fn open(path: &Path) -> StoreResult<Self> {
        let db = Database::create(path).map_err(backend)?;

        // Create the table up front so readers never see it missing
        let write_txn = db.begin_write().map_err(backend)?;
        {
            let _table = write_txn.open_table(POLICIES).map_err(backend)?;
        }
        write_txn.commit().map_err(backend)?;

        info!(path = %path.display(), "Opened redb policy store");
        Ok(Self { db: Arc::new(db) })
    }

    /// redb is blocking; keep it off the async workers
    async fn run<T, F>(&self, op: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Database) -> StoreResult<T> + Send + 'static,
    {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || op(&db))
            .await
            .map_err(backend)?
    }
}

fn backend(e: impl Display) -> StoreError {
    StoreError::Backend(e.to_string())
}

fn decode(resource_id: &str, bytes: &[u8]) -> StoreResult<AccessPolicy> {
    serde_json::from_slice(bytes).map_err(|e| StoreError::Corrupt {
        resource_id: resource_id.to_string(),
        reason: e.to_string(),
    })
}

#[async_trait]
impl PolicyStore for RedbPolicyStore {
    async fn get(&self, resource_id: &str) -> StoreResult<Option<AccessPolicy>> {
        let key = resource_id.to_string();
        self.run(move |db| {
            let read_txn = db.begin_read().map_err(backend)?;
            let table = read_txn.open_table(POLICIES).map_err(backend)?;
            let bytes = table
                .get(key.as_str())
                .map_err(backend)?
                .map(|value| value.value().to_vec());
            bytes.map(|b| decode(&key, &b)).transpose()
        })
        .await
    }

    async fn put(&self, mut policy: AccessPolicy) -> StoreResult<()> {
        self.run(move |db| {
            let write_txn = db.begin_write().map_err(backend)?;
            {
                let mut table = write_txn.open_table(POLICIES).map_err(backend)?;
                let current = table
                    .get(policy.resource_id.as_str())
                    .map_err(backend)?
                    .map(|value| value.value().to_vec());
                // An unreadable predecessor still gets replaced
                let previous = current
                    .and_then(|bytes| decode(&policy.resource_id, &bytes).ok())
                    .map_or(0, |p| p.revision);
                policy.revision = previous + 1;

                let bytes = serde_json::to_vec(&policy).map_err(backend)?;
                table
                    .insert(policy.resource_id.as_str(), bytes.as_slice())
                    .map_err(backend)?;
            }
            write_txn.commit().map_err(backend)
        })
        .await
    }

    async fn increment_views_if_below_limit(
        &self,
        resource_id: &str,
        revision: u64,
        wait: Duration,
    ) -> StoreResult<bool> {
        let key = resource_id.to_string();
        let deadline = Instant::now() + wait;
        self.run(move |db| {
            let write_txn = db.begin_write().map_err(backend)?;
            if Instant::now() >= deadline {
                debug!(resource_id = %key, "Write transaction arrived after the deadline");
                write_txn.abort().map_err(backend)?;
                return Err(StoreError::Timeout {
                    timeout_secs: wait.as_secs(),
                });
            }

            let incremented = {
                let mut table = write_txn.open_table(POLICIES).map_err(backend)?;
                let current = table
                    .get(key.as_str())
                    .map_err(backend)?
                    .map(|value| value.value().to_vec());

                match current {
                    Some(bytes) => {
                        let mut policy = decode(&key, &bytes)?;
                        if policy.revision == revision && policy.views_count < policy.view_limit {
                            policy.views_count += 1;
                            let updated = serde_json::to_vec(&policy).map_err(backend)?;
                            table
                                .insert(key.as_str(), updated.as_slice())
                                .map_err(backend)?;
                            true
                        } else {
                            false
                        }
                    }
                    None => false,
                }
            };

            if incremented {
                write_txn.commit().map_err(backend)?;
            } else {
                write_txn.abort().map_err(backend)?;
            }
            Ok(incremented)
        })
        .await
    }

    fn backend_name(&self) -> &'static str {
        "redb"
    }
}
