//! Metrics collection for access decisions
//!
//! Thread-safe counters for validations, rule writes and reconciliations,
//! plus a bounded list of recent decisions. The per-resource table is capped
//! too; past the cap the least recently touched resource is dropped.

use crate::access::DenialReason;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant, SystemTime};

/// Which engine operation produced a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    SetAccessRule,
    ValidateAccess,
    ReconcilePermissions,
}

/// Access metrics collector
pub struct AccessMetrics {
    start_time: Instant,
    start_system_time: SystemTime,
    total_requests: AtomicU64,
    total_grants: AtomicU64,
    total_denials: AtomicU64,
    total_errors: AtomicU64,
    /// Single lock for all collections
    data: RwLock<MetricsData>,
    max_recent: usize,
    max_resources: usize,
}

#[derive(Default)]
struct ResourceStatsInner {
    grants: u64,
    denials: HashMap<DenialReason, u64>,
    errors: u64,
    rule_writes: u64,
    last_accessed: Option<SystemTime>,
    /// Value of `MetricsData::tick` at the last touch
    last_tick: u64,
}

#[derive(Default)]
struct MetricsData {
    resources: HashMap<String, ResourceStatsInner>,
    recent: VecDeque<DecisionRecord>,
    tick: u64,
}

/// Record of a recent operation
#[derive(Clone, Serialize)]
pub struct DecisionRecord {
    pub operation: Operation,
    /// Absent for unverified callers and in redacted snapshots
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,
    /// `granted`, a denial tag, `ok`, or an error tag
    pub outcome: String,
    pub duration_ms: u64,
    pub timestamp: u64,
}

/// Serializable per-resource statistics
#[derive(Clone, Serialize)]
pub struct ResourceStats {
    pub resource_id: String,
    pub grants: u64,
    pub denials: BTreeMap<String, u64>,
    pub errors: u64,
    pub rule_writes: u64,
    pub last_accessed: Option<u64>,
}

/// Overall metrics snapshot for the API
#[derive(Clone, Serialize)]
pub struct MetricsSnapshot {
    pub uptime_secs: u64,
    pub start_time: u64,
    pub total_requests: u64,
    pub total_grants: u64,
    pub total_denials: u64,
    pub total_errors: u64,
    pub resources: Vec<ResourceStats>,
    pub recent: Vec<DecisionRecord>,
}

impl MetricsSnapshot {
    /// Drop everything that names a resource
    pub fn without_resource_ids(mut self) -> Self {
        self.resources.clear();
        for record in &mut self.recent {
            record.resource_id = None;
        }
        self
    }
}

/// Resources tracked when no limit is given
pub const DEFAULT_MAX_RESOURCES: usize = 1000;

fn unix_secs(t: SystemTime) -> u64 {
    t.duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

impl AccessMetrics {
    pub fn new() -> Self {
        Self::with_capacity(100)
    }

    pub fn with_capacity(max_recent: usize) -> Self {
        Self::with_limits(max_recent, DEFAULT_MAX_RESOURCES)
    }

    pub fn with_limits(max_recent: usize, max_resources: usize) -> Self {
        Self {
            start_time: Instant::now(),
            start_system_time: SystemTime::now(),
            total_requests: AtomicU64::new(0),
            total_grants: AtomicU64::new(0),
            total_denials: AtomicU64::new(0),
            total_errors: AtomicU64::new(0),
            data: RwLock::new(MetricsData {
                resources: HashMap::new(),
                recent: VecDeque::with_capacity(max_recent),
                tick: 0,
            }),
            max_recent,
            max_resources: max_resources.max(1),
        }
    }

    // Poisoned locks are recovered; metrics are not worth a panic

    fn write_data(&self) -> RwLockWriteGuard<'_, MetricsData> {
        self.data.write().unwrap_or_else(|poisoned| {
            tracing::warn!("metrics data lock poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn read_data(&self) -> RwLockReadGuard<'_, MetricsData> {
        self.data.read().unwrap_or_else(|poisoned| {
            tracing::warn!("metrics data lock poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Record a ValidateAccess outcome; `None` means granted
    pub fn record_validation(
        &self,
        resource_id: &str,
        denial: Option<DenialReason>,
        duration: Duration,
    ) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        match denial {
            None => self.total_grants.fetch_add(1, Ordering::Relaxed),
            Some(_) => self.total_denials.fetch_add(1, Ordering::Relaxed),
        };

        let outcome = denial.map_or("granted", |r| r.as_str());
        let mut data = self.write_data();
        let entry = self.touch(&mut data, resource_id);
        match denial {
            None => entry.grants += 1,
            Some(reason) => *entry.denials.entry(reason).or_default() += 1,
        }
        self.push_recent(
            &mut data,
            Operation::ValidateAccess,
            Some(resource_id),
            outcome,
            duration,
        );
    }

    /// Record a successful SetAccessRule or ReconcilePermissions call
    pub fn record_success(&self, operation: Operation, resource_id: &str, duration: Duration) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);

        let mut data = self.write_data();
        let entry = self.touch(&mut data, resource_id);
        if operation == Operation::SetAccessRule {
            entry.rule_writes += 1;
        }
        self.push_recent(&mut data, operation, Some(resource_id), "ok", duration);
    }

    /// Record a failed operation by its error tag.
    ///
    /// Without a resource id only the totals and the recent list change.
    pub fn record_error(
        &self,
        operation: Operation,
        resource_id: Option<&str>,
        kind: &str,
        duration: Duration,
    ) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        self.total_errors.fetch_add(1, Ordering::Relaxed);

        let mut data = self.write_data();
        if let Some(resource_id) = resource_id {
            self.touch(&mut data, resource_id).errors += 1;
        }
        self.push_recent(&mut data, operation, resource_id, kind, duration);
    }

    /// Stats entry for a resource, marked as most recently used
    fn touch<'a>(
        &self,
        data: &'a mut MetricsData,
        resource_id: &str,
    ) -> &'a mut ResourceStatsInner {
        data.tick += 1;
        let tick = data.tick;

        if !data.resources.contains_key(resource_id)
            && data.resources.len() >= self.max_resources
        {
            let oldest = data
                .resources
                .iter()
                .min_by_key(|(_, stats)| stats.last_tick)
                .map(|(id, _)| id.clone());
            if let Some(oldest) = oldest {
                data.resources.remove(&oldest);
            }
        }

        let entry = data.resources.entry(resource_id.to_string()).or_default();
        entry.last_tick = tick;
        entry.last_accessed = Some(SystemTime::now());
        entry
    }

    fn push_recent(
        &self,
        data: &mut MetricsData,
        operation: Operation,
        resource_id: Option<&str>,
        outcome: &str,
        duration: Duration,
    ) {
        if data.recent.len() >= self.max_recent {
            data.recent.pop_front();
        }
        data.recent.push_back(DecisionRecord {
            operation,
            resource_id: resource_id.map(str::to_string),
            outcome: outcome.to_string(),
            duration_ms: duration.as_millis() as u64,
            timestamp: unix_secs(SystemTime::now()),
        });
    }

    pub fn total_requests(&self) -> u64 {
        self.total_requests.load(Ordering::Relaxed)
    }

    pub fn total_grants(&self) -> u64 {
        self.total_grants.load(Ordering::Relaxed)
    }

    pub fn total_denials(&self) -> u64 {
        self.total_denials.load(Ordering::Relaxed)
    }

    pub fn total_errors(&self) -> u64 {
        self.total_errors.load(Ordering::Relaxed)
    }

    /// Get a snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        let data = self.read_data();

        let mut resources: Vec<ResourceStats> = data
            .resources
            .iter()
            .map(|(id, s)| ResourceStats {
                resource_id: id.clone(),
                grants: s.grants,
                denials: s
                    .denials
                    .iter()
                    .map(|(reason, count)| (reason.as_str().to_string(), *count))
                    .collect(),
                errors: s.errors,
                rule_writes: s.rule_writes,
                last_accessed: s.last_accessed.map(unix_secs),
            })
            .collect();
        resources.sort_unstable_by(|a, b| {
            b.grants
                .cmp(&a.grants)
                .then_with(|| a.resource_id.cmp(&b.resource_id))
        });

        MetricsSnapshot {
            uptime_secs: self.start_time.elapsed().as_secs(),
            start_time: unix_secs(self.start_system_time),
            total_requests: self.total_requests(),
            total_grants: self.total_grants(),
            total_denials: self.total_denials(),
            total_errors: self.total_errors(),
            resources,
            recent: data.recent.iter().rev().cloned().collect(),
        }
    }
}

impl Default for AccessMetrics {
    fn default() -> Self {
        Self::new()
    }
}
