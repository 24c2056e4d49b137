//! Access metrics
//!
//! Counts grants, denials per reason and failures for each resource, and
//! keeps the most recent decisions for the `/api/metrics` endpoint.

pub mod collector;

pub use collector::{AccessMetrics, DecisionRecord, MetricsSnapshot, Operation, ResourceStats};
