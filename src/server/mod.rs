//! HTTP surface
//!
//! Exposes the access rule engine as a small JSON API.

pub mod http;
pub mod routes;

pub use http::{DEFAULT_HTTP_PORT, HttpConfig, run_server, run_server_blocking};
pub use routes::{ApiError, AppState, router};
