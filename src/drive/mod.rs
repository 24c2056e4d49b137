//! Google Drive permission API
//!
//! Typed client for the Drive v3 `permissions` endpoints.

pub mod api;
pub mod client;
pub mod types;

pub use api::PermissionApi;
pub use client::DriveClient;
pub use types::*;
