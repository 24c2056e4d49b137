//! accessguard
//!
//! Secure, time-boxed links to files in Google Drive. An owner records an
//! access policy for a file; recipients redeem it subject to expiry,
//! allow-list and view-count limits.
//!
//! ## Operations
//!
//! - **SetAccessRule** - the verified owner replaces a file's policy
//! - **ValidateAccess** - a verified recipient consumes one view, atomically
//! - **ReconcilePermissions** - move a file's Drive permissions to a desired set
//!
//! ## Evaluation order
//!
//! ```text
//! rules exist → not expired → e-mail allowed → views left → consume one view
//! ```
//!
//! ## Example Configuration
//!
//! ```toml
//! [identity]
//! provider = "google"
//! audience = "1234.apps.googleusercontent.com"
//!
//! [store]
//! backend = "redb"
//! path = "~/.local/share/accessguard/policies.redb"
//!
//! [drive]
//! # token from GOOGLE_DRIVE_TOKEN env var
//! send_notification_email = false
//! ```

pub mod access;
pub mod auth;
pub mod config;
pub mod drive;
pub mod error;
pub mod identity;
pub mod metrics;
pub mod server;
pub mod store;
pub mod util;

// Re-export main types
pub use access::AccessRuleEngine;
pub use config::{AppConfig, load_config};
pub use error::{AccessError, AppError, Result};
pub use metrics::AccessMetrics;
