//! Access-rule enforcement
//!
//! Policies, the pure permission diff, and the engine that ties identity,
//! storage and the external permission API together.

pub mod clock;
pub mod engine;
pub mod reconcile;
pub mod requests;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use engine::AccessRuleEngine;
pub use reconcile::reconcile;
pub use requests::{
    ReconcilePermissionsRequest, ReconcilePermissionsResponse, SetAccessRuleRequest,
    SetAccessRuleResponse, ValidateAccessRequest, ValidateAccessResponse,
};
pub use types::{
    AccessDecision, AccessPolicy, DenialReason, DesiredPermission, FailedItem, ObservedPermission,
    ObservedRole, PermissionOperation, PermissionPlan, PermissionRemoval, PermissionUpdate, Role,
    is_valid_email,
};
