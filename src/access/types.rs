//! Access rule types
//!
//! The persisted [`AccessPolicy`] record and the ephemeral permission types
//! used during reconciliation.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::LazyLock;

static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is a valid regex")
});

/// Syntactic e-mail check; no case or alias normalization is applied anywhere
pub fn is_valid_email(email: &str) -> bool {
    EMAIL_PATTERN.is_match(email)
}

/// Access policy for one protected resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessPolicy {
    pub resource_id: String,
    pub owner_id: String,
    pub allowed_principals: BTreeSet<String>,
    pub view_limit: u64,
    pub views_count: u64,
    /// Unix milliseconds; `None` never expires
    #[serde(default)]
    pub expiry_timestamp: Option<i64>,
    /// Bumped by the store on every replace; a view is only consumed against
    /// the revision it was evaluated on
    #[serde(default)]
    pub revision: u64,
}

impl AccessPolicy {
    /// A fresh policy with no views consumed
    pub fn new(
        resource_id: impl Into<String>,
        owner_id: impl Into<String>,
        allowed_principals: impl IntoIterator<Item = String>,
        view_limit: u64,
        expiry_timestamp: Option<i64>,
    ) -> Self {
        Self {
            resource_id: resource_id.into(),
            owner_id: owner_id.into(),
            allowed_principals: allowed_principals.into_iter().collect(),
            view_limit,
            views_count: 0,
            expiry_timestamp,
            revision: 0,
        }
    }

    pub fn is_expired_at(&self, now_millis: i64) -> bool {
        self.expiry_timestamp
            .is_some_and(|expiry| now_millis > expiry)
    }

    /// Exact, case-sensitive membership test
    pub fn allows(&self, email: &str) -> bool {
        self.allowed_principals.contains(email)
    }

    pub fn remaining_views(&self) -> u64 {
        self.view_limit.saturating_sub(self.views_count)
    }

    /// Evaluate the expiry, allow-list and view-limit checks, in that order.
    ///
    /// Returns the first failing check, or `None` when a view may be consumed.
    pub fn evaluate(&self, email: &str, now_millis: i64) -> Option<DenialReason> {
        if self.is_expired_at(now_millis) {
            return Some(DenialReason::LinkExpired);
        }
        if !self.allows(email) {
            return Some(DenialReason::NotAuthorized);
        }
        if self.views_count >= self.view_limit {
            return Some(DenialReason::ViewLimitExceeded);
        }
        None
    }
}

/// Why a validation was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialReason {
    RulesNotFound,
    LinkExpired,
    NotAuthorized,
    ViewLimitExceeded,
}

impl DenialReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DenialReason::RulesNotFound => "rules_not_found",
            DenialReason::LinkExpired => "link_expired",
            DenialReason::NotAuthorized => "not_authorized",
            DenialReason::ViewLimitExceeded => "view_limit_exceeded",
        }
    }

    /// Caller-visible message
    pub fn message(&self) -> &'static str {
        match self {
            DenialReason::RulesNotFound => "Access rules not found for this file.",
            DenialReason::LinkExpired => "This secure link has expired.",
            DenialReason::NotAuthorized => "You are not authorized to view this file.",
            DenialReason::ViewLimitExceeded => "The view limit for this link has been exceeded.",
        }
    }

    pub fn all() -> &'static [DenialReason] {
        &[
            DenialReason::RulesNotFound,
            DenialReason::LinkExpired,
            DenialReason::NotAuthorized,
            DenialReason::ViewLimitExceeded,
        ]
    }
}

impl fmt::Display for DenialReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome of a ValidateAccess evaluation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessDecision {
    /// One view was consumed
    Granted { view_link: String },
    /// Refused; nothing was consumed
    Denied(DenialReason),
}

impl AccessDecision {
    pub fn is_granted(&self) -> bool {
        matches!(self, AccessDecision::Granted { .. })
    }

    pub fn is_denied(&self) -> bool {
        matches!(self, AccessDecision::Denied(_))
    }

    pub fn denial_reason(&self) -> Option<DenialReason> {
        match self {
            AccessDecision::Granted { .. } => None,
            AccessDecision::Denied(reason) => Some(*reason),
        }
    }
}

/// Capability granted on the external resource, ordered by strength
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Role {
    Viewer,
    Commenter,
    Editor,
}

impl Role {
    /// Drive v3 role name
    pub fn as_drive_role(&self) -> &'static str {
        match self {
            Role::Viewer => "reader",
            Role::Commenter => "commenter",
            Role::Editor => "writer",
        }
    }

    /// Parse a Drive role name; `viewer` is accepted as a legacy spelling
    pub fn from_drive_role(role: &str) -> Option<Self> {
        match role {
            "reader" | "viewer" => Some(Role::Viewer),
            "commenter" => Some(Role::Commenter),
            "writer" => Some(Role::Editor),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::Viewer => "Viewer",
            Role::Commenter => "Commenter",
            Role::Editor => "Editor",
        };
        f.write_str(name)
    }
}

/// Role found on an existing permission
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObservedRole {
    /// The resource owner; never modified or removed
    Owner,
    Granted(Role),
    /// A role outside the managed vocabulary (e.g. `organizer`)
    Other(String),
}

impl ObservedRole {
    pub fn from_drive_role(role: &str) -> Self {
        if role == "owner" {
            return ObservedRole::Owner;
        }
        match Role::from_drive_role(role) {
            Some(role) => ObservedRole::Granted(role),
            None => ObservedRole::Other(role.to_string()),
        }
    }

    pub fn is_owner(&self) -> bool {
        matches!(self, ObservedRole::Owner)
    }
}

/// A permission the caller wants the resource to have
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesiredPermission {
    pub email: String,
    pub role: Role,
}

impl DesiredPermission {
    pub fn new(email: impl Into<String>, role: Role) -> Self {
        Self {
            email: email.into(),
            role,
        }
    }
}

/// A permission currently present on the resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservedPermission {
    /// Opaque id used to mutate or delete the permission
    pub permission_id: String,
    pub email: String,
    pub role: ObservedRole,
}

impl ObservedPermission {
    pub fn new(permission_id: impl Into<String>, email: impl Into<String>, role: ObservedRole) -> Self {
        Self {
            permission_id: permission_id.into(),
            email: email.into(),
            role,
        }
    }
}

/// Role change on an existing permission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionUpdate {
    pub email: String,
    pub role: Role,
    pub permission_id: String,
}

/// Existing permission to delete
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionRemoval {
    pub email: String,
    pub permission_id: String,
}

/// The three lists that move the observed permissions to the desired state
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PermissionPlan {
    pub to_create: Vec<DesiredPermission>,
    pub to_update: Vec<PermissionUpdate>,
    pub to_remove: Vec<PermissionRemoval>,
}

impl PermissionPlan {
    pub fn is_empty(&self) -> bool {
        self.to_create.is_empty() && self.to_update.is_empty() && self.to_remove.is_empty()
    }

    pub fn len(&self) -> usize {
        self.to_create.len() + self.to_update.len() + self.to_remove.len()
    }
}

/// Kind of permission mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionOperation {
    Create,
    Update,
    Remove,
}

impl fmt::Display for PermissionOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PermissionOperation::Create => "create",
            PermissionOperation::Update => "update",
            PermissionOperation::Remove => "remove",
        };
        f.write_str(name)
    }
}

/// One plan item that the permission API refused
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedItem {
    pub email: String,
    pub operation: PermissionOperation,
    pub error: String,
}
