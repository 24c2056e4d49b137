//! Drive v3 permission resource types

use crate::access::{ObservedPermission, ObservedRole};
use serde::{Deserialize, Serialize};

/// Permission resource as returned by `permissions.list`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrivePermission {
    pub id: String,
    #[serde(default)]
    pub email_address: Option<String>,
    pub role: String,
    /// `user`, `group`, `domain` or `anyone`
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
}

impl DrivePermission {
    /// Only grants addressed to an e-mail take part in reconciliation
    pub fn into_observed(self) -> Option<ObservedPermission> {
        let email = self.email_address.filter(|e| !e.is_empty())?;
        Some(ObservedPermission::new(
            self.id,
            email,
            ObservedRole::from_drive_role(&self.role),
        ))
    }
}

/// One page of `permissions.list`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionList {
    #[serde(default)]
    pub permissions: Vec<DrivePermission>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

/// Body of `permissions.create`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePermissionBody<'a> {
    pub role: &'a str,
    #[serde(rename = "type")]
    pub kind: &'a str,
    pub email_address: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiration_time: Option<&'a str>,
}

/// Body of `permissions.update`
#[derive(Debug, Clone, Serialize)]
pub struct UpdatePermissionBody<'a> {
    pub role: &'a str,
}
