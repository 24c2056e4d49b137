//! Request and response shapes of the three access operations
//!
//! Field names are camelCase on the wire. The credential may travel in the
//! body (`credential`, or `idToken` as sent by the web client) or in an
//! `Authorization: Bearer` header, which the HTTP layer copies in.

use crate::access::types::{AccessDecision, DesiredPermission, FailedItem};
use crate::util::SecretString;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetAccessRuleRequest {
    pub resource_id: String,
    pub owner_id: String,
    #[serde(default)]
    pub allowed_principals: Vec<String>,
    pub view_limit: i64,
    #[serde(default)]
    pub expiry_timestamp: Option<i64>,
    #[serde(default, alias = "idToken")]
    pub credential: Option<SecretString>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetAccessRuleResponse {
    pub success: bool,
    pub message: String,
}

impl SetAccessRuleResponse {
    pub fn saved() -> Self {
        Self {
            success: true,
            message: "Access rules saved successfully".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateAccessRequest {
    pub resource_id: String,
    pub user_email: String,
    #[serde(default, alias = "idToken")]
    pub credential: Option<SecretString>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateAccessResponse {
    pub granted: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_view_reference: Option<String>,
    /// Denial tag (`link_expired`, ...) for callers that branch on it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl From<AccessDecision> for ValidateAccessResponse {
    fn from(decision: AccessDecision) -> Self {
        match decision {
            AccessDecision::Granted { view_link } => Self {
                granted: true,
                message: "Access granted.".to_string(),
                resource_view_reference: Some(view_link),
                reason: None,
            },
            AccessDecision::Denied(reason) => Self {
                granted: false,
                message: reason.message().to_string(),
                resource_view_reference: None,
                reason: Some(reason.as_str().to_string()),
            },
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcilePermissionsRequest {
    pub resource_id: String,
    #[serde(default)]
    pub desired: Vec<DesiredPermission>,
    /// RFC 3339 expiry applied to newly created permissions
    #[serde(default, alias = "expirationDate")]
    pub expiration_time: Option<String>,
    #[serde(default, alias = "idToken")]
    pub credential: Option<SecretString>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcilePermissionsResponse {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failed_items: Vec<FailedItem>,
}

impl ReconcilePermissionsResponse {
    pub fn from_outcome(attempted: usize, failed_items: Vec<FailedItem>) -> Self {
        if failed_items.is_empty() {
            Self {
                success: true,
                message: if attempted == 0 {
                    "Permissions already up to date.".to_string()
                } else {
                    "Permissions updated successfully.".to_string()
                },
                failed_items,
            }
        } else {
            Self {
                success: false,
                message: format!(
                    "{} of {} permission changes failed.",
                    failed_items.len(),
                    attempted
                ),
                failed_items,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::types::{DenialReason, PermissionOperation, Role};

    #[test]
    fn test_set_rule_request_accepts_id_token_alias() {
        let request: SetAccessRuleRequest = serde_json::from_str(
            r#"{
                "resourceId": "file-1",
                "ownerId": "uid-1",
                "allowedPrincipals": ["a@x.com"],
                "viewLimit": 2,
                "idToken": "tok"
            }"#,
        )
        .unwrap();
        assert_eq!(request.credential.unwrap().expose_secret(), "tok");
        assert_eq!(request.expiry_timestamp, None);
    }

    #[test]
    fn test_reconcile_request_parses_roles() {
        let request: ReconcilePermissionsRequest = serde_json::from_str(
            r#"{"resourceId": "f", "desired": [{"email": "a@x.com", "role": "Editor"}]}"#,
        )
        .unwrap();
        assert_eq!(request.desired[0].role, Role::Editor);
        assert!(request.credential.is_none());
    }

    #[test]
    fn test_denied_response_has_no_reference() {
        let response = ValidateAccessResponse::from(AccessDecision::Denied(
            DenialReason::ViewLimitExceeded,
        ));
        assert!(!response.granted);
        assert_eq!(response.reason.as_deref(), Some("view_limit_exceeded"));
        let json = serde_json::to_value(&response).unwrap();
        assert!(json.get("resourceViewReference").is_none());
    }

    #[test]
    fn test_partial_failure_response() {
        let response = ReconcilePermissionsResponse::from_outcome(
            3,
            vec![FailedItem {
                email: "b@x.com".into(),
                operation: PermissionOperation::Create,
                error: "the permission service is rate limiting".into(),
            }],
        );
        assert!(!response.success);
        assert_eq!(response.message, "1 of 3 permission changes failed.");
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["failedItems"][0]["operation"], "create");
    }
}
