//! Permission reconciliation
//!
//! Computes the create/update/remove lists that move a resource's observed
//! permissions to a desired set. Matching is by exact e-mail equality.

use crate::access::types::{
    DesiredPermission, ObservedPermission, ObservedRole, PermissionPlan, PermissionRemoval,
    PermissionUpdate,
};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Diff `desired` against `observed` for one resource.
///
/// - desired entries with no observed entry are created
/// - desired entries whose observed role differs are updated in place
/// - observed entries whose e-mail is not desired are removed
///
/// The owner permission is never part of any list; a desired entry naming
/// the owner is ignored. Output follows input order.
pub fn reconcile(
    resource_id: &str,
    desired: &[DesiredPermission],
    observed: &[ObservedPermission],
) -> PermissionPlan {
    let mut by_email: HashMap<&str, &ObservedPermission> = HashMap::new();
    for permission in observed {
        by_email.entry(permission.email.as_str()).or_insert(permission);
    }

    let mut plan = PermissionPlan::default();
    let mut seen: HashSet<&str> = HashSet::new();

    for want in desired {
        if !seen.insert(want.email.as_str()) {
            continue;
        }

        match by_email.get(want.email.as_str()) {
            None => plan.to_create.push(want.clone()),
            Some(current) => match &current.role {
                ObservedRole::Owner => {}
                ObservedRole::Granted(role) if *role == want.role => {}
                ObservedRole::Granted(_) | ObservedRole::Other(_) => {
                    plan.to_update.push(PermissionUpdate {
                        email: want.email.clone(),
                        role: want.role,
                        permission_id: current.permission_id.clone(),
                    })
                }
            },
        }
    }

    for current in observed {
        if current.role.is_owner() || seen.contains(current.email.as_str()) {
            continue;
        }
        plan.to_remove.push(PermissionRemoval {
            email: current.email.clone(),
            permission_id: current.permission_id.clone(),
        });
    }

    debug!(
        resource_id,
        create = plan.to_create.len(),
        update = plan.to_update.len(),
        remove = plan.to_remove.len(),
        "Computed permission plan"
    );

    plan
}
