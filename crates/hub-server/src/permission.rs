// SPDX-License-Identifier: MIT OR Apache-2.0
//! Legacy session-auth permission bridge.
//!
//! Hub creation and lookup bypass the capability verifier: bootstrapping a
//! hub cannot be protected by a capability rooted in that hub. These routes
//! consult a named-permission authority keyed by the externally
//! authenticated account instead.

use hub_error::{HubError, HubResult};
use std::collections::{BTreeMap, BTreeSet};

/// Permission to create a hub configuration.
pub const PERM_HUB_CREATE: &str = "hub-config:create";
/// Permission to read hub configurations.
pub const PERM_HUB_READ: &str = "hub-config:read";
/// Permission to update a hub configuration.
pub const PERM_HUB_UPDATE: &str = "hub-config:update";

/// A named-permission authority: `(actor, permission, resources)` in,
/// allow or deny out.
pub trait PermissionAuthority: Send + Sync {
    /// Check whether `actor` holds `permission` over `resources`.
    fn check(&self, actor: &str, permission: &str, resources: &[&str]) -> HubResult<()>;
}

/// In-memory authority mapping accounts to granted permission names.
///
/// Resource sets are accepted for interface compatibility with the external
/// authority but not consulted: grants are account-wide.
#[derive(Debug, Clone, Default)]
pub struct AccountPermissions {
    grants: BTreeMap<String, BTreeSet<String>>,
}

impl AccountPermissions {
    /// Build from `account → permissions` pairs (the config file shape).
    #[must_use]
    pub fn from_grants(grants: &BTreeMap<String, Vec<String>>) -> Self {
        Self {
            grants: grants
                .iter()
                .map(|(account, perms)| {
                    (account.clone(), perms.iter().cloned().collect())
                })
                .collect(),
        }
    }

    /// Grant one permission to an account.
    pub fn grant(&mut self, account: &str, permission: &str) {
        self.grants
            .entry(account.to_owned())
            .or_default()
            .insert(permission.to_owned());
    }
}

impl PermissionAuthority for AccountPermissions {
    fn check(&self, actor: &str, permission: &str, _resources: &[&str]) -> HubResult<()> {
        let allowed = self
            .grants
            .get(actor)
            .is_some_and(|perms| perms.contains(permission));
        if allowed {
            Ok(())
        } else {
            Err(HubError::permission_denied(format!(
                "account lacks permission {permission}"
            )))
        }
    }
}
