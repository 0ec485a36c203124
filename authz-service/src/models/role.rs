use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Scope at which a role operates. Global and multi-tenant scopes grant
/// cross-tenant delegation authority; the rest are bound to one tenant or a
/// sub-unit within it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleScope {
    Global,
    MultiTenant,
    SingleTenant,
    SubUnit,
    Support,
    Community,
}

impl RoleScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoleScope::Global => "global",
            RoleScope::MultiTenant => "multi_tenant",
            RoleScope::SingleTenant => "single_tenant",
            RoleScope::SubUnit => "sub_unit",
            RoleScope::Support => "support",
            RoleScope::Community => "community",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "global" => Some(RoleScope::Global),
            "multi_tenant" => Some(RoleScope::MultiTenant),
            "single_tenant" => Some(RoleScope::SingleTenant),
            "sub_unit" => Some(RoleScope::SubUnit),
            "support" => Some(RoleScope::Support),
            "community" => Some(RoleScope::Community),
            _ => None,
        }
    }

    /// Whether holders of this scope may exercise delegation authority in
    /// tenants where they hold no assignment of their own.
    pub fn is_cross_tenant(&self) -> bool {
        matches!(self, RoleScope::Global | RoleScope::MultiTenant)
    }
}

/// Who can see holders of a role in the member directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DirectoryVisibility {
    Everyone,
    Leaders,
    Admins,
    Hidden,
}

impl DirectoryVisibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            DirectoryVisibility::Everyone => "everyone",
            DirectoryVisibility::Leaders => "leaders",
            DirectoryVisibility::Admins => "admins",
            DirectoryVisibility::Hidden => "hidden",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "everyone" => Some(DirectoryVisibility::Everyone),
            "leaders" => Some(DirectoryVisibility::Leaders),
            "admins" => Some(DirectoryVisibility::Admins),
            "hidden" => Some(DirectoryVisibility::Hidden),
            _ => None,
        }
    }
}

/// A role definition from the catalog. `delegable_roles` is the complete
/// authority for who may assign what; `level` is informational ordering for
/// display and never consulted during delegation checks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Role {
    pub name: String,
    pub display_name: String,
    pub description: String,
    pub level: i32,
    pub scope: RoleScope,
    pub permissions: HashSet<String>,
    pub delegable_roles: HashSet<String>,
    pub toggleable_permissions: HashSet<String>,
    pub directory_visibility: DirectoryVisibility,
}

impl Role {
    pub fn grants(&self, permission: &str) -> bool {
        self.permissions.contains(permission)
    }

    pub fn can_delegate(&self, role_name: &str) -> bool {
        self.delegable_roles.contains(role_name)
    }
}

/// A permission definition from the catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Permission {
    pub name: String,
    pub category: String,
    pub description: String,
}

/// Flattened view of a user's effective role within a tenant, combining the
/// catalog definition with the per-assignment overlays.
#[derive(Debug, Clone, Serialize)]
pub struct UserRoleView {
    pub role_name: String,
    pub display_name: String,
    pub level: i32,
    pub scope: RoleScope,
    pub permissions: Vec<String>,
    pub additional_permissions: Vec<String>,
    pub restricted_permissions: Vec<String>,
    pub title: Option<String>,
    pub department: Option<String>,
    pub assigned_utc: DateTime<Utc>,
    pub expires_utc: Option<DateTime<Utc>>,
}
