//! Built-in role and permission catalog for the church network platform.
//! Loaded into a [`super::RoleRegistry`] at startup and seeded into the
//! database from there.

use std::collections::HashSet;

use crate::models::{DirectoryVisibility, Permission, Role, RoleScope};

fn set(items: &[&str]) -> HashSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn permission(name: &str, category: &str, description: &str) -> Permission {
    Permission {
        name: name.to_string(),
        category: category.to_string(),
        description: description.to_string(),
    }
}

pub fn builtin_permissions() -> Vec<Permission> {
    vec![
        permission("members.view", "members", "View member profiles"),
        permission("members.manage", "members", "Create, edit and archive member records"),
        permission("events.create", "events", "Create events"),
        permission("events.manage", "events", "Edit and cancel any event"),
        permission("campuses.manage", "facilities", "Manage campuses and rooms"),
        permission("groups.manage", "groups", "Create and manage small groups"),
        permission("sermons.create", "content", "Upload and draft sermons"),
        permission("sermons.publish", "content", "Publish sermons to the public site"),
        permission("content.approve.church", "content", "Approve church-wide content before it goes live"),
        permission("donations.view", "finance", "View donation records"),
        permission("donations.manage", "finance", "Record and correct donations"),
        permission("settings.manage", "administration", "Change church settings"),
        permission("roles.assign", "administration", "Assign roles to members"),
        permission("tenants.manage", "administration", "Create and configure churches in the network"),
        permission("reports.view", "administration", "View operational reports"),
        permission("directory.view", "community", "Browse the member directory"),
        permission("announcements.send", "communication", "Send announcements to members"),
    ]
}

pub fn builtin_roles() -> Vec<Role> {
    let every_permission: HashSet<String> =
        builtin_permissions().into_iter().map(|p| p.name).collect();

    vec![
        Role {
            name: "super_admin".to_string(),
            display_name: "Super Administrator".to_string(),
            description: "Platform operator with unrestricted access".to_string(),
            level: 100,
            scope: RoleScope::Global,
            permissions: every_permission,
            delegable_roles: set(&[
                "super_admin",
                "network_admin",
                "church_admin",
                "pastor",
                "staff",
                "group_leader",
                "volunteer",
                "member",
            ]),
            toggleable_permissions: HashSet::new(),
            directory_visibility: DirectoryVisibility::Hidden,
        },
        Role {
            name: "network_admin".to_string(),
            display_name: "Network Administrator".to_string(),
            description: "Oversees every church in a network".to_string(),
            level: 80,
            scope: RoleScope::MultiTenant,
            permissions: set(&[
                "members.view",
                "members.manage",
                "events.create",
                "events.manage",
                "campuses.manage",
                "groups.manage",
                "content.approve.church",
                "donations.view",
                "donations.manage",
                "settings.manage",
                "roles.assign",
                "reports.view",
                "directory.view",
                "announcements.send",
            ]),
            delegable_roles: set(&[
                "church_admin",
                "pastor",
                "staff",
                "group_leader",
                "volunteer",
                "member",
            ]),
            toggleable_permissions: HashSet::new(),
            directory_visibility: DirectoryVisibility::Admins,
        },
        Role {
            name: "church_admin".to_string(),
            display_name: "Church Administrator".to_string(),
            description: "Runs the day-to-day administration of one church".to_string(),
            level: 60,
            scope: RoleScope::SingleTenant,
            permissions: set(&[
                "members.view",
                "members.manage",
                "events.create",
                "events.manage",
                "groups.manage",
                "content.approve.church",
                "donations.view",
                "donations.manage",
                "settings.manage",
                "roles.assign",
                "reports.view",
                "directory.view",
                "announcements.send",
            ]),
            delegable_roles: set(&["pastor", "staff", "group_leader", "volunteer", "member"]),
            toggleable_permissions: set(&["donations.manage"]),
            directory_visibility: DirectoryVisibility::Everyone,
        },
        Role {
            name: "pastor".to_string(),
            display_name: "Pastor".to_string(),
            description: "Leads services and owns sermon content".to_string(),
            level: 50,
            scope: RoleScope::SingleTenant,
            permissions: set(&[
                "sermons.create",
                "sermons.publish",
                "members.view",
                "events.create",
                "events.manage",
                "groups.manage",
                "directory.view",
                "announcements.send",
            ]),
            delegable_roles: set(&["group_leader", "volunteer", "member"]),
            toggleable_permissions: set(&["sermons.publish"]),
            directory_visibility: DirectoryVisibility::Everyone,
        },
        Role {
            name: "staff".to_string(),
            display_name: "Staff".to_string(),
            description: "Paid or regular staff supporting church operations".to_string(),
            level: 40,
            scope: RoleScope::Support,
            permissions: set(&[
                "members.view",
                "events.create",
                "events.manage",
                "directory.view",
                "reports.view",
            ]),
            delegable_roles: set(&["volunteer"]),
            toggleable_permissions: set(&["events.manage"]),
            directory_visibility: DirectoryVisibility::Everyone,
        },
        Role {
            name: "group_leader".to_string(),
            display_name: "Group Leader".to_string(),
            description: "Leads a small group within the church".to_string(),
            level: 30,
            scope: RoleScope::SubUnit,
            permissions: set(&[
                "members.view",
                "events.create",
                "directory.view",
                "announcements.send",
            ]),
            delegable_roles: HashSet::new(),
            toggleable_permissions: HashSet::new(),
            directory_visibility: DirectoryVisibility::Everyone,
        },
        Role {
            name: "volunteer".to_string(),
            display_name: "Volunteer".to_string(),
            description: "Serves on a ministry team".to_string(),
            level: 20,
            scope: RoleScope::Community,
            permissions: set(&["directory.view"]),
            delegable_roles: HashSet::new(),
            toggleable_permissions: HashSet::new(),
            directory_visibility: DirectoryVisibility::Leaders,
        },
        Role {
            name: "member".to_string(),
            display_name: "Member".to_string(),
            description: "Regular church member".to_string(),
            level: 10,
            scope: RoleScope::Community,
            permissions: set(&["directory.view"]),
            delegable_roles: HashSet::new(),
            toggleable_permissions: HashSet::new(),
            directory_visibility: DirectoryVisibility::Leaders,
        },
    ]
}

/// Roles whose holders handle sensitive data and are therefore subject to
/// step-up two-factor enforcement.
pub fn privileged_role_names() -> HashSet<String> {
    set(&["super_admin", "network_admin", "church_admin"])
}
