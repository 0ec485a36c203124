//! Integration tests for permission resolution, role assignment and
//! delegation.

mod common;

use chrono::Duration;
use service_core::error::AppError;
use uuid::Uuid;

use authz_service::models::RoleAssignment;
use authz_service::store::AuthzStore;
use authz_service::services::AssignmentOptions;

use common::{setup, test_epoch};

// ==================== Permission Resolution ====================

#[tokio::test]
async fn test_base_role_permission_grants() {
    let t = setup().await;
    let user = Uuid::new_v4();
    let tenant = Uuid::new_v4();
    t.seed_assignment(user, tenant, "pastor").await;

    assert!(t.core.resolver.has_permission(user, tenant, "sermons.create").await);
    assert!(t.core.resolver.has_permission(user, tenant, "events.create").await);
    assert!(!t.core.resolver.has_permission(user, tenant, "donations.manage").await);
}

#[tokio::test]
async fn test_additional_permission_grants() {
    let t = setup().await;
    let admin = Uuid::new_v4();
    let user = Uuid::new_v4();
    let tenant = Uuid::new_v4();
    t.seed_assignment(admin, tenant, "church_admin").await;

    let options = AssignmentOptions {
        additional_permissions: vec!["events.manage".to_string()],
        ..Default::default()
    };
    t.core
        .assign_role(admin, user, tenant, "member", options)
        .await
        .unwrap();

    assert!(t.core.resolver.has_permission(user, tenant, "events.manage").await);
    assert!(t.core.resolver.has_permission(user, tenant, "directory.view").await);
}

#[tokio::test]
async fn test_restriction_beats_base_permission() {
    let t = setup().await;
    let admin = Uuid::new_v4();
    let user = Uuid::new_v4();
    let tenant = Uuid::new_v4();
    t.seed_assignment(admin, tenant, "church_admin").await;

    let options = AssignmentOptions {
        restricted_permissions: vec!["sermons.publish".to_string()],
        ..Default::default()
    };
    t.core
        .assign_role(admin, user, tenant, "pastor", options)
        .await
        .unwrap();

    assert!(!t.core.resolver.has_permission(user, tenant, "sermons.publish").await);
    assert!(t.core.resolver.has_permission(user, tenant, "sermons.create").await);
}

#[tokio::test]
async fn test_restriction_beats_additional_grant() {
    let t = setup().await;
    let admin = Uuid::new_v4();
    let user = Uuid::new_v4();
    let tenant = Uuid::new_v4();
    t.seed_assignment(admin, tenant, "church_admin").await;

    // The same permission granted as an extra and restricted at once:
    // restriction wins.
    let options = AssignmentOptions {
        additional_permissions: vec!["events.manage".to_string()],
        restricted_permissions: vec!["events.manage".to_string()],
        ..Default::default()
    };
    t.core
        .assign_role(admin, user, tenant, "member", options)
        .await
        .unwrap();

    assert!(!t.core.resolver.has_permission(user, tenant, "events.manage").await);
}

#[tokio::test]
async fn test_no_assignment_denies() {
    let t = setup().await;
    assert!(
        !t.core
            .resolver
            .has_permission(Uuid::new_v4(), Uuid::new_v4(), "directory.view")
            .await
    );
}

#[tokio::test]
async fn test_assignment_in_other_tenant_does_not_leak() {
    let t = setup().await;
    let user = Uuid::new_v4();
    let home = Uuid::new_v4();
    let other = Uuid::new_v4();
    t.seed_assignment(user, home, "pastor").await;

    assert!(t.core.resolver.has_permission(user, home, "sermons.create").await);
    assert!(!t.core.resolver.has_permission(user, other, "sermons.create").await);
}

#[tokio::test]
async fn test_expired_assignment_denies() {
    let t = setup().await;
    let admin = Uuid::new_v4();
    let user = Uuid::new_v4();
    let tenant = Uuid::new_v4();
    t.seed_assignment(admin, tenant, "church_admin").await;

    let options = AssignmentOptions {
        expires_utc: Some(test_epoch() + Duration::hours(1)),
        ..Default::default()
    };
    t.core
        .assign_role(admin, user, tenant, "pastor", options)
        .await
        .unwrap();

    assert!(t.core.resolver.has_permission(user, tenant, "sermons.create").await);

    t.clock.advance(Duration::hours(2));
    assert!(!t.core.resolver.has_permission(user, tenant, "sermons.create").await);
    assert!(t.core.resolver.get_user_role(user, tenant).await.unwrap().is_none());
}

#[tokio::test]
async fn test_storage_failure_denies_instead_of_erroring() {
    let t = setup().await;
    let user = Uuid::new_v4();
    let tenant = Uuid::new_v4();
    t.seed_assignment(user, tenant, "pastor").await;

    t.store.set_fail(true);
    assert!(!t.core.resolver.has_permission(user, tenant, "sermons.create").await);
}

#[tokio::test]
async fn test_dangling_role_denies_even_with_extras() {
    let t = setup().await;
    let user = Uuid::new_v4();
    let tenant = Uuid::new_v4();

    // A stored role that was since removed from the catalog. The extra
    // grants hang off the assignment but must not apply.
    let mut assignment = RoleAssignment::new(
        user,
        tenant,
        "retired_role".to_string(),
        Uuid::new_v4(),
        test_epoch(),
    );
    assignment.additional_permissions = vec!["directory.view".to_string()];
    t.store.upsert_assignment(&assignment).await.unwrap();

    assert!(!t.core.resolver.has_permission(user, tenant, "directory.view").await);
    assert!(t.core.resolver.get_user_role(user, tenant).await.unwrap().is_none());
}

#[tokio::test]
async fn test_get_user_role_view() {
    let t = setup().await;
    let admin = Uuid::new_v4();
    let user = Uuid::new_v4();
    let tenant = Uuid::new_v4();
    t.seed_assignment(admin, tenant, "church_admin").await;

    let options = AssignmentOptions {
        title: Some("Lead Pastor".to_string()),
        department: Some("Worship".to_string()),
        restricted_permissions: vec!["sermons.publish".to_string()],
        ..Default::default()
    };
    t.core
        .assign_role(admin, user, tenant, "pastor", options)
        .await
        .unwrap();

    let view = t.core.resolver.get_user_role(user, tenant).await.unwrap().unwrap();
    assert_eq!(view.role_name, "pastor");
    assert_eq!(view.display_name, "Pastor");
    assert_eq!(view.level, 50);
    assert!(view.permissions.contains(&"sermons.create".to_string()));
    assert_eq!(view.restricted_permissions, vec!["sermons.publish".to_string()]);
    assert_eq!(view.title.as_deref(), Some("Lead Pastor"));
    assert_eq!(view.department.as_deref(), Some("Worship"));
}

// ==================== Assignment Upsert ====================

#[tokio::test]
async fn test_reassignment_keeps_one_active_row() {
    let t = setup().await;
    let admin = Uuid::new_v4();
    let user = Uuid::new_v4();
    let tenant = Uuid::new_v4();
    t.seed_assignment(admin, tenant, "church_admin").await;

    for role in ["member", "volunteer", "staff"] {
        t.core
            .assign_role(admin, user, tenant, role, AssignmentOptions::default())
            .await
            .unwrap();
    }

    let active = t.store.find_active_assignments_for_user(user).await.unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].role_name, "staff");

    let view = t.core.resolver.get_user_role(user, tenant).await.unwrap().unwrap();
    assert_eq!(view.role_name, "staff");
}

#[tokio::test]
async fn test_list_tenant_assignments() {
    let t = setup().await;
    let admin = Uuid::new_v4();
    let tenant = Uuid::new_v4();
    t.seed_assignment(admin, tenant, "church_admin").await;

    for _ in 0..3 {
        t.core
            .assign_role(admin, Uuid::new_v4(), tenant, "member", AssignmentOptions::default())
            .await
            .unwrap();
    }

    let assignments = t.core.assignments.list_tenant_assignments(tenant).await.unwrap();
    assert_eq!(assignments.len(), 4); // admin plus three members
}

// ==================== Delegation ====================

#[tokio::test]
async fn test_delegation_follows_allow_list() {
    let t = setup().await;
    let admin = Uuid::new_v4();
    let tenant = Uuid::new_v4();
    t.seed_assignment(admin, tenant, "church_admin").await;

    for role in ["pastor", "staff", "group_leader", "volunteer", "member"] {
        assert!(t.core.assignments.can_manage_role(admin, tenant, role).await, "{}", role);
    }
    assert!(!t.core.assignments.can_manage_role(admin, tenant, "church_admin").await);
    assert!(!t.core.assignments.can_manage_role(admin, tenant, "network_admin").await);
    assert!(!t.core.assignments.can_manage_role(admin, tenant, "super_admin").await);
}

#[tokio::test]
async fn test_delegation_ignores_role_level() {
    let t = setup().await;
    let pastor = Uuid::new_v4();
    let tenant = Uuid::new_v4();
    t.seed_assignment(pastor, tenant, "pastor").await;

    // staff sits below pastor in level but outside its allow-list.
    assert!(!t.core.assignments.can_manage_role(pastor, tenant, "staff").await);
    assert!(t.core.assignments.can_manage_role(pastor, tenant, "group_leader").await);
    assert!(t.core.assignments.can_manage_role(pastor, tenant, "member").await);
}

#[tokio::test]
async fn test_single_tenant_authority_stays_in_tenant() {
    let t = setup().await;
    let admin = Uuid::new_v4();
    let home = Uuid::new_v4();
    let other = Uuid::new_v4();
    t.seed_assignment(admin, home, "church_admin").await;

    assert!(t.core.assignments.can_manage_role(admin, home, "pastor").await);
    assert!(!t.core.assignments.can_manage_role(admin, other, "pastor").await);
}

#[tokio::test]
async fn test_cross_tenant_scopes_carry_authority() {
    let t = setup().await;
    let operator = Uuid::new_v4();
    let network = Uuid::new_v4();
    let home = Uuid::new_v4();
    let other = Uuid::new_v4();
    t.seed_assignment(operator, home, "super_admin").await;
    t.seed_assignment(network, home, "network_admin").await;

    assert!(t.core.assignments.can_manage_role(operator, other, "church_admin").await);
    assert!(t.core.assignments.can_manage_role(network, other, "church_admin").await);
    // The allow-list still binds in foreign tenants.
    assert!(!t.core.assignments.can_manage_role(network, other, "network_admin").await);
}

#[tokio::test]
async fn test_member_manages_nothing() {
    let t = setup().await;
    let member = Uuid::new_v4();
    let tenant = Uuid::new_v4();
    t.seed_assignment(member, tenant, "member").await;

    for role in ["member", "volunteer", "pastor"] {
        assert!(!t.core.assignments.can_manage_role(member, tenant, role).await, "{}", role);
    }
}

#[tokio::test]
async fn test_unknown_target_role_is_not_manageable() {
    let t = setup().await;
    let admin = Uuid::new_v4();
    let tenant = Uuid::new_v4();
    t.seed_assignment(admin, tenant, "super_admin").await;

    assert!(!t.core.assignments.can_manage_role(admin, tenant, "emperor").await);
}

#[tokio::test]
async fn test_delegation_check_fails_closed() {
    let t = setup().await;
    let admin = Uuid::new_v4();
    let tenant = Uuid::new_v4();
    t.seed_assignment(admin, tenant, "church_admin").await;

    t.store.set_fail(true);
    assert!(!t.core.assignments.can_manage_role(admin, tenant, "member").await);
}

// ==================== Assignment Errors ====================

#[tokio::test]
async fn test_assign_unknown_role_is_rejected() {
    let t = setup().await;
    let admin = Uuid::new_v4();
    let tenant = Uuid::new_v4();
    t.seed_assignment(admin, tenant, "super_admin").await;

    let err = t
        .core
        .assign_role(admin, Uuid::new_v4(), tenant, "emperor", AssignmentOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::ValidationError(_)), "{:?}", err);
}

#[tokio::test]
async fn test_assign_unknown_overlay_permission_is_rejected() {
    let t = setup().await;
    let admin = Uuid::new_v4();
    let tenant = Uuid::new_v4();
    t.seed_assignment(admin, tenant, "church_admin").await;

    let options = AssignmentOptions {
        additional_permissions: vec!["plumbing.fix".to_string()],
        ..Default::default()
    };
    let err = t
        .core
        .assign_role(admin, Uuid::new_v4(), tenant, "member", options)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::ValidationError(_)), "{:?}", err);
}

#[tokio::test]
async fn test_assign_without_authority_is_forbidden() {
    let t = setup().await;
    let member = Uuid::new_v4();
    let stranger = Uuid::new_v4();
    let tenant = Uuid::new_v4();
    t.seed_assignment(member, tenant, "member").await;

    let err = t
        .core
        .assign_role(member, Uuid::new_v4(), tenant, "volunteer", AssignmentOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)), "{:?}", err);

    // An actor with no assignment anywhere has no authority either.
    let err = t
        .core
        .assign_role(stranger, Uuid::new_v4(), tenant, "member", AssignmentOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)), "{:?}", err);
}

// ==================== Revocation ====================

#[tokio::test]
async fn test_revoke_clears_access() {
    let t = setup().await;
    let admin = Uuid::new_v4();
    let user = Uuid::new_v4();
    let tenant = Uuid::new_v4();
    t.seed_assignment(admin, tenant, "church_admin").await;
    t.core
        .assign_role(admin, user, tenant, "pastor", AssignmentOptions::default())
        .await
        .unwrap();

    t.core.assignments.revoke_role(admin, user, tenant).await.unwrap();

    assert!(!t.core.resolver.has_permission(user, tenant, "sermons.create").await);
    assert!(t.core.resolver.get_user_role(user, tenant).await.unwrap().is_none());
}

#[tokio::test]
async fn test_revoke_requires_authority_over_held_role() {
    let t = setup().await;
    let admin = Uuid::new_v4();
    let volunteer = Uuid::new_v4();
    let user = Uuid::new_v4();
    let tenant = Uuid::new_v4();
    t.seed_assignment(admin, tenant, "church_admin").await;
    t.seed_assignment(volunteer, tenant, "volunteer").await;
    t.core
        .assign_role(admin, user, tenant, "pastor", AssignmentOptions::default())
        .await
        .unwrap();

    let err = t
        .core
        .assignments
        .revoke_role(volunteer, user, tenant)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)), "{:?}", err);
}

#[tokio::test]
async fn test_revoke_without_assignment_is_not_found() {
    let t = setup().await;
    let admin = Uuid::new_v4();
    let tenant = Uuid::new_v4();
    t.seed_assignment(admin, tenant, "church_admin").await;

    let err = t
        .core
        .assignments
        .revoke_role(admin, Uuid::new_v4(), tenant)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)), "{:?}", err);
}

// ==================== End To End ====================

#[tokio::test]
async fn test_admin_grants_pastor_who_can_create_sermons() {
    let t = setup().await;
    let admin = Uuid::new_v4();
    let u1 = Uuid::new_v4();
    let tenant = Uuid::new_v4();
    t.seed_assignment(admin, tenant, "church_admin").await;

    t.core
        .assign_role(admin, u1, tenant, "pastor", AssignmentOptions::default())
        .await
        .unwrap();

    let view = t.core.resolver.get_user_role(u1, tenant).await.unwrap().unwrap();
    assert_eq!(view.role_name, "pastor");
    assert!(t.core.resolver.has_permission(u1, tenant, "sermons.create").await);

    // The same admin cannot mint another church_admin.
    let err = t
        .core
        .assign_role(admin, Uuid::new_v4(), tenant, "church_admin", AssignmentOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)), "{:?}", err);
}
