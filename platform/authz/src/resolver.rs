//! Pure allow/deny decisions over an effective permission set.

use std::collections::BTreeSet;

use crate::catalog::{ACTION_MANAGE, Permission, Resource, SCOPE_ALL};

/// Categories unlocked by a permission set. Grants outside the catalog are
/// dropped.
pub fn resource_categories(user_permissions: &[Permission]) -> BTreeSet<Resource> {
    user_permissions
        .iter()
        .filter_map(Permission::category)
        .collect()
}

/// True iff any held permission unlocks one of `required_resources`.
///
/// Only the resource is considered; action and scope are checked by the
/// protected operation itself through [`has_permission`].
pub fn has_any_permission_by_resource(
    user_permissions: &[Permission],
    required_resources: &[Resource],
) -> bool {
    user_permissions
        .iter()
        .filter_map(Permission::category)
        .any(|held| required_resources.contains(&held))
}

pub fn has_permission_by_resource(user_permissions: &[Permission], resource: Resource) -> bool {
    has_any_permission_by_resource(user_permissions, &[resource])
}

/// Operation-level check on an exact resource key.
///
/// `manage` on the key (same scope or `all`) grants every action, and an
/// `all` grant covers the narrower scopes.
pub fn has_permission(
    user_permissions: &[Permission],
    resource_key: &str,
    action: &str,
    scope: &str,
) -> bool {
    user_permissions
        .iter()
        .filter(|held| held.resource == resource_key)
        .any(|held| {
            let scope_covers = held.scope == scope || held.scope == SCOPE_ALL;
            scope_covers && (held.action == action || held.action == ACTION_MANAGE)
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn perm(resource: &str, action: &str, scope: &str) -> Permission {
        Permission::new(resource, action, scope)
    }

    #[test]
    fn empty_set_never_matches() {
        assert!(!has_any_permission_by_resource(&[], &[Resource::Dashboard]));
        assert!(!has_any_permission_by_resource(&[], &Resource::ALL));
    }

    #[test]
    fn any_single_resource_suffices() {
        let held = [perm("partner_management", "view", "all")];
        assert!(has_any_permission_by_resource(
            &held,
            &[Resource::OrderManagement, Resource::PartnerManagement]
        ));
        assert!(!has_any_permission_by_resource(&held, &[Resource::OrderManagement]));
    }

    #[test]
    fn action_and_scope_are_ignored_for_resource_checks() {
        let held = [perm("order_management", "delete", "own")];
        assert!(has_permission_by_resource(&held, Resource::OrderManagement));
    }

    #[test]
    fn detailed_capabilities_count_as_their_category() {
        let held = [perm("review_management:summary_report", "view", "all")];
        assert!(has_permission_by_resource(&held, Resource::ReviewManagement));
        assert_eq!(
            resource_categories(&held).into_iter().collect::<Vec<_>>(),
            vec![Resource::ReviewManagement]
        );
    }

    #[test]
    fn unknown_grants_unlock_nothing() {
        let held = [
            perm("orders", "view", "all"),
            perm("order_management:typo", "view", "all"),
        ];
        assert!(resource_categories(&held).is_empty());
        assert!(!has_any_permission_by_resource(&held, &Resource::ALL));
    }

    #[test]
    fn manage_grants_every_action() {
        let held = [perm("order_management", "manage", "all")];
        assert!(has_permission(&held, "order_management", "delete", "own"));
        assert!(has_permission(&held, "order_management", "export", "all"));
        assert!(!has_permission(&held, "inventory_management", "view", "all"));
    }

    #[test]
    fn all_scope_covers_narrower_scopes_but_not_the_reverse() {
        let all = [perm("order_management", "update", "all")];
        assert!(has_permission(&all, "order_management", "update", "own"));
        assert!(has_permission(&all, "order_management", "update", "team"));
        assert!(!has_permission(&all, "order_management", "delete", "own"));

        let own = [perm("order_management", "update", "own")];
        assert!(has_permission(&own, "order_management", "update", "own"));
        assert!(!has_permission(&own, "order_management", "update", "all"));
        assert!(!has_permission(&own, "order_management", "update", "team"));
    }

    #[test]
    fn scoped_manage_does_not_widen_scope() {
        let held = [perm("order_management", "manage", "own")];
        assert!(has_permission(&held, "order_management", "delete", "own"));
        assert!(!has_permission(&held, "order_management", "delete", "all"));
    }
}
