//! Authorization primitives for the back-office: resource catalog, page-access
//! tables, the permission resolver and the request-gate policy.

pub mod catalog;
pub mod gate;
pub mod page_access;
pub mod resolver;

use once_cell::sync::Lazy;
use thiserror::Error;

pub use catalog::{
    CatalogEntry, Permission, Resource, SystemRole, catalog_entry, catalog_keys, system_roles,
};
pub use gate::{AccessPolicy, ApiAuthorization, Caller, Decision, PathClass};
pub use page_access::{PageAccessMap, normalize_path};
pub use resolver::{
    has_any_permission_by_resource, has_permission, has_permission_by_resource,
    resource_categories,
};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("unknown resource {0}")]
    UnknownResource(String),
    #[error("invalid page path {0}")]
    InvalidPath(String),
    #[error("page entry {0} requires no resources")]
    EmptyEntry(String),
    #[error("page entry {0} registered twice")]
    DuplicateEntry(String),
    #[error("invalid API authorization mode {0}")]
    InvalidApiMode(String),
}

static STANDARD_POLICY: Lazy<Result<AccessPolicy, AuthzError>> = Lazy::new(AccessPolicy::standard);

/// Page check against the built-in dashboard tables.
///
/// Fails closed if the built-in tables are invalid; servers should build an
/// [`AccessPolicy`] at startup instead so that surfaces as an error.
pub fn can_access_page(user_permissions: &[Permission], pathname: &str) -> bool {
    match STANDARD_POLICY.as_ref() {
        Ok(policy) => policy.can_access_page(user_permissions, pathname),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_tables_are_valid() {
        assert!(STANDARD_POLICY.is_ok());
    }

    #[test]
    fn sales_grants_open_order_pages_only() {
        let sales = [Permission::new("order_management", "manage", "all")];
        assert!(can_access_page(&sales, "/dashboard/orders"));
        assert!(!can_access_page(&sales, "/dashboard/settings/users"));
        assert!(can_access_page(&[], "/dashboard/messages"));
        assert!(!can_access_page(&[], "/dashboard/orders"));
    }
}
