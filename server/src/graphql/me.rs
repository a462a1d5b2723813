use async_graphql::SimpleObject;
use entity::{roles, users};
use platform_authz::{Permission, resource_categories};

use crate::graphql::roles::RoleSummary;

#[derive(Clone, Debug, SimpleObject)]
pub struct GrantPayload {
    pub resource: String,
    pub action: String,
    pub scope: String,
}

#[derive(Clone, Debug, SimpleObject)]
pub struct MePayload {
    pub id: String,
    pub email: String,
    pub name: Option<String>,
    pub roles: Vec<RoleSummary>,
    pub permissions: Vec<GrantPayload>,
    /// Categories the caller can reach through page access.
    pub resources: Vec<String>,
}

impl MePayload {
    pub fn new(user: users::Model, roles: Vec<roles::Model>, permissions: Vec<Permission>) -> Self {
        let resources = resource_categories(&permissions)
            .into_iter()
            .map(|resource| resource.to_string())
            .collect();
        Self {
            id: user.id.to_string(),
            email: user.email,
            name: user.name,
            roles: roles.into_iter().map(Into::into).collect(),
            permissions: permissions
                .into_iter()
                .map(|grant| GrantPayload {
                    resource: grant.resource,
                    action: grant.action,
                    scope: grant.scope,
                })
                .collect(),
            resources,
        }
    }
}
