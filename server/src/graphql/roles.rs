use async_graphql::{InputObject, SimpleObject};
use entity::{permissions, roles};
use platform_authz::{Resource, catalog_entry};
use platform_db::{NewRole, RoleRecord, RoleUpdate};
use uuid::Uuid;

#[derive(Clone, Debug, SimpleObject)]
pub struct PermissionPayload {
    pub id: Uuid,
    pub resource: String,
    pub action: String,
    pub scope: String,
    pub description: Option<String>,
    /// Page-access category unlocked by this grant, if any.
    pub category: Option<String>,
    pub display_name: Option<String>,
    /// Heading the role editor groups this permission under.
    pub group: Option<String>,
    pub detailed: bool,
}

impl From<permissions::Model> for PermissionPayload {
    fn from(row: permissions::Model) -> Self {
        let category = Resource::from_grant(&row.resource).map(|r| r.to_string());
        let entry = catalog_entry(&row.resource);
        Self {
            id: row.id,
            resource: row.resource,
            action: row.action,
            scope: row.scope,
            description: row.description,
            category,
            display_name: entry.map(|entry| entry.display_name.to_string()),
            group: entry.map(|entry| entry.group.to_string()),
            detailed: entry.is_some_and(|entry| entry.detailed),
        }
    }
}

#[derive(Clone, Debug, SimpleObject)]
pub struct RoleSummary {
    pub id: Uuid,
    pub name: String,
    pub display_name: String,
    pub is_system: bool,
    pub is_active: bool,
}

impl From<roles::Model> for RoleSummary {
    fn from(role: roles::Model) -> Self {
        Self {
            id: role.id,
            name: role.name,
            display_name: role.display_name,
            is_system: role.is_system,
            is_active: role.is_active,
        }
    }
}

#[derive(Clone, Debug, SimpleObject)]
pub struct RolePayload {
    pub id: Uuid,
    pub name: String,
    pub display_name: String,
    pub description: Option<String>,
    pub is_system: bool,
    pub is_active: bool,
    pub user_count: u64,
    pub permissions: Vec<PermissionPayload>,
}

impl From<RoleRecord> for RolePayload {
    fn from(record: RoleRecord) -> Self {
        let RoleRecord {
            role,
            permissions,
            user_count,
        } = record;
        Self {
            id: role.id,
            name: role.name,
            display_name: role.display_name,
            description: role.description,
            is_system: role.is_system,
            is_active: role.is_active,
            user_count,
            permissions: permissions.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Clone, Debug, InputObject)]
pub struct CreateRoleInput {
    pub name: String,
    pub display_name: String,
    pub description: Option<String>,
    #[graphql(default)]
    pub permission_ids: Vec<Uuid>,
}

impl From<CreateRoleInput> for NewRole {
    fn from(input: CreateRoleInput) -> Self {
        NewRole {
            name: input.name,
            display_name: input.display_name,
            description: input.description,
            permission_ids: input.permission_ids,
        }
    }
}

/// Omitted fields are left unchanged. Role names are immutable.
#[derive(Clone, Debug, InputObject)]
pub struct UpdateRoleInput {
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub is_active: Option<bool>,
    pub permission_ids: Option<Vec<Uuid>>,
}

impl From<UpdateRoleInput> for RoleUpdate {
    fn from(input: UpdateRoleInput) -> Self {
        RoleUpdate {
            display_name: input.display_name,
            description: input.description,
            is_active: input.is_active,
            permission_ids: input.permission_ids,
        }
    }
}
