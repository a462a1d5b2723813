mod me;
mod roles;

use std::sync::Arc;

use anyhow::anyhow;
use async_graphql::{Context, EmptySubscription, Object, Result, ResultExt, Schema};
use platform_api::{ApiError, ApiResult, authorize};
use platform_authz::{AccessPolicy, Permission, Resource};
use platform_db::{
    AuditAction, AuditEntry, AuditStatus, DbPool, DbResult, load_effective_permissions,
    record_audit,
};
use tracing::{instrument, warn};
use uuid::Uuid;

use self::{
    me::MePayload,
    roles::{CreateRoleInput, PermissionPayload, RolePayload, RoleSummary, UpdateRoleInput},
};

pub type SchemaType = Schema<QueryRoot, MutationRoot, EmptySubscription>;

/// Process-wide data shared by every resolver.
#[derive(Clone)]
pub struct GraphqlData {
    pub pool: DbPool,
    pub policy: Arc<AccessPolicy>,
}

/// Per-request caller, set by the HTTP handler after the gate authenticated it.
#[derive(Clone, Copy, Debug)]
pub struct RequestUser {
    pub id: Uuid,
}

pub fn build_schema(data: GraphqlData) -> SchemaType {
    Schema::build(QueryRoot, MutationRoot, EmptySubscription)
        .data(data)
        .finish()
}

fn shared<'a>(ctx: &Context<'a>) -> ApiResult<&'a GraphqlData> {
    ctx.data::<GraphqlData>()
        .map_err(|_| ApiError::internal(anyhow!("graphql data not installed")))
}

fn requester(ctx: &Context<'_>) -> ApiResult<RequestUser> {
    ctx.data_opt::<RequestUser>()
        .copied()
        .ok_or(ApiError::Unauthorized)
}

async fn current_permissions(data: &GraphqlData, user: RequestUser) -> Vec<Permission> {
    match load_effective_permissions(&data.pool, user.id).await {
        Ok(permissions) => permissions,
        Err(err) => {
            warn!(user_id = %user.id, error = %err, "permission lookup failed");
            Vec::new()
        }
    }
}

/// Caller must hold `system_management`, checked against fresh permissions.
async fn require_management<'a>(ctx: &Context<'a>) -> ApiResult<(&'a GraphqlData, RequestUser)> {
    let data = shared(ctx)?;
    let user = requester(ctx)?;
    let permissions = current_permissions(data, user).await;
    authorize(&permissions, &[Resource::SystemManagement])?;
    Ok((data, user))
}

/// Records a management mutation, including the ones the store rejected.
async fn audit<T>(
    data: &GraphqlData,
    user: RequestUser,
    action: AuditAction,
    resource_id: Option<Uuid>,
    outcome: &DbResult<T>,
) {
    let status = match outcome {
        Ok(_) => AuditStatus::Success,
        Err(_) => AuditStatus::Failed,
    };
    let mut entry = AuditEntry::new(action, "roles", status).user(user.id);
    if let Some(resource_id) = resource_id {
        entry = entry.resource_id(resource_id.to_string());
    }
    if let Err(err) = outcome {
        entry = entry.message(err.to_string());
    }
    if let Err(err) = record_audit(&data.pool, entry).await {
        warn!(error = %err, "failed to record audit entry");
    }
}

#[derive(Default)]
pub struct QueryRoot;

#[Object]
impl QueryRoot {
    #[instrument(name = "graphql.me", skip_all)]
    async fn me(&self, ctx: &Context<'_>) -> Result<MePayload> {
        async {
            let data = shared(ctx)?;
            let caller = requester(ctx)?;
            let user = platform_db::find_user(&data.pool, caller.id)
                .await?
                .ok_or(ApiError::Unauthorized)?;
            let roles = platform_db::roles_of_user(&data.pool, caller.id).await?;
            let permissions = current_permissions(data, caller).await;
            Ok::<_, ApiError>(MePayload::new(user, roles, permissions))
        }
        .await
        .extend()
    }

    #[instrument(name = "graphql.roles", skip_all)]
    async fn roles(&self, ctx: &Context<'_>) -> Result<Vec<RolePayload>> {
        async {
            let (data, _) = require_management(ctx).await?;
            let roles = platform_db::list_roles(&data.pool).await?;
            Ok::<_, ApiError>(roles.into_iter().map(Into::into).collect())
        }
        .await
        .extend()
    }

    #[instrument(name = "graphql.role", skip_all)]
    async fn role(&self, ctx: &Context<'_>, id: Uuid) -> Result<Option<RolePayload>> {
        async {
            let (data, _) = require_management(ctx).await?;
            let role = platform_db::find_role(&data.pool, id).await?;
            Ok::<_, ApiError>(role.map(Into::into))
        }
        .await
        .extend()
    }

    #[instrument(name = "graphql.permissions", skip_all)]
    async fn permissions(&self, ctx: &Context<'_>) -> Result<Vec<PermissionPayload>> {
        async {
            let (data, _) = require_management(ctx).await?;
            let rows = platform_db::list_permissions(&data.pool).await?;
            Ok::<_, ApiError>(rows.into_iter().map(Into::into).collect())
        }
        .await
        .extend()
    }

    /// Whether the caller may open the page at `path`.
    #[instrument(name = "graphql.can_access", skip(self, ctx))]
    async fn can_access(&self, ctx: &Context<'_>, path: String) -> Result<bool> {
        async {
            let data = shared(ctx)?;
            let caller = requester(ctx)?;
            let permissions = current_permissions(data, caller).await;
            Ok::<_, ApiError>(data.policy.can_access_page(&permissions, &path))
        }
        .await
        .extend()
    }
}

#[derive(Default)]
pub struct MutationRoot;

#[Object]
impl MutationRoot {
    #[instrument(name = "graphql.create_role", skip_all)]
    async fn create_role(&self, ctx: &Context<'_>, input: CreateRoleInput) -> Result<RolePayload> {
        async {
            let (data, user) = require_management(ctx).await?;
            let outcome = platform_db::create_role(&data.pool, input.into()).await;
            let role_id = outcome.as_ref().ok().map(|record| record.role.id);
            audit(data, user, AuditAction::RoleCreate, role_id, &outcome).await;
            Ok::<_, ApiError>(outcome?.into())
        }
        .await
        .extend()
    }

    #[instrument(name = "graphql.update_role", skip_all)]
    async fn update_role(
        &self,
        ctx: &Context<'_>,
        id: Uuid,
        input: UpdateRoleInput,
    ) -> Result<RolePayload> {
        async {
            let (data, user) = require_management(ctx).await?;
            let outcome = platform_db::update_role(&data.pool, id, input.into()).await;
            audit(data, user, AuditAction::RoleUpdate, Some(id), &outcome).await;
            Ok::<_, ApiError>(outcome?.into())
        }
        .await
        .extend()
    }

    #[instrument(name = "graphql.delete_role", skip_all)]
    async fn delete_role(&self, ctx: &Context<'_>, id: Uuid) -> Result<bool> {
        async {
            let (data, user) = require_management(ctx).await?;
            let outcome = platform_db::delete_role(&data.pool, id).await;
            audit(data, user, AuditAction::RoleDelete, Some(id), &outcome).await;
            outcome?;
            Ok::<_, ApiError>(true)
        }
        .await
        .extend()
    }

    /// Replaces the user's roles; returns the resulting set.
    #[instrument(name = "graphql.set_user_roles", skip_all)]
    async fn set_user_roles(
        &self,
        ctx: &Context<'_>,
        user_id: Uuid,
        role_ids: Vec<Uuid>,
    ) -> Result<Vec<RoleSummary>> {
        async {
            let (data, user) = require_management(ctx).await?;
            let outcome = platform_db::set_user_roles(&data.pool, user_id, role_ids).await;
            audit(data, user, AuditAction::RoleAssign, Some(user_id), &outcome).await;
            Ok::<_, ApiError>(outcome?.into_iter().map(Into::into).collect())
        }
        .await
        .extend()
    }

    #[instrument(name = "graphql.assign_role", skip_all)]
    async fn assign_role(&self, ctx: &Context<'_>, user_id: Uuid, role_id: Uuid) -> Result<bool> {
        async {
            let (data, user) = require_management(ctx).await?;
            let outcome = platform_db::assign_role(&data.pool, user_id, role_id).await;
            if !matches!(outcome, Ok(false)) {
                audit(data, user, AuditAction::RoleAssign, Some(user_id), &outcome).await;
            }
            Ok::<_, ApiError>(outcome?)
        }
        .await
        .extend()
    }

    #[instrument(name = "graphql.revoke_role", skip_all)]
    async fn revoke_role(&self, ctx: &Context<'_>, user_id: Uuid, role_id: Uuid) -> Result<bool> {
        async {
            let (data, user) = require_management(ctx).await?;
            let outcome = platform_db::revoke_role(&data.pool, user_id, role_id).await;
            if !matches!(outcome, Ok(false)) {
                audit(data, user, AuditAction::RoleRevoke, Some(user_id), &outcome).await;
            }
            Ok::<_, ApiError>(outcome?)
        }
        .await
        .extend()
    }
}
