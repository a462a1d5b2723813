use std::collections::BTreeSet;

use chrono::Utc;
use entity::{permissions, role_permissions, roles, user_roles, users};
use platform_authz::Permission;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, EntityTrait, IntoActiveModel, QueryFilter,
};
use uuid::Uuid;

use crate::{DbError, DbPool, DbResult};

pub async fn upsert_user(db: &DbPool, email: &str, name: Option<String>) -> DbResult<users::Model> {
    let email = email.trim().to_lowercase();
    if email.is_empty() {
        return Err(DbError::InvalidInput("email must not be empty".into()));
    }
    if let Some(existing) = users::Entity::find()
        .filter(users::Column::Email.eq(email.as_str()))
        .one(db)
        .await?
    {
        if name.is_none() || existing.name == name {
            return Ok(existing);
        }
        let mut active = existing.into_active_model();
        active.name = Set(name);
        return Ok(active.update(db).await?);
    }
    let model = users::ActiveModel {
        id: Set(Uuid::new_v4()),
        email: Set(email),
        name: Set(name),
        is_active: Set(true),
        created_at: Set(Utc::now().into()),
    };
    Ok(model.insert(db).await?)
}

pub async fn find_user(db: &DbPool, user_id: Uuid) -> DbResult<Option<users::Model>> {
    Ok(users::Entity::find_by_id(user_id).one(db).await?)
}

/// The user behind a session, or `None` when the id is unknown or the
/// account has been deactivated.
pub async fn find_active_user(db: &DbPool, user_id: Uuid) -> DbResult<Option<users::Model>> {
    Ok(find_user(db, user_id).await?.filter(|user| user.is_active))
}

pub async fn find_user_by_email(db: &DbPool, email: &str) -> DbResult<Option<users::Model>> {
    Ok(users::Entity::find()
        .filter(users::Column::Email.eq(email.trim().to_lowercase()))
        .one(db)
        .await?)
}

pub async fn set_user_active(db: &DbPool, user_id: Uuid, is_active: bool) -> DbResult<()> {
    let user = users::Entity::find_by_id(user_id)
        .one(db)
        .await?
        .ok_or(DbError::UserNotFound(user_id))?;
    let mut active = user.into_active_model();
    active.is_active = Set(is_active);
    active.update(db).await?;
    Ok(())
}

/// Union of the permissions granted by the user's active roles.
///
/// Unknown and deactivated users resolve to an empty set. Nothing is cached:
/// every call reads the current assignments.
pub async fn load_effective_permissions(db: &DbPool, user_id: Uuid) -> DbResult<Vec<Permission>> {
    if find_active_user(db, user_id).await?.is_none() {
        return Ok(Vec::new());
    }

    let assigned = user_roles::Entity::find()
        .filter(user_roles::Column::UserId.eq(user_id))
        .all(db)
        .await?
        .into_iter()
        .map(|row| row.role_id)
        .collect::<Vec<_>>();
    if assigned.is_empty() {
        return Ok(Vec::new());
    }

    let active_roles = roles::Entity::find()
        .filter(roles::Column::Id.is_in(assigned))
        .filter(roles::Column::IsActive.eq(true))
        .all(db)
        .await?
        .into_iter()
        .map(|role| role.id)
        .collect::<Vec<_>>();
    if active_roles.is_empty() {
        return Ok(Vec::new());
    }

    let permission_ids = role_permissions::Entity::find()
        .filter(role_permissions::Column::RoleId.is_in(active_roles))
        .all(db)
        .await?
        .into_iter()
        .map(|link| link.permission_id)
        .collect::<BTreeSet<_>>();
    if permission_ids.is_empty() {
        return Ok(Vec::new());
    }

    let granted = permissions::Entity::find()
        .filter(permissions::Column::Id.is_in(permission_ids))
        .all(db)
        .await?
        .into_iter()
        .map(|row| Permission::new(row.resource, row.action, row.scope))
        .collect::<BTreeSet<_>>();
    Ok(granted.into_iter().collect())
}
