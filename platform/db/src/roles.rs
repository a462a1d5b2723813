use std::collections::BTreeSet;

use chrono::Utc;
use entity::{permissions, role_permissions, roles, user_roles, users};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, DatabaseTransaction, DbErr,
    EntityTrait, IntoActiveModel, PaginatorTrait, QueryFilter, QueryOrder, SqlErr,
    TransactionTrait,
};
use tracing::info;
use uuid::Uuid;

use crate::{DbError, DbPool, DbResult};

#[derive(Clone, Debug)]
pub struct NewRole {
    pub name: String,
    pub display_name: String,
    pub description: Option<String>,
    pub permission_ids: Vec<Uuid>,
}

/// Partial update; `None` leaves a field untouched. A blank description
/// clears it. A supplied permission list replaces the role's permissions
/// exactly.
#[derive(Clone, Debug, Default)]
pub struct RoleUpdate {
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub is_active: Option<bool>,
    pub permission_ids: Option<Vec<Uuid>>,
}

#[derive(Clone, Debug)]
pub struct RoleRecord {
    pub role: roles::Model,
    pub permissions: Vec<permissions::Model>,
    pub user_count: u64,
}

pub async fn list_permissions(db: &DbPool) -> DbResult<Vec<permissions::Model>> {
    Ok(permissions::Entity::find()
        .order_by_asc(permissions::Column::Resource)
        .order_by_asc(permissions::Column::Action)
        .order_by_asc(permissions::Column::Scope)
        .all(db)
        .await?)
}

pub async fn list_roles(db: &DbPool) -> DbResult<Vec<RoleRecord>> {
    let roles = roles::Entity::find()
        .order_by_asc(roles::Column::Name)
        .all(db)
        .await?;
    let mut records = Vec::with_capacity(roles.len());
    for role in roles {
        records.push(role_record(db, role).await?);
    }
    Ok(records)
}

pub async fn find_role(db: &DbPool, role_id: Uuid) -> DbResult<Option<RoleRecord>> {
    match roles::Entity::find_by_id(role_id).one(db).await? {
        Some(role) => Ok(Some(role_record(db, role).await?)),
        None => Ok(None),
    }
}

/// Roles currently assigned to `user_id`, active or not.
pub async fn roles_of_user(db: &DbPool, user_id: Uuid) -> DbResult<Vec<roles::Model>> {
    let role_ids = user_roles::Entity::find()
        .filter(user_roles::Column::UserId.eq(user_id))
        .all(db)
        .await?
        .into_iter()
        .map(|row| row.role_id)
        .collect::<Vec<_>>();
    if role_ids.is_empty() {
        return Ok(Vec::new());
    }
    Ok(roles::Entity::find()
        .filter(roles::Column::Id.is_in(role_ids))
        .order_by_asc(roles::Column::Name)
        .all(db)
        .await?)
}

pub async fn create_role(db: &DbPool, input: NewRole) -> DbResult<RoleRecord> {
    let name = input.name.trim().to_string();
    if name.is_empty() {
        return Err(DbError::InvalidInput("role name must not be empty".into()));
    }
    let display_name = input.display_name.trim().to_string();
    if display_name.is_empty() {
        return Err(DbError::InvalidInput("display name must not be empty".into()));
    }
    let wanted = input.permission_ids.into_iter().collect::<BTreeSet<_>>();

    let txn = db.begin().await?;
    let duplicate = roles::Entity::find()
        .filter(roles::Column::Name.eq(name.as_str()))
        .one(&txn)
        .await?;
    if duplicate.is_some() {
        return Err(DbError::RoleExists(name));
    }
    ensure_permissions_exist(&txn, &wanted).await?;

    let now = Utc::now();
    let role = roles::ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(name.clone()),
        display_name: Set(display_name),
        description: Set(input.description),
        is_system: Set(false),
        is_active: Set(true),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    }
    .insert(&txn)
    .await
    .map_err(|err| name_conflict(err, &name))?;
    replace_role_permissions(&txn, role.id, &wanted).await?;
    txn.commit().await?;

    info!(role = %role.name, permissions = wanted.len(), "role created");
    role_record(db, role).await
}

pub async fn update_role(db: &DbPool, role_id: Uuid, update: RoleUpdate) -> DbResult<RoleRecord> {
    let txn = db.begin().await?;
    let role = roles::Entity::find_by_id(role_id)
        .one(&txn)
        .await?
        .ok_or(DbError::RoleNotFound(role_id))?;

    let mut active = role.into_active_model();
    if let Some(display_name) = update.display_name {
        let display_name = display_name.trim().to_string();
        if display_name.is_empty() {
            return Err(DbError::InvalidInput("display name must not be empty".into()));
        }
        active.display_name = Set(display_name);
    }
    if let Some(description) = update.description {
        let description = description.trim();
        active.description = Set((!description.is_empty()).then(|| description.to_string()));
    }
    if let Some(is_active) = update.is_active {
        active.is_active = Set(is_active);
    }
    active.updated_at = Set(Utc::now().into());
    let role = active.update(&txn).await?;

    if let Some(ids) = update.permission_ids {
        let wanted = ids.into_iter().collect::<BTreeSet<_>>();
        ensure_permissions_exist(&txn, &wanted).await?;
        replace_role_permissions(&txn, role.id, &wanted).await?;
    }
    txn.commit().await?;

    info!(role = %role.name, "role updated");
    role_record(db, role).await
}

/// Deletes a non-system role that nobody holds.
pub async fn delete_role(db: &DbPool, role_id: Uuid) -> DbResult<roles::Model> {
    let txn = db.begin().await?;
    let role = roles::Entity::find_by_id(role_id)
        .one(&txn)
        .await?
        .ok_or(DbError::RoleNotFound(role_id))?;
    if role.is_system {
        return Err(DbError::SystemRole(role.name));
    }
    let holders = assignment_count(&txn, role.id).await?;
    if holders > 0 {
        return Err(DbError::RoleInUse {
            name: role.name,
            users: holders,
        });
    }

    role_permissions::Entity::delete_many()
        .filter(role_permissions::Column::RoleId.eq(role.id))
        .exec(&txn)
        .await?;
    roles::Entity::delete_by_id(role.id).exec(&txn).await?;
    txn.commit().await?;

    info!(role = %role.name, "role deleted");
    Ok(role)
}

/// Replaces the user's role set with `role_ids`.
pub async fn set_user_roles(db: &DbPool, user_id: Uuid, role_ids: Vec<Uuid>) -> DbResult<Vec<roles::Model>> {
    let wanted = role_ids.into_iter().collect::<BTreeSet<_>>();
    let txn = db.begin().await?;
    ensure_user_exists(&txn, user_id).await?;
    ensure_roles_exist(&txn, &wanted).await?;

    let current = user_roles::Entity::find()
        .filter(user_roles::Column::UserId.eq(user_id))
        .all(&txn)
        .await?
        .into_iter()
        .map(|row| row.role_id)
        .collect::<BTreeSet<_>>();
    let removed = current.difference(&wanted).copied().collect::<Vec<_>>();
    let added = wanted.difference(&current).copied().collect::<Vec<_>>();

    if !removed.is_empty() {
        user_roles::Entity::delete_many()
            .filter(user_roles::Column::UserId.eq(user_id))
            .filter(user_roles::Column::RoleId.is_in(removed.clone()))
            .exec(&txn)
            .await?;
    }
    if !added.is_empty() {
        let now = Utc::now();
        let rows = added.iter().map(|role_id| user_roles::ActiveModel {
            user_id: Set(user_id),
            role_id: Set(*role_id),
            assigned_at: Set(now.into()),
        });
        user_roles::Entity::insert_many(rows)
            .exec_without_returning(&txn)
            .await?;
    }
    txn.commit().await?;

    info!(%user_id, added = added.len(), removed = removed.len(), "user roles replaced");
    roles_of_user(db, user_id).await
}

/// Grants one role; granting a held role is a no-op.
pub async fn assign_role(db: &DbPool, user_id: Uuid, role_id: Uuid) -> DbResult<bool> {
    let txn = db.begin().await?;
    ensure_user_exists(&txn, user_id).await?;
    ensure_roles_exist(&txn, &BTreeSet::from([role_id])).await?;
    let held = user_roles::Entity::find_by_id((user_id, role_id))
        .one(&txn)
        .await?
        .is_some();
    if held {
        return Ok(false);
    }
    user_roles::ActiveModel {
        user_id: Set(user_id),
        role_id: Set(role_id),
        assigned_at: Set(Utc::now().into()),
    }
    .insert(&txn)
    .await?;
    txn.commit().await?;
    info!(%user_id, %role_id, "role assigned");
    Ok(true)
}

/// Returns whether an assignment was removed.
pub async fn revoke_role(db: &DbPool, user_id: Uuid, role_id: Uuid) -> DbResult<bool> {
    let result = user_roles::Entity::delete_by_id((user_id, role_id))
        .exec(db)
        .await?;
    if result.rows_affected > 0 {
        info!(%user_id, %role_id, "role revoked");
    }
    Ok(result.rows_affected > 0)
}

/// A concurrent create can pass the name check and still lose on the unique
/// index.
fn name_conflict(err: DbErr, name: &str) -> DbError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => DbError::RoleExists(name.to_string()),
        _ => DbError::Database(err),
    }
}

async fn role_record(db: &DbPool, role: roles::Model) -> DbResult<RoleRecord> {
    let permission_ids = role_permissions::Entity::find()
        .filter(role_permissions::Column::RoleId.eq(role.id))
        .all(db)
        .await?
        .into_iter()
        .map(|link| link.permission_id)
        .collect::<Vec<_>>();
    let permissions = if permission_ids.is_empty() {
        Vec::new()
    } else {
        permissions::Entity::find()
            .filter(permissions::Column::Id.is_in(permission_ids))
            .order_by_asc(permissions::Column::Resource)
            .order_by_asc(permissions::Column::Action)
            .order_by_asc(permissions::Column::Scope)
            .all(db)
            .await?
    };
    let user_count = assignment_count(db, role.id).await?;
    Ok(RoleRecord {
        role,
        permissions,
        user_count,
    })
}

async fn assignment_count<C: ConnectionTrait>(db: &C, role_id: Uuid) -> DbResult<u64> {
    Ok(user_roles::Entity::find()
        .filter(user_roles::Column::RoleId.eq(role_id))
        .count(db)
        .await?)
}

/// Diff-and-apply inside the caller's transaction. Repeating a replace is a
/// no-op.
pub(crate) async fn replace_role_permissions(
    txn: &DatabaseTransaction,
    role_id: Uuid,
    wanted: &BTreeSet<Uuid>,
) -> DbResult<()> {
    let current = role_permissions::Entity::find()
        .filter(role_permissions::Column::RoleId.eq(role_id))
        .all(txn)
        .await?
        .into_iter()
        .map(|link| link.permission_id)
        .collect::<BTreeSet<_>>();
    let removed = current.difference(wanted).copied().collect::<Vec<_>>();
    let added = wanted.difference(&current).copied().collect::<Vec<_>>();

    if !removed.is_empty() {
        role_permissions::Entity::delete_many()
            .filter(role_permissions::Column::RoleId.eq(role_id))
            .filter(role_permissions::Column::PermissionId.is_in(removed))
            .exec(txn)
            .await?;
    }
    if !added.is_empty() {
        let links = added.into_iter().map(|permission_id| role_permissions::ActiveModel {
            role_id: Set(role_id),
            permission_id: Set(permission_id),
        });
        role_permissions::Entity::insert_many(links)
            .exec_without_returning(txn)
            .await?;
    }
    Ok(())
}

async fn ensure_permissions_exist(txn: &DatabaseTransaction, wanted: &BTreeSet<Uuid>) -> DbResult<()> {
    if wanted.is_empty() {
        return Ok(());
    }
    let found = permissions::Entity::find()
        .filter(permissions::Column::Id.is_in(wanted.iter().copied()))
        .all(txn)
        .await?
        .into_iter()
        .map(|row| row.id)
        .collect::<BTreeSet<_>>();
    match wanted.difference(&found).next() {
        Some(missing) => Err(DbError::UnknownPermission(*missing)),
        None => Ok(()),
    }
}

async fn ensure_roles_exist(txn: &DatabaseTransaction, wanted: &BTreeSet<Uuid>) -> DbResult<()> {
    if wanted.is_empty() {
        return Ok(());
    }
    let found = roles::Entity::find()
        .filter(roles::Column::Id.is_in(wanted.iter().copied()))
        .all(txn)
        .await?
        .into_iter()
        .map(|row| row.id)
        .collect::<BTreeSet<_>>();
    match wanted.difference(&found).next() {
        Some(missing) => Err(DbError::RoleNotFound(*missing)),
        None => Ok(()),
    }
}

async fn ensure_user_exists(txn: &DatabaseTransaction, user_id: Uuid) -> DbResult<()> {
    users::Entity::find_by_id(user_id)
        .one(txn)
        .await?
        .map(|_| ())
        .ok_or(DbError::UserNotFound(user_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use migration::{Migrator, MigratorTrait};

    fn role_row(name: &str) -> roles::ActiveModel {
        let now = Utc::now();
        roles::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name.to_string()),
            display_name: Set(name.to_string()),
            description: Set(None),
            is_system: Set(false),
            is_active: Set(true),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        }
    }

    #[tokio::test]
    async fn unique_name_violation_reads_as_existing_role() {
        let pool = crate::connect_url("sqlite::memory:", false).await.unwrap();
        Migrator::up(&pool, None).await.unwrap();

        role_row("DESK").insert(&pool).await.unwrap();
        let err = role_row("DESK").insert(&pool).await.unwrap_err();
        assert!(matches!(
            name_conflict(err, "DESK"),
            DbError::RoleExists(name) if name == "DESK"
        ));

        let other = DbErr::Custom("disk full".into());
        assert!(matches!(name_conflict(other, "DESK"), DbError::Database(_)));
    }

    #[tokio::test]
    async fn blank_description_clears_it() {
        let pool = crate::connect_url("sqlite::memory:", false).await.unwrap();
        Migrator::up(&pool, None).await.unwrap();
        let record = create_role(
            &pool,
            NewRole {
                name: "DESK".into(),
                display_name: "Desk".into(),
                description: Some("front desk".into()),
                permission_ids: Vec::new(),
            },
        )
        .await
        .unwrap();
        assert_eq!(record.role.description.as_deref(), Some("front desk"));

        let cleared = update_role(
            &pool,
            record.role.id,
            RoleUpdate {
                description: Some("  ".into()),
                ..RoleUpdate::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(cleared.role.description, None);
    }
}
