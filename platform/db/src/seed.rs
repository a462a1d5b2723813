use std::collections::{BTreeSet, HashMap};

use chrono::Utc;
use entity::{permissions, roles};
use platform_authz::{
    catalog::{ACTION_MANAGE, SCOPE_ALL, SEEDED_ACTIONS},
    catalog_entry, catalog_keys, system_roles,
};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, EntityTrait, IntoActiveModel, QueryFilter,
    TransactionTrait,
};
use tracing::info;
use uuid::Uuid;

use crate::{DbPool, DbResult, roles::replace_role_permissions};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SeedSummary {
    pub permissions_created: usize,
    /// Existing rows whose missing description was filled in.
    pub permissions_described: usize,
    pub roles_created: usize,
}

/// Inserts missing catalog permissions and system roles.
///
/// Safe to rerun. A system role's permission set is only written when the
/// role is created, so later administrator edits survive reseeding.
pub async fn seed_catalog(db: &DbPool) -> DbResult<SeedSummary> {
    let txn = db.begin().await?;
    let mut summary = SeedSummary::default();

    let mut existing = permissions::Entity::find()
        .all(&txn)
        .await?
        .into_iter()
        .map(|row| ((row.resource.clone(), row.action.clone(), row.scope.clone()), row))
        .collect::<HashMap<_, _>>();
    let mut known = HashMap::new();

    for key in catalog_keys() {
        let description = catalog_entry(key).map(|entry| entry.description.to_string());
        for action in SEEDED_ACTIONS {
            let triple = (key.to_string(), action.to_string(), SCOPE_ALL.to_string());
            if let Some(row) = existing.remove(&triple) {
                known.insert(triple, row.id);
                if row.description.is_none() && description.is_some() {
                    let mut active = row.into_active_model();
                    active.description = Set(description.clone());
                    active.update(&txn).await?;
                    summary.permissions_described += 1;
                }
                continue;
            }
            let id = Uuid::new_v4();
            permissions::ActiveModel {
                id: Set(id),
                resource: Set(triple.0.clone()),
                action: Set(triple.1.clone()),
                scope: Set(triple.2.clone()),
                description: Set(description.clone()),
            }
            .insert(&txn)
            .await?;
            known.insert(triple, id);
            summary.permissions_created += 1;
        }
    }

    for bundle in system_roles() {
        let existing = roles::Entity::find()
            .filter(roles::Column::Name.eq(bundle.name))
            .one(&txn)
            .await?;
        if let Some(role) = existing {
            if !role.is_system {
                let mut active = role.into_active_model();
                active.is_system = Set(true);
                active.update(&txn).await?;
            }
            continue;
        }

        let now = Utc::now();
        let role = roles::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(bundle.name.to_string()),
            display_name: Set(bundle.display_name.to_string()),
            description: Set(Some(bundle.description.to_string())),
            is_system: Set(true),
            is_active: Set(true),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        }
        .insert(&txn)
        .await?;

        let grants = bundle
            .resource_keys
            .iter()
            .filter_map(|key| {
                known
                    .get(&(key.to_string(), ACTION_MANAGE.to_string(), SCOPE_ALL.to_string()))
                    .copied()
            })
            .collect::<BTreeSet<_>>();
        replace_role_permissions(&txn, role.id, &grants).await?;
        summary.roles_created += 1;
    }

    txn.commit().await?;
    info!(
        permissions = summary.permissions_created,
        described = summary.permissions_described,
        roles = summary.roles_created,
        "permission catalog seeded"
    );
    Ok(summary)
}
