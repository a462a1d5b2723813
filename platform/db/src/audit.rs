use chrono::Utc;
use entity::audit_logs;
use sea_orm::{ActiveModelTrait, ActiveValue::Set, EntityTrait, QueryOrder, QuerySelect};
use uuid::Uuid;

use crate::{DbPool, DbResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuditAction {
    AccessDenied,
    RoleCreate,
    RoleUpdate,
    RoleDelete,
    RoleAssign,
    RoleRevoke,
}

impl AuditAction {
    pub fn as_str(self) -> &'static str {
        match self {
            AuditAction::AccessDenied => "ACCESS_DENIED",
            AuditAction::RoleCreate => "ROLE_CREATE",
            AuditAction::RoleUpdate => "ROLE_UPDATE",
            AuditAction::RoleDelete => "ROLE_DELETE",
            AuditAction::RoleAssign => "ROLE_ASSIGN",
            AuditAction::RoleRevoke => "ROLE_REVOKE",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuditStatus {
    Success,
    Denied,
    Failed,
}

impl AuditStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AuditStatus::Success => "SUCCESS",
            AuditStatus::Denied => "DENIED",
            AuditStatus::Failed => "FAILED",
        }
    }
}

#[derive(Clone, Debug)]
pub struct AuditEntry {
    pub user_id: Option<Uuid>,
    pub action: AuditAction,
    pub resource: String,
    pub resource_id: Option<String>,
    pub status: AuditStatus,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub error_message: Option<String>,
}

impl AuditEntry {
    pub fn new(action: AuditAction, resource: impl Into<String>, status: AuditStatus) -> Self {
        Self {
            user_id: None,
            action,
            resource: resource.into(),
            resource_id: None,
            status,
            ip_address: None,
            user_agent: None,
            error_message: None,
        }
    }

    pub fn user(mut self, user_id: Uuid) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn resource_id(mut self, id: impl Into<String>) -> Self {
        self.resource_id = Some(id.into());
        self
    }

    pub fn client(mut self, ip_address: Option<String>, user_agent: Option<String>) -> Self {
        self.ip_address = ip_address;
        self.user_agent = user_agent;
        self
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }
}

pub async fn record_audit(db: &DbPool, entry: AuditEntry) -> DbResult<()> {
    audit_logs::ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(entry.user_id),
        action: Set(entry.action.as_str().to_string()),
        resource: Set(entry.resource),
        resource_id: Set(entry.resource_id),
        status: Set(entry.status.as_str().to_string()),
        ip_address: Set(entry.ip_address),
        user_agent: Set(entry.user_agent),
        error_message: Set(entry.error_message),
        created_at: Set(Utc::now().into()),
    }
    .insert(db)
    .await?;
    Ok(())
}

/// Most recent entries first.
pub async fn recent_audit(db: &DbPool, limit: u64) -> DbResult<Vec<audit_logs::Model>> {
    Ok(audit_logs::Entity::find()
        .order_by_desc(audit_logs::Column::CreatedAt)
        .limit(limit)
        .all(db)
        .await?)
}
