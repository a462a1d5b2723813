//! Role assignment store: users, roles, permissions and their joins.

mod audit;
mod roles;
mod seed;
mod users;

use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};
use serde::Deserialize;
use thiserror::Error;
use uuid::Uuid;

pub use audit::{AuditAction, AuditEntry, AuditStatus, recent_audit, record_audit};
pub use roles::{
    NewRole, RoleRecord, RoleUpdate, assign_role, create_role, delete_role, find_role,
    list_permissions, list_roles, revoke_role, roles_of_user, set_user_roles, update_role,
};
pub use seed::{SeedSummary, seed_catalog};
pub use users::{
    find_active_user, find_user, find_user_by_email, load_effective_permissions, set_user_active,
    upsert_user,
};

/// Shared connection pool alias.
pub type DbPool = DatabaseConnection;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("database url missing")]
    MissingUrl,
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error("role {0} already exists")]
    RoleExists(String),
    #[error("role {0} not found")]
    RoleNotFound(Uuid),
    #[error("user {0} not found")]
    UserNotFound(Uuid),
    #[error("permission {0} not found")]
    UnknownPermission(Uuid),
    #[error("system role {0} cannot be deleted")]
    SystemRole(String),
    #[error("role {name} is assigned to {users} user(s)")]
    RoleInUse { name: String, users: u64 },
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

pub type DbResult<T> = Result<T, DbError>;

/// Environment-driven connection settings.
#[derive(Clone, Debug, Deserialize)]
pub struct DatabaseSettings {
    #[serde(default = "default_url_key")]
    env_key: String,
    #[serde(default)]
    sql_logging: bool,
}

fn default_url_key() -> String {
    "DATABASE_URL".to_string()
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self::new(default_url_key())
    }
}

impl DatabaseSettings {
    pub fn new(env_key: impl Into<String>) -> Self {
        Self {
            env_key: env_key.into(),
            sql_logging: false,
        }
    }

    pub fn from_env() -> Self {
        let mut settings = Self::default();
        settings.sql_logging = std::env::var("SQL_LOGGING")
            .map(|value| matches!(value.to_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);
        settings
    }

    pub fn database_url(&self) -> DbResult<String> {
        std::env::var(&self.env_key).map_err(|_| DbError::MissingUrl)
    }
}

pub async fn connect(settings: &DatabaseSettings) -> DbResult<DbPool> {
    let url = settings.database_url()?;
    connect_url(&url, settings.sql_logging).await
}

pub async fn connect_url(url: &str, sql_logging: bool) -> DbResult<DbPool> {
    let mut options = ConnectOptions::new(url.to_string());
    options.sqlx_logging(sql_logging);
    // Each connection to an in-memory database sees its own copy.
    if url.contains(":memory:") {
        options.max_connections(1).min_connections(1);
    }
    Ok(Database::connect(options).await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_url_is_reported() {
        let settings = DatabaseSettings::new("PLATFORM_DB_TEST_URL_THAT_IS_NOT_SET");
        assert!(matches!(settings.database_url(), Err(DbError::MissingUrl)));
    }

    #[tokio::test]
    async fn connects_to_in_memory_sqlite() {
        let pool = connect_url("sqlite::memory:", false).await.unwrap();
        assert!(pool.ping().await.is_ok());
    }
}
