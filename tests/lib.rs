//! Fixtures for store-level integration tests.

use anyhow::{Context, Result};
use migration::{Migrator, MigratorTrait};
use platform_db::{DbPool, connect_url};

/// Fresh migrated in-memory database.
pub async fn sqlite_store() -> Result<DbPool> {
    let pool = connect_url("sqlite::memory:", false)
        .await
        .context("open sqlite")?;
    Migrator::up(&pool, None).await.context("migrate sqlite")?;
    Ok(pool)
}

/// Migrated Postgres database from `TEST_DATABASE_URL`, or `None` when unset.
pub async fn postgres_store() -> Option<Result<DbPool>> {
    let url = std::env::var("TEST_DATABASE_URL").ok()?;
    Some(
        async {
            let pool = connect_url(&url, false).await.context("open postgres")?;
            Migrator::up(&pool, None).await.context("migrate postgres")?;
            Ok(pool)
        }
        .await,
    )
}
