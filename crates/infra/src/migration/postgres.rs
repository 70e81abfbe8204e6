//! Postgres-backed migration targets.
//!
//! Migrations are embedded at build time with `sqlx::migrate!` and recorded by
//! sqlx in `_sqlx_migrations`. A target has pending changes when an embedded
//! up-migration has no successful row in that table.

use std::collections::HashSet;

use async_trait::async_trait;
use sqlx::PgPool;
use sqlx::migrate::{MigrateError, Migrator};
use tracing::instrument;

use keystone_core::{StoreError, StoreResult};

use super::MigrationTarget;
use crate::db::map_sqlx_error;

/// Schema of the relational write store.
pub static WRITE_STORE_MIGRATIONS: Migrator = sqlx::migrate!("./migrations/write");

/// Schema of the relational event store.
pub static EVENT_STORE_MIGRATIONS: Migrator = sqlx::migrate!("./migrations/event_store");

/// A Postgres database paired with the migrations it should be at.
#[derive(Debug, Clone)]
pub struct PostgresSchema {
    name: String,
    pool: PgPool,
    migrator: &'static Migrator,
}

impl PostgresSchema {
    pub fn new(name: impl Into<String>, pool: PgPool, migrator: &'static Migrator) -> Self {
        Self {
            name: name.into(),
            pool,
            migrator,
        }
    }

    /// Versions recorded as successfully applied (empty if sqlx never ran here).
    async fn applied_versions(&self) -> StoreResult<HashSet<i64>> {
        let tracked: bool =
            sqlx::query_scalar("SELECT to_regclass('_sqlx_migrations') IS NOT NULL")
                .fetch_one(&self.pool)
                .await
                .map_err(|e| map_sqlx_error("check_migrations_table", e))?;

        if !tracked {
            return Ok(HashSet::new());
        }

        let versions: Vec<i64> =
            sqlx::query_scalar("SELECT version FROM _sqlx_migrations WHERE success")
                .fetch_all(&self.pool)
                .await
                .map_err(|e| map_sqlx_error("list_applied_migrations", e))?;

        Ok(versions.into_iter().collect())
    }
}

/// Embedded up-migrations missing from `applied`, in version order.
fn pending_versions(migrator: &Migrator, applied: &HashSet<i64>) -> Vec<i64> {
    let mut pending: Vec<i64> = migrator
        .iter()
        .filter(|m| !m.migration_type.is_down_migration())
        .map(|m| m.version)
        .filter(|v| !applied.contains(v))
        .collect();
    pending.sort_unstable();
    pending
}

#[async_trait]
impl MigrationTarget for PostgresSchema {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(skip(self), fields(store = %self.name), err)]
    async fn has_pending_changes(&self) -> StoreResult<bool> {
        let applied = self.applied_versions().await?;
        let pending = pending_versions(self.migrator, &applied);
        tracing::debug!(?pending, "compared embedded migrations with applied versions");
        Ok(!pending.is_empty())
    }

    #[instrument(skip(self), fields(store = %self.name), err)]
    async fn migrate(&self) -> StoreResult<()> {
        self.migrator.run(&self.pool).await.map_err(|e| match e {
            MigrateError::Execute(err) => map_sqlx_error("migrate", err),
            other => StoreError::migration(format!("{}: {}", self.name, other)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn everything_is_pending_on_a_fresh_database() {
        let pending = pending_versions(&WRITE_STORE_MIGRATIONS, &HashSet::new());
        assert_eq!(pending, vec![20240101000000]);

        let pending = pending_versions(&EVENT_STORE_MIGRATIONS, &HashSet::new());
        assert_eq!(pending, vec![20240101000000, 20240101000100]);
    }

    #[test]
    fn applied_versions_are_not_pending() {
        let applied: HashSet<i64> = [20240101000000].into_iter().collect();
        assert_eq!(
            pending_versions(&EVENT_STORE_MIGRATIONS, &applied),
            vec![20240101000100]
        );
        assert!(pending_versions(&WRITE_STORE_MIGRATIONS, &applied).is_empty());
    }
}
