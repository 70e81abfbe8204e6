//! Postgres-backed document store.
//!
//! Each collection is a table in the read database with a text key and a JSONB
//! body:
//!
//! ```sql
//! CREATE TABLE IF NOT EXISTS <collection> (
//!     id         TEXT PRIMARY KEY,
//!     body       JSONB NOT NULL,
//!     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
//! )
//! ```
//!
//! Collection names are interpolated into statements, so only declared names
//! that pass [`is_valid_identifier`] are ever used.

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use sqlx::PgPool;
use sqlx::types::Json;
use tracing::instrument;

use keystone_core::{StoreError, StoreResult};

use super::DocumentStore;
use crate::db::{is_valid_identifier, map_sqlx_error};

#[derive(Debug, Clone)]
pub struct PostgresDocumentStore {
    pool: PgPool,
    declared: Vec<String>,
}

impl PostgresDocumentStore {
    pub fn new<I, S>(pool: PgPool, collections: I) -> StoreResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let declared: Vec<String> = collections.into_iter().map(Into::into).collect();
        if let Some(bad) = declared.iter().find(|c| !is_valid_identifier(c)) {
            return Err(StoreError::query(format!("invalid collection name '{bad}'")));
        }
        Ok(Self { pool, declared })
    }

    /// Only declared collections may be addressed.
    fn table<'a>(&self, collection: &'a str) -> StoreResult<&'a str> {
        if self.declared.iter().any(|c| c == collection) {
            Ok(collection)
        } else {
            Err(StoreError::query(format!(
                "collection '{collection}' is not declared"
            )))
        }
    }
}

#[async_trait]
impl DocumentStore for PostgresDocumentStore {
    fn name(&self) -> &str {
        "read-store"
    }

    #[instrument(skip(self), err)]
    async fn missing_collections(&self) -> StoreResult<Vec<String>> {
        let existing: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT table_name::text
            FROM information_schema.tables
            WHERE table_schema = current_schema()
              AND table_name = ANY($1)
            "#,
        )
        .bind(&self.declared)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("missing_collections", e))?;

        Ok(self
            .declared
            .iter()
            .filter(|c| !existing.contains(c))
            .cloned()
            .collect())
    }

    #[instrument(skip(self), err)]
    async fn ensure_collections(&self) -> StoreResult<()> {
        for collection in &self.declared {
            let ddl = format!(
                "CREATE TABLE IF NOT EXISTS {collection} (\
                 id TEXT PRIMARY KEY, \
                 body JSONB NOT NULL, \
                 updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW())"
            );
            sqlx::query(&ddl)
                .execute(&self.pool)
                .await
                .map_err(|e| map_sqlx_error("ensure_collections", e))?;
            tracing::debug!(collection = %collection, "collection ensured");
        }
        Ok(())
    }

    async fn put_document(&self, collection: &str, id: &str, body: JsonValue) -> StoreResult<()> {
        let table = self.table(collection)?;
        let sql = format!(
            "INSERT INTO {table} (id, body, updated_at) VALUES ($1, $2, NOW()) \
             ON CONFLICT (id) DO UPDATE SET body = EXCLUDED.body, updated_at = NOW()"
        );
        sqlx::query(&sql)
            .bind(id)
            .bind(Json(body))
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("put_document", e))?;
        Ok(())
    }

    async fn get_document(&self, collection: &str, id: &str) -> StoreResult<Option<JsonValue>> {
        let table = self.table(collection)?;
        let sql = format!("SELECT body FROM {table} WHERE id = $1");
        let row: Option<Json<JsonValue>> = sqlx::query_scalar(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_document", e))?;
        Ok(row.map(|Json(body)| body))
    }

    async fn delete_document(&self, collection: &str, id: &str) -> StoreResult<bool> {
        let table = self.table(collection)?;
        let sql = format!("DELETE FROM {table} WHERE id = $1");
        let result = sqlx::query(&sql)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_document", e))?;
        Ok(result.rows_affected() > 0)
    }
}
