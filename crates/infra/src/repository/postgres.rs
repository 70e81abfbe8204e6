//! Postgres-backed sessions.
//!
//! Entities describe their row layout through [`PgEntity`]. Statements are
//! built from `COLLECTION`, `KEY_FIELD` and `COLUMNS`; the key column must come
//! first in `COLUMNS`. A commit runs every staged statement in one transaction.

use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::Query;
use sqlx::{PgPool, Postgres};
use tracing::instrument;
use uuid::Uuid;

use keystone_core::{Entity, StoreError, StoreResult};

use super::{ChangeSet, CompiledQuery, PendingOp, UnitOfWork, UnitOfWorkFactory};
use crate::db::map_sqlx_error;

/// A column value bound into a statement.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Uuid(Uuid),
    Text(String),
    Int(i64),
    Bool(bool),
    Timestamp(DateTime<Utc>),
}

fn bind_value<'q>(
    query: Query<'q, Postgres, PgArguments>,
    value: SqlValue,
) -> Query<'q, Postgres, PgArguments> {
    match value {
        SqlValue::Uuid(v) => query.bind(v),
        SqlValue::Text(v) => query.bind(v),
        SqlValue::Int(v) => query.bind(v),
        SqlValue::Bool(v) => query.bind(v),
        SqlValue::Timestamp(v) => query.bind(v),
    }
}

/// Row mapping for an entity stored in a Postgres table.
pub trait PgEntity: Entity + Sized {
    /// Column names, key column first.
    const COLUMNS: &'static [&'static str];

    /// Column values in `COLUMNS` order.
    fn values(&self) -> Vec<SqlValue>;

    fn key_value(key: &Self::Key) -> SqlValue;

    fn from_row(row: &PgRow) -> Result<Self, sqlx::Error>;
}

fn insert_sql<E: PgEntity>() -> String {
    let placeholders: Vec<String> = (1..=E::COLUMNS.len()).map(|i| format!("${i}")).collect();
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        E::COLLECTION,
        E::COLUMNS.join(", "),
        placeholders.join(", ")
    )
}

fn update_sql<E: PgEntity>() -> String {
    let assignments: Vec<String> = E::COLUMNS
        .iter()
        .enumerate()
        .skip(1)
        .map(|(i, column)| format!("{column} = ${}", i + 1))
        .collect();
    format!(
        "UPDATE {} SET {} WHERE {} = $1",
        E::COLLECTION,
        assignments.join(", "),
        E::KEY_FIELD
    )
}

fn delete_sql<E: PgEntity>() -> String {
    format!("DELETE FROM {} WHERE {} = $1", E::COLLECTION, E::KEY_FIELD)
}

/// Session over one Postgres pool.
pub struct PgUnitOfWork<E: PgEntity> {
    pool: Option<PgPool>,
    changes: ChangeSet<E>,
}

impl<E: PgEntity> PgUnitOfWork<E> {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Some(pool),
            changes: ChangeSet::default(),
        }
    }

    fn pool(&self) -> StoreResult<&PgPool> {
        self.pool.as_ref().ok_or(StoreError::Released)
    }
}

#[async_trait]
impl<E: PgEntity> UnitOfWork<E> for PgUnitOfWork<E> {
    fn stage_insert(&mut self, entity: Arc<E>) {
        self.changes.stage(PendingOp::Insert, entity);
    }

    fn stage_update(&mut self, entity: Arc<E>) {
        self.changes.stage(PendingOp::Update, entity);
    }

    fn stage_remove(&mut self, entity: Arc<E>) {
        self.changes.stage(PendingOp::Remove, entity);
    }

    async fn find_by_key(
        &mut self,
        query: &CompiledQuery,
        key: &E::Key,
    ) -> StoreResult<Option<Arc<E>>> {
        let pool = self.pool()?.clone();
        if let Some(known) = self.changes.resolve(key) {
            return Ok(known);
        }

        let row = bind_value(sqlx::query(query.sql()), E::key_value(key))
            .fetch_optional(&pool)
            .await
            .map_err(|e| map_sqlx_error("find_by_key", e))?;

        match row {
            Some(row) => {
                let entity = E::from_row(&row).map_err(|e| map_sqlx_error("find_by_key", e))?;
                Ok(self.changes.remember(Arc::new(entity)))
            }
            None => Ok(None),
        }
    }

    #[instrument(skip(self), fields(collection = E::COLLECTION), err)]
    async fn commit(&mut self) -> StoreResult<usize> {
        let pool = self.pool()?.clone();
        if self.changes.is_empty() {
            return Ok(0);
        }

        let mut tx = pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin", e))?;

        for (op, entity) in self.changes.pending() {
            let (sql, values) = match op {
                PendingOp::Insert => (insert_sql::<E>(), entity.values()),
                PendingOp::Update => (update_sql::<E>(), entity.values()),
                PendingOp::Remove => (delete_sql::<E>(), vec![E::key_value(entity.key())]),
            };

            let query = values.into_iter().fold(sqlx::query(&sql), bind_value);
            let result = query
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("commit", e))?;

            if *op != PendingOp::Insert && result.rows_affected() == 0 {
                return Err(StoreError::conflict(format!(
                    "{} row {:?} no longer exists",
                    E::COLLECTION,
                    entity.key()
                )));
            }
        }

        tx.commit().await.map_err(|e| map_sqlx_error("commit", e))?;

        let applied = self.changes.pending().len();
        self.changes.clear_pending();
        tracing::debug!(applied, "unit of work committed");
        Ok(applied)
    }

    fn release(&mut self) {
        self.changes.clear();
        self.pool = None;
    }
}

/// Opens [`PgUnitOfWork`] sessions on a shared pool.
pub struct PgUnitOfWorkFactory<E: PgEntity> {
    pool: PgPool,
    _entity: PhantomData<fn() -> E>,
}

impl<E: PgEntity> PgUnitOfWorkFactory<E> {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            _entity: PhantomData,
        }
    }
}

impl<E: PgEntity> UnitOfWorkFactory<E> for PgUnitOfWorkFactory<E> {
    fn begin(&self) -> Box<dyn UnitOfWork<E>> {
        Box::new(PgUnitOfWork::<E>::new(self.pool.clone()))
    }
}
