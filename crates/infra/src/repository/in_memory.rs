use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use keystone_core::{Entity, StoreError, StoreResult};

use super::{ChangeSet, CompiledQuery, PendingOp, UnitOfWork, UnitOfWorkFactory};

/// In-memory table for tests/dev.
#[derive(Debug)]
pub struct MemoryTable<E: Entity> {
    rows: RwLock<HashMap<E::Key, Arc<E>>>,
}

impl<E: Entity> Default for MemoryTable<E> {
    fn default() -> Self {
        Self {
            rows: RwLock::new(HashMap::new()),
        }
    }
}

impl<E: Entity> MemoryTable<E> {
    pub fn new() -> Self {
        Self::default()
    }

    fn poisoned() -> StoreError {
        StoreError::unavailable(format!("{} table lock poisoned", E::COLLECTION))
    }

    pub fn get(&self, key: &E::Key) -> StoreResult<Option<Arc<E>>> {
        let rows = self.rows.read().map_err(|_| Self::poisoned())?;
        Ok(rows.get(key).cloned())
    }

    pub fn len(&self) -> StoreResult<usize> {
        let rows = self.rows.read().map_err(|_| Self::poisoned())?;
        Ok(rows.len())
    }

    pub fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Apply all operations or none of them.
    fn apply(&self, ops: &[(PendingOp, Arc<E>)]) -> StoreResult<usize> {
        let mut rows = self.rows.write().map_err(|_| Self::poisoned())?;
        let mut next = rows.clone();

        for (op, entity) in ops {
            let key = entity.key();
            match op {
                PendingOp::Insert => {
                    if next.contains_key(key) {
                        return Err(StoreError::conflict(format!(
                            "{} row {key:?} already exists",
                            E::COLLECTION
                        )));
                    }
                    next.insert(key.clone(), Arc::clone(entity));
                }
                PendingOp::Update => match next.get_mut(key) {
                    Some(row) => *row = Arc::clone(entity),
                    None => return Err(missing_row::<E>(key)),
                },
                PendingOp::Remove => {
                    if next.remove(key).is_none() {
                        return Err(missing_row::<E>(key));
                    }
                }
            }
        }

        *rows = next;
        Ok(ops.len())
    }
}

fn missing_row<E: Entity>(key: &E::Key) -> StoreError {
    StoreError::conflict(format!("{} row {key:?} no longer exists", E::COLLECTION))
}

/// Session over a [`MemoryTable`].
pub struct InMemoryUnitOfWork<E: Entity> {
    table: Option<Arc<MemoryTable<E>>>,
    changes: ChangeSet<E>,
}

impl<E: Entity> InMemoryUnitOfWork<E> {
    pub fn new(table: Arc<MemoryTable<E>>) -> Self {
        Self {
            table: Some(table),
            changes: ChangeSet::default(),
        }
    }

    fn table(&self) -> StoreResult<&MemoryTable<E>> {
        self.table.as_deref().ok_or(StoreError::Released)
    }
}

#[async_trait]
impl<E: Entity> UnitOfWork<E> for InMemoryUnitOfWork<E> {
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
        let table = self.table()?;
        if let Some(known) = self.changes.resolve(key) {
            return Ok(known);
        }
        tracing::trace!(sql = query.sql(), ?key, "in-memory lookup");
        match table.get(key)? {
            Some(row) => Ok(self.changes.remember(row)),
            None => Ok(None),
        }
    }

    async fn commit(&mut self) -> StoreResult<usize> {
        let applied = self.table()?.apply(self.changes.pending())?;
        self.changes.clear_pending();
        Ok(applied)
    }

    fn release(&mut self) {
        self.changes.clear();
        self.table = None;
    }
}

/// Opens [`InMemoryUnitOfWork`] sessions over one shared table.
pub struct InMemoryUnitOfWorkFactory<E: Entity> {
    table: Arc<MemoryTable<E>>,
}

impl<E: Entity> InMemoryUnitOfWorkFactory<E> {
    pub fn new(table: Arc<MemoryTable<E>>) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &Arc<MemoryTable<E>> {
        &self.table
    }
}

impl<E: Entity> UnitOfWorkFactory<E> for InMemoryUnitOfWorkFactory<E> {
    fn begin(&self) -> Box<dyn UnitOfWork<E>> {
        Box::new(InMemoryUnitOfWork::new(Arc::clone(&self.table)))
    }
}
