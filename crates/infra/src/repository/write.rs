use std::marker::PhantomData;
use std::sync::Arc;

use keystone_core::{Entity, StoreError, StoreResult};

use super::{CompiledQuery, UnitOfWork};

/// Generic write-side repository over one exclusively owned unit of work.
///
/// Staging calls forward to the session and never fail. `get_by_id` returns
/// store errors unchanged. The session is released exactly once: by
/// [`dispose`](Self::dispose) or, failing that, on drop.
///
/// The repository never commits; the owning scope does so through
/// [`unit_of_work_mut`](Self::unit_of_work_mut).
pub struct WriteRepository<E: Entity, U: UnitOfWork<E>> {
    unit_of_work: U,
    disposed: bool,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity, U: UnitOfWork<E>> WriteRepository<E, U> {
    pub fn new(unit_of_work: U) -> Self {
        Self {
            unit_of_work,
            disposed: false,
            _entity: PhantomData,
        }
    }

    pub fn add(&mut self, entity: impl Into<Arc<E>>) {
        if self.ignored("add") {
            return;
        }
        self.unit_of_work.stage_insert(entity.into());
    }

    pub fn update(&mut self, entity: impl Into<Arc<E>>) {
        if self.ignored("update") {
            return;
        }
        self.unit_of_work.stage_update(entity.into());
    }

    pub fn remove(&mut self, entity: impl Into<Arc<E>>) {
        if self.ignored("remove") {
            return;
        }
        self.unit_of_work.stage_remove(entity.into());
    }

    /// Fetch by key without staging the result.
    ///
    /// An instance already staged or read in this unit of work is returned
    /// as-is, so repeated calls for one key yield the same `Arc`.
    pub async fn get_by_id(&mut self, key: &E::Key) -> StoreResult<Option<Arc<E>>> {
        if self.disposed {
            return Err(StoreError::Released);
        }
        let query = CompiledQuery::for_entity::<E>()?;
        self.unit_of_work.find_by_key(&query, key).await
    }

    pub fn unit_of_work_mut(&mut self) -> &mut U {
        &mut self.unit_of_work
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Release the unit of work. Further calls are no-ops.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        self.unit_of_work.release();
        tracing::trace!(collection = E::COLLECTION, "write repository disposed");
    }

    fn ignored(&self, operation: &str) -> bool {
        if self.disposed {
            tracing::warn!(
                collection = E::COLLECTION,
                operation,
                "staging on a disposed repository ignored"
            );
        }
        self.disposed
    }
}

impl<E: Entity, U: UnitOfWork<E>> Drop for WriteRepository<E, U> {
    fn drop(&mut self) {
        self.dispose();
    }
}
