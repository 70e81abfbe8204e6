use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use keystone_core::{Entity, StoreResult};

use super::CompiledQuery;

/// A per-request write session.
///
/// Staging never fails; errors surface from `find_by_key` and `commit`.
/// `release` discards everything and makes the session unusable.
#[async_trait]
pub trait UnitOfWork<E: Entity>: Send {
    fn stage_insert(&mut self, entity: Arc<E>);

    fn stage_update(&mut self, entity: Arc<E>);

    fn stage_remove(&mut self, entity: Arc<E>);

    /// Resolve `key`, preferring instances already known to this session.
    ///
    /// A store read is remembered in the identity map but not staged.
    async fn find_by_key(
        &mut self,
        query: &CompiledQuery,
        key: &E::Key,
    ) -> StoreResult<Option<Arc<E>>>;

    /// Apply staged changes atomically. Returns the number applied.
    async fn commit(&mut self) -> StoreResult<usize>;

    fn release(&mut self);
}

#[async_trait]
impl<E, U> UnitOfWork<E> for Box<U>
where
    E: Entity,
    U: UnitOfWork<E> + ?Sized,
{
    fn stage_insert(&mut self, entity: Arc<E>) {
        (**self).stage_insert(entity)
    }

    fn stage_update(&mut self, entity: Arc<E>) {
        (**self).stage_update(entity)
    }

    fn stage_remove(&mut self, entity: Arc<E>) {
        (**self).stage_remove(entity)
    }

    async fn find_by_key(
        &mut self,
        query: &CompiledQuery,
        key: &E::Key,
    ) -> StoreResult<Option<Arc<E>>> {
        (**self).find_by_key(query, key).await
    }

    async fn commit(&mut self) -> StoreResult<usize> {
        (**self).commit().await
    }

    fn release(&mut self) {
        (**self).release()
    }
}

/// Opens sessions for one entity type.
pub trait UnitOfWorkFactory<E: Entity>: Send + Sync {
    fn begin(&self) -> Box<dyn UnitOfWork<E>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingOp {
    Insert,
    Update,
    Remove,
}

/// Staged operations plus the identity map, shared by every session kind.
#[derive(Debug)]
pub struct ChangeSet<E: Entity> {
    pending: Vec<(PendingOp, Arc<E>)>,
    /// `None` marks a key staged for removal.
    identity: HashMap<E::Key, Option<Arc<E>>>,
}

impl<E: Entity> Default for ChangeSet<E> {
    fn default() -> Self {
        Self {
            pending: Vec::new(),
            identity: HashMap::new(),
        }
    }
}

impl<E: Entity> ChangeSet<E> {
    pub fn stage(&mut self, op: PendingOp, entity: Arc<E>) {
        let tracked = match op {
            PendingOp::Remove => None,
            PendingOp::Insert | PendingOp::Update => Some(Arc::clone(&entity)),
        };
        self.identity.insert(entity.key().clone(), tracked);
        self.pending.push((op, entity));
    }

    /// `Some` when this session already knows the answer for `key`.
    pub fn resolve(&self, key: &E::Key) -> Option<Option<Arc<E>>> {
        self.identity.get(key).cloned()
    }

    /// Record a store read, keeping any instance that got there first.
    pub fn remember(&mut self, entity: Arc<E>) -> Option<Arc<E>> {
        self.identity
            .entry(entity.key().clone())
            .or_insert(Some(entity))
            .clone()
    }

    pub fn pending(&self) -> &[(PendingOp, Arc<E>)] {
        &self.pending
    }

    pub fn clear_pending(&mut self) {
        self.pending.clear();
    }

    pub fn clear(&mut self) {
        self.pending.clear();
        self.identity.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
