use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use serde_json::Value as JsonValue;

use keystone_core::{StoreError, StoreResult};

use super::DocumentStore;

/// In-memory document store for tests/dev.
#[derive(Debug)]
pub struct InMemoryDocumentStore {
    declared: Vec<String>,
    inner: RwLock<HashMap<String, HashMap<String, JsonValue>>>,
}

impl InMemoryDocumentStore {
    pub fn new<I, S>(collections: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            declared: collections.into_iter().map(Into::into).collect(),
            inner: RwLock::new(HashMap::new()),
        }
    }

    fn poisoned() -> StoreError {
        StoreError::unavailable("document store lock poisoned")
    }

    fn missing(collection: &str) -> StoreError {
        StoreError::query(format!("collection '{collection}' does not exist"))
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    fn name(&self) -> &str {
        "read-store"
    }

    async fn missing_collections(&self) -> StoreResult<Vec<String>> {
        let map = self.inner.read().map_err(|_| Self::poisoned())?;
        Ok(self
            .declared
            .iter()
            .filter(|c| !map.contains_key(c.as_str()))
            .cloned()
            .collect())
    }

    async fn ensure_collections(&self) -> StoreResult<()> {
        let mut map = self.inner.write().map_err(|_| Self::poisoned())?;
        for c in &self.declared {
            map.entry(c.clone()).or_default();
        }
        Ok(())
    }

    async fn put_document(&self, collection: &str, id: &str, body: JsonValue) -> StoreResult<()> {
        let mut map = self.inner.write().map_err(|_| Self::poisoned())?;
        let docs = map.get_mut(collection).ok_or_else(|| Self::missing(collection))?;
        docs.insert(id.to_string(), body);
        Ok(())
    }

    async fn get_document(&self, collection: &str, id: &str) -> StoreResult<Option<JsonValue>> {
        let map = self.inner.read().map_err(|_| Self::poisoned())?;
        let docs = map.get(collection).ok_or_else(|| Self::missing(collection))?;
        Ok(docs.get(id).cloned())
    }

    async fn delete_document(&self, collection: &str, id: &str) -> StoreResult<bool> {
        let mut map = self.inner.write().map_err(|_| Self::poisoned())?;
        let docs = map.get_mut(collection).ok_or_else(|| Self::missing(collection))?;
        Ok(docs.remove(id).is_some())
    }
}
