//! Read-side document storage.
//!
//! The read database holds JSON documents grouped into collections. Collections
//! are declared up front; startup asks for the ones that do not exist yet and
//! creates them (idempotently) before traffic is served.

pub mod in_memory;
pub mod postgres;

use async_trait::async_trait;
use serde_json::Value as JsonValue;

use keystone_core::StoreResult;

pub use in_memory::InMemoryDocumentStore;
pub use postgres::PostgresDocumentStore;

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Human-readable store name used in logs.
    fn name(&self) -> &str;

    /// Declared collections that do not exist yet.
    async fn missing_collections(&self) -> StoreResult<Vec<String>>;

    /// Create every declared collection that does not exist. Idempotent.
    async fn ensure_collections(&self) -> StoreResult<()>;

    /// Insert or replace a document.
    async fn put_document(&self, collection: &str, id: &str, body: JsonValue) -> StoreResult<()>;

    async fn get_document(&self, collection: &str, id: &str) -> StoreResult<Option<JsonValue>>;

    /// Returns whether a document was removed.
    async fn delete_document(&self, collection: &str, id: &str) -> StoreResult<bool>;
}
