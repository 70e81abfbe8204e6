//! Schema-bearing stores that can report and apply pending schema changes.
//!
//! The relational write store and the relational event store are both
//! [`MigrationTarget`]s. Startup asks each one whether changes are pending and
//! migrates only when they are.

pub mod in_memory;
pub mod postgres;

use async_trait::async_trait;

use keystone_core::StoreResult;

pub use in_memory::InMemorySchema;
pub use postgres::{EVENT_STORE_MIGRATIONS, PostgresSchema, WRITE_STORE_MIGRATIONS};

#[async_trait]
pub trait MigrationTarget: Send + Sync {
    /// Human-readable store name used in logs.
    fn name(&self) -> &str;

    /// Whether the store's schema is behind what this build expects.
    async fn has_pending_changes(&self) -> StoreResult<bool>;

    /// Apply every pending change.
    async fn migrate(&self) -> StoreResult<()>;
}
