use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

use keystone_core::StoreResult;

use super::MigrationTarget;

/// In-memory schema stand-in.
///
/// Intended for tests/dev: reports pending changes until migrated once.
#[derive(Debug)]
pub struct InMemorySchema {
    name: String,
    migrated: AtomicBool,
}

impl InMemorySchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            migrated: AtomicBool::new(false),
        }
    }

    pub fn is_migrated(&self) -> bool {
        self.migrated.load(Ordering::Acquire)
    }
}

#[async_trait]
impl MigrationTarget for InMemorySchema {
    fn name(&self) -> &str {
        &self.name
    }

    async fn has_pending_changes(&self) -> StoreResult<bool> {
        Ok(!self.is_migrated())
    }

    async fn migrate(&self) -> StoreResult<()> {
        self.migrated.store(true, Ordering::Release);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn pending_until_migrated() {
        let schema = InMemorySchema::new("write-store");
        assert!(schema.has_pending_changes().await.unwrap());

        schema.migrate().await.unwrap();
        assert!(!schema.has_pending_changes().await.unwrap());
        assert!(schema.is_migrated());
    }
}
