//! Error model shared across crates.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Result type used by store adapters (write store, event store, read store).
pub type StoreResult<T> = Result<T, StoreError>;

/// Domain-level error.
///
/// Keep this focused on deterministic business failures. Store failures belong
/// in [`StoreError`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (e.g. malformed input).
    #[error("validation failed: {0}")]
    Validation(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A requested record was not found.
    #[error("not found")]
    NotFound,
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn not_found() -> Self {
        Self::NotFound
    }
}

/// Failure reported by a backing store.
///
/// Adapters map their driver errors into this enum once, at the store boundary.
/// Callers above that boundary pass it through unchanged.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The store could not be reached (connect failure, pool timeout, closed pool).
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A statement failed inside the store.
    #[error("query failed: {0}")]
    Query(String),

    /// Applying schema changes failed.
    #[error("migration failed: {0}")]
    Migration(String),

    /// A uniqueness or concurrency constraint rejected the write.
    #[error("conflict: {0}")]
    Conflict(String),

    /// A record could not be encoded or decoded.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// The session was already released.
    #[error("unit of work already released")]
    Released,
}

impl StoreError {
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    pub fn query(msg: impl Into<String>) -> Self {
        Self::Query(msg.into())
    }

    pub fn migration(msg: impl Into<String>) -> Self {
        Self::Migration(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }
}
