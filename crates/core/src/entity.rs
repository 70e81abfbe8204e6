//! Entity trait: identity + the collection a record lives in.

/// Entity marker + minimal interface.
///
/// An entity is any record with a unique, value-comparable key. Stores use
/// `COLLECTION` and `KEY_FIELD` to locate it (table name and key column for
/// relational stores).
pub trait Entity: Send + Sync + 'static {
    /// Strongly-typed entity key.
    type Key: Clone + Eq + core::hash::Hash + core::fmt::Debug + Send + Sync + 'static;

    /// Collection (table) holding records of this type.
    const COLLECTION: &'static str;

    /// Field (column) holding the key.
    const KEY_FIELD: &'static str = "id";

    /// Returns the entity key.
    fn key(&self) -> &Self::Key;
}
