//! Key lookups prepared once per entity type.

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use keystone_core::{Entity, StoreError, StoreResult};

use crate::db::is_valid_identifier;

type Registry = RwLock<HashMap<TypeId, Arc<CompiledQuery>>>;

static REGISTRY: OnceLock<Registry> = OnceLock::new();

/// A prepared `SELECT ... WHERE <key> = $1` for one entity/key type pair.
#[derive(Debug, PartialEq, Eq)]
pub struct CompiledQuery {
    collection: &'static str,
    key_field: &'static str,
    sql: String,
}

impl CompiledQuery {
    /// Shared lookup for `E`, built on first use and reused afterwards.
    pub fn for_entity<E: Entity>() -> StoreResult<Arc<CompiledQuery>> {
        let registry = REGISTRY.get_or_init(Default::default);
        let type_pair = TypeId::of::<(E, E::Key)>();

        if let Some(query) = registry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&type_pair)
        {
            return Ok(Arc::clone(query));
        }

        let compiled = Arc::new(Self::compile(E::COLLECTION, E::KEY_FIELD)?);
        let mut map = registry.write().unwrap_or_else(PoisonError::into_inner);
        let query = map.entry(type_pair).or_insert(compiled);
        Ok(Arc::clone(query))
    }

    fn compile(collection: &'static str, key_field: &'static str) -> StoreResult<Self> {
        for name in [collection, key_field] {
            if !is_valid_identifier(name) {
                return Err(StoreError::query(format!("invalid identifier '{name}'")));
            }
        }
        Ok(Self {
            collection,
            key_field,
            sql: format!("SELECT * FROM {collection} WHERE {key_field} = $1"),
        })
    }

    pub fn collection(&self) -> &'static str {
        self.collection
    }

    pub fn key_field(&self) -> &'static str {
        self.key_field
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Widget {
        sku: String,
    }

    impl Entity for Widget {
        type Key = String;
        const COLLECTION: &'static str = "widgets";
        const KEY_FIELD: &'static str = "sku";

        fn key(&self) -> &String {
            &self.sku
        }
    }

    struct BadTable;

    impl Entity for BadTable {
        type Key = u32;
        const COLLECTION: &'static str = "bad table";

        fn key(&self) -> &u32 {
            &0
        }
    }

    #[test]
    fn builds_select_by_key() {
        let query = CompiledQuery::for_entity::<Widget>().unwrap();
        assert_eq!(query.sql(), "SELECT * FROM widgets WHERE sku = $1");
        assert_eq!(query.collection(), "widgets");
        assert_eq!(query.key_field(), "sku");
    }

    #[test]
    fn reuses_the_same_query_per_type_pair() {
        let first = CompiledQuery::for_entity::<Widget>().unwrap();
        let second = CompiledQuery::for_entity::<Widget>().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn rejects_unsafe_identifiers() {
        let err = CompiledQuery::for_entity::<BadTable>().unwrap_err();
        assert!(matches!(err, StoreError::Query(_)));
    }
}
