//! Declarative mapping rules.
//!
//! Each rule converts a source type into a target type and declares which
//! target members it fills. `assert_valid()` checks that every member of the
//! target is either mapped or explicitly ignored, so a new field on a view type
//! fails startup instead of silently serializing a default.

use std::any::{Any, TypeId, type_name};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{Arc, OnceLock};

use crate::error::ConfigurationError;
use crate::mapper::{MapFn, Mapper};

/// A type that can be the target of a mapping rule.
pub trait MapTarget: 'static {
    /// Members a rule producing this type must account for.
    const MEMBERS: &'static [&'static str];
}

/// Startup-facing view of a mapping configuration.
pub trait MappingConfiguration: Send + Sync {
    /// Fails if any rule cannot resolve all of its target members.
    fn assert_valid(&self) -> Result<(), ConfigurationError>;

    /// Pre-build the lookup used at request time. Idempotent.
    fn compile(&self);
}

struct TypeMap {
    from: &'static str,
    to: &'static str,
    key: (TypeId, TypeId),
    target_members: &'static [&'static str],
    mapped: Vec<&'static str>,
    ignored: Vec<&'static str>,
    convert: MapFn,
}

impl TypeMap {
    fn check(&self) -> Result<(), ConfigurationError> {
        let known: HashSet<&str> = self.target_members.iter().copied().collect();

        let unknown: Vec<&'static str> = self
            .mapped
            .iter()
            .chain(self.ignored.iter())
            .copied()
            .filter(|m| !known.contains(m))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        if !unknown.is_empty() {
            return Err(ConfigurationError::UnknownMembers {
                from: self.from,
                to: self.to,
                members: unknown,
            });
        }

        let covered: HashSet<&str> = self
            .mapped
            .iter()
            .chain(self.ignored.iter())
            .copied()
            .collect();
        let unmapped: Vec<&'static str> = self
            .target_members
            .iter()
            .copied()
            .filter(|m| !covered.contains(m))
            .collect();
        if !unmapped.is_empty() {
            return Err(ConfigurationError::UnmappedMembers {
                from: self.from,
                to: self.to,
                members: unmapped,
            });
        }

        Ok(())
    }
}

/// Registry of mapping rules.
#[derive(Default)]
pub struct MapperConfiguration {
    maps: Vec<TypeMap>,
    compiled: OnceLock<Mapper>,
}

impl MapperConfiguration {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a rule converting `S` into `T`.
    ///
    /// Declare the members the closure fills with [`TypeMapBuilder::map_members`]
    /// and the ones it leaves alone with [`TypeMapBuilder::ignore`].
    pub fn create_map<S, T, F>(&mut self, convert: F) -> TypeMapBuilder<'_>
    where
        S: 'static,
        T: MapTarget,
        F: Fn(&S) -> T + Send + Sync + 'static,
    {
        // New rules invalidate anything compiled earlier.
        self.compiled = OnceLock::new();

        let convert: MapFn = Arc::new(move |source: &dyn Any| {
            source
                .downcast_ref::<S>()
                .map(|s| Box::new(convert(s)) as Box<dyn Any>)
        });

        let idx = self.maps.len();
        self.maps.push(TypeMap {
            from: type_name::<S>(),
            to: type_name::<T>(),
            key: (TypeId::of::<S>(), TypeId::of::<T>()),
            target_members: T::MEMBERS,
            mapped: Vec::new(),
            ignored: Vec::new(),
            convert,
        });

        TypeMapBuilder {
            map: &mut self.maps[idx],
        }
    }

    pub fn is_compiled(&self) -> bool {
        self.compiled.get().is_some()
    }

    /// The compiled mapper, compiling first if needed.
    pub fn mapper(&self) -> Mapper {
        self.compiled.get_or_init(|| self.build()).clone()
    }

    fn build(&self) -> Mapper {
        let maps: HashMap<(TypeId, TypeId), MapFn> = self
            .maps
            .iter()
            .map(|m| (m.key, m.convert.clone()))
            .collect();
        tracing::debug!(rules = maps.len(), "compiled mapping rules");
        Mapper::new(maps)
    }
}

impl MappingConfiguration for MapperConfiguration {
    fn assert_valid(&self) -> Result<(), ConfigurationError> {
        let mut seen = HashSet::new();
        for map in &self.maps {
            if !seen.insert(map.key) {
                return Err(ConfigurationError::DuplicateMap {
                    from: map.from,
                    to: map.to,
                });
            }
        }

        self.maps.iter().try_for_each(TypeMap::check)
    }

    fn compile(&self) {
        let _ = self.mapper();
    }
}

impl core::fmt::Debug for MapperConfiguration {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("MapperConfiguration")
            .field("maps", &self.maps.len())
            .field("compiled", &self.is_compiled())
            .finish()
    }
}

/// Declares which target members a rule fills.
pub struct TypeMapBuilder<'a> {
    map: &'a mut TypeMap,
}

impl TypeMapBuilder<'_> {
    pub fn map_members(self, members: &[&'static str]) -> Self {
        self.map.mapped.extend_from_slice(members);
        self
    }

    pub fn ignore(self, member: &'static str) -> Self {
        self.map.ignored.push(member);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Order {
        number: u32,
        total_cents: i64,
    }

    #[derive(Debug, Clone, PartialEq)]
    struct OrderSummary {
        number: String,
        total: String,
        note: Option<String>,
    }

    impl MapTarget for OrderSummary {
        const MEMBERS: &'static [&'static str] = &["number", "total", "note"];
    }

    fn summarize(o: &Order) -> OrderSummary {
        OrderSummary {
            number: format!("#{}", o.number),
            total: format!("{}.{:02}", o.total_cents / 100, o.total_cents % 100),
            note: None,
        }
    }

    fn valid_config() -> MapperConfiguration {
        let mut config = MapperConfiguration::new();
        config
            .create_map::<Order, OrderSummary, _>(summarize)
            .map_members(&["number", "total"])
            .ignore("note");
        config
    }

    #[test]
    fn fully_covered_map_is_valid() {
        assert_eq!(valid_config().assert_valid(), Ok(()));
    }

    #[test]
    fn unmapped_member_fails_validation() {
        let mut config = MapperConfiguration::new();
        config
            .create_map::<Order, OrderSummary, _>(summarize)
            .map_members(&["number"]);

        match config.assert_valid() {
            Err(ConfigurationError::UnmappedMembers { members, .. }) => {
                assert_eq!(members, vec!["total", "note"]);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn unknown_member_fails_validation() {
        let mut config = MapperConfiguration::new();
        config
            .create_map::<Order, OrderSummary, _>(summarize)
            .map_members(&["number", "total", "totl"])
            .ignore("note");

        match config.assert_valid() {
            Err(ConfigurationError::UnknownMembers { members, .. }) => {
                assert_eq!(members, vec!["totl"]);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn duplicate_map_fails_validation() {
        let mut config = valid_config();
        config
            .create_map::<Order, OrderSummary, _>(summarize)
            .map_members(&["number", "total"])
            .ignore("note");

        assert!(matches!(
            config.assert_valid(),
            Err(ConfigurationError::DuplicateMap { .. })
        ));
    }

    #[test]
    fn compile_is_idempotent_and_maps() {
        let config = valid_config();
        assert!(!config.is_compiled());

        config.compile();
        config.compile();
        assert!(config.is_compiled());

        let summary: OrderSummary = config
            .mapper()
            .map(&Order {
                number: 7,
                total_cents: 1250,
            })
            .unwrap();
        assert_eq!(summary.number, "#7");
        assert_eq!(summary.total, "12.50");
        assert_eq!(summary.note, None);
    }

    #[test]
    fn registering_after_compile_invalidates() {
        let mut config = valid_config();
        config.compile();

        config
            .create_map::<u32, OrderSummary, _>(|n| OrderSummary {
                number: n.to_string(),
                total: String::new(),
                note: None,
            })
            .map_members(&["number", "total", "note"]);

        assert!(!config.is_compiled());
        assert_eq!(config.mapper().len(), 2);
    }

    #[test]
    fn unregistered_pair_is_reported() {
        let mapper = valid_config().mapper();
        let err = mapper.map::<String, OrderSummary>(&"x".to_string()).unwrap_err();
        assert!(matches!(err, ConfigurationError::MissingMap { .. }));
    }
}
