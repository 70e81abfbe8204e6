use std::any::{Any, TypeId, type_name};
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::ConfigurationError;

pub(crate) type MapFn = Arc<dyn Fn(&dyn Any) -> Option<Box<dyn Any>> + Send + Sync>;

/// Compiled, immutable lookup of registered conversions.
///
/// Cheap to clone; handlers hold one and call [`Mapper::map`] per request.
#[derive(Clone, Default)]
pub struct Mapper {
    maps: Arc<HashMap<(TypeId, TypeId), MapFn>>,
}

impl Mapper {
    pub(crate) fn new(maps: HashMap<(TypeId, TypeId), MapFn>) -> Self {
        Self {
            maps: Arc::new(maps),
        }
    }

    /// Number of compiled conversions.
    pub fn len(&self) -> usize {
        self.maps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.maps.is_empty()
    }

    /// Convert `source` into `T` using the registered rule for `S -> T`.
    pub fn map<S: 'static, T: 'static>(&self, source: &S) -> Result<T, ConfigurationError> {
        let missing = || ConfigurationError::MissingMap {
            from: type_name::<S>(),
            to: type_name::<T>(),
        };

        let convert = self
            .maps
            .get(&(TypeId::of::<S>(), TypeId::of::<T>()))
            .ok_or_else(missing)?;

        convert(source as &dyn Any)
            .and_then(|out| out.downcast::<T>().ok())
            .map(|out| *out)
            .ok_or_else(missing)
    }
}

impl core::fmt::Debug for Mapper {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Mapper").field("maps", &self.maps.len()).finish()
    }
}
