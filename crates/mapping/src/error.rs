use thiserror::Error;

/// Mapping configuration error.
///
/// Raised by `assert_valid()` at startup (fatal) and by [`Mapper::map`](crate::Mapper::map)
/// when asked for a pair that was never registered.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("mapping {from} -> {to} leaves members unmapped: {}", members.join(", "))]
    UnmappedMembers {
        from: &'static str,
        to: &'static str,
        members: Vec<&'static str>,
    },

    #[error("mapping {from} -> {to} names unknown members: {}", members.join(", "))]
    UnknownMembers {
        from: &'static str,
        to: &'static str,
        members: Vec<&'static str>,
    },

    #[error("mapping {from} -> {to} is registered more than once")]
    DuplicateMap { from: &'static str, to: &'static str },

    #[error("no mapping registered for {from} -> {to}")]
    MissingMap { from: &'static str, to: &'static str },
}
