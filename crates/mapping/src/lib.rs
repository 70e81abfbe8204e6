//! Object mapping: declarative type-to-type rules, validated and compiled once
//! at startup and shared by request handlers afterwards.

pub mod configuration;
pub mod error;
pub mod mapper;

pub use configuration::{MapTarget, MapperConfiguration, MappingConfiguration, TypeMapBuilder};
pub use error::ConfigurationError;
pub use mapper::Mapper;
