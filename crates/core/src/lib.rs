//! `keystone-core` — shared building blocks.
//!
//! This crate contains the entity abstraction and the error model shared by the
//! write side, the read side and the startup path (no infrastructure concerns).

pub mod entity;
pub mod error;
pub mod id;

pub use entity::Entity;
pub use error::{DomainError, DomainResult, StoreError, StoreResult};
