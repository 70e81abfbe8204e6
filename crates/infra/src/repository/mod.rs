//! Write-side repositories.
//!
//! A [`UnitOfWork`] is a per-request session holding staged changes and an
//! identity map. A [`WriteRepository`] owns exactly one session and releases it
//! exactly once, either through [`WriteRepository::dispose`] or on drop.

pub mod compiled_query;
pub mod customer;
pub mod in_memory;
pub mod postgres;
pub mod unit_of_work;
pub mod write;

pub use compiled_query::CompiledQuery;
pub use in_memory::{InMemoryUnitOfWork, InMemoryUnitOfWorkFactory, MemoryTable};
pub use postgres::{PgEntity, PgUnitOfWork, PgUnitOfWorkFactory, SqlValue};
pub use unit_of_work::{ChangeSet, PendingOp, UnitOfWork, UnitOfWorkFactory};
pub use write::WriteRepository;
