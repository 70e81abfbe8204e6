//! Postgres plumbing shared by the write store, the event store and the read store.
//!
//! ## Error Mapping
//!
//! SQLx errors are mapped to `StoreError` once, here:
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError |
//! |------------|----------------------|------------|
//! | Database (unique violation) | `23505` | `Conflict` |
//! | Database (other) | Any other | `Query` |
//! | Io, Tls, PoolTimedOut, PoolClosed | N/A | `Unavailable` |
//! | ColumnDecode, Decode, ColumnNotFound | N/A | `Serialization` |
//! | Migrate | N/A | `Migration` |
//! | Other | N/A | `Query` |

use std::time::Duration;

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use keystone_core::StoreError;

const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

/// Build a pool without connecting.
///
/// Connections are opened on first use, so an unreachable database surfaces as
/// `StoreError::Unavailable` from the first store call rather than here.
pub fn connect_lazy(database_url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(ACQUIRE_TIMEOUT)
        .connect_lazy(database_url)
}

/// Map SQLx errors to StoreError.
pub fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => StoreError::Conflict(msg),
                _ => StoreError::Query(msg),
            }
        }
        sqlx::Error::Io(_) | sqlx::Error::Tls(_) | sqlx::Error::PoolTimedOut => {
            StoreError::Unavailable(format!("{} in {}", err, operation))
        }
        sqlx::Error::PoolClosed => {
            StoreError::Unavailable(format!("connection pool closed in {}", operation))
        }
        sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::Decode(_)
        | sqlx::Error::ColumnNotFound(_) => {
            StoreError::Serialization(format!("failed to decode row in {}: {}", operation, err))
        }
        sqlx::Error::Migrate(e) => StoreError::Migration(format!("{} in {}", e, operation)),
        _ => StoreError::Query(format!("sqlx error in {}: {}", operation, err)),
    }
}

/// Reject identifiers that are not plain lowercase SQL names.
///
/// Collection and column names are interpolated into statements, so only
/// `[a-z_][a-z0-9_]*` is accepted.
pub fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c == '_' || c.is_ascii_lowercase() => {}
        _ => return false,
    }
    chars.all(|c| c == '_' || c.is_ascii_lowercase() || c.is_ascii_digit())
}
