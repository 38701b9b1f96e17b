//! SQLite-backed repository implementations.

pub mod contact;
pub mod message;
pub mod pool;
pub mod session;

use zaplink_types::error::RepositoryError;

/// Map an insert error, turning a unique-constraint violation into
/// `Conflict` so callers can treat "already exists" as success.
pub(crate) fn map_insert_error(e: sqlx::Error, constraint: &str) -> RepositoryError {
    if let sqlx::Error::Database(db) = &e {
        if db.is_unique_violation() {
            return RepositoryError::Conflict(constraint.to_string());
        }
    }
    RepositoryError::Query(e.to_string())
}
