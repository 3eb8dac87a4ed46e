//! Repository layer abstractions and SQLite implementations.
//!
//! # Responsibility
//! - Define per-entity data access contracts used by services.
//! - Keep SQL details inside the persistence boundary.
//!
//! # Invariants
//! - Repositories borrow a connection; they never open or commit
//!   transactions themselves. Services wrap a whole operation in one
//!   `rusqlite::Transaction` and hand repositories the transaction (it
//!   derefs to `Connection`), so commit/rollback covers every write.
//! - Read paths reject invalid persisted state instead of masking it.
//! - Set-valued relations (project roster, meeting attendees) are replaced
//!   wholesale, never diffed.

use crate::db::DbError;
use thiserror::Error;

pub mod meeting_repo;
pub mod notification_repo;
pub mod project_repo;
pub mod task_repo;
pub mod user_repo;

pub type RepoResult<T> = Result<T, RepoError>;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error(transparent)]
    Db(#[from] DbError),
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: i64 },
    #[error("invalid persisted data: {0}")]
    InvalidData(String),
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl RepoError {
    pub(crate) fn not_found(entity: &'static str, id: i64) -> Self {
        Self::NotFound { entity, id }
    }
}

/// Decodes a stored enum tag, reporting the column on failure.
pub(crate) fn decode_tag<T>(
    column: &'static str,
    value: &str,
    parse: impl FnOnce(&str) -> Option<T>,
) -> RepoResult<T> {
    parse(value).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid value `{value}` in {column}"))
    })
}

/// Renders an id list for an `IN (...)` clause as positional placeholders.
pub(crate) fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

pub(crate) fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}
