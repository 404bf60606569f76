//! Repository layer abstractions and SQLite implementations.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts per collection.
//! - Isolate SQL details from service/business orchestration.
//!
//! # Invariants
//! - Write paths validate input before SQL mutations.
//! - Repositories reject connections whose schema is not fully migrated.
//! - Cross-collection references are not checked for existence except where
//!   a contract explicitly requires it (comment author snapshot); readers
//!   treat dangling references as absent documents.

use crate::db::migrations::latest_version;
use crate::db::DbError;
use crate::model::{InvalidTransition, ValidationError};
use rusqlite::Connection;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

pub mod activity_repo;
pub mod career_repo;
pub mod comment_repo;
pub mod conversation_repo;
pub mod flashcard_repo;
pub mod friendship_repo;
pub mod note_repo;
pub mod sync_repo;
pub mod task_repo;
pub mod user_repo;

pub type RepoResult<T> = Result<T, RepoError>;

/// Generic repository error for persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    /// Field-level validation failure surfaced before any write.
    Validation(ValidationError),
    /// Illegal document status transition.
    Transition(InvalidTransition),
    /// Unique constraint violation, e.g. a duplicate friendship pair.
    Duplicate {
        collection: &'static str,
        constraint: &'static str,
    },
    /// A referenced document required by a derived computation is missing.
    ReferenceNotFound {
        collection: &'static str,
        id: Uuid,
    },
    /// Target document does not exist.
    NotFound {
        collection: &'static str,
        id: Uuid,
    },
    /// Underlying SQLite/bootstrap error.
    Db(DbError),
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    /// Required table is missing.
    MissingRequiredTable(&'static str),
    /// Required column is missing from an expected table.
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
    /// Persisted data cannot be converted to a valid read model.
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Transition(err) => write!(f, "{err}"),
            Self::Duplicate {
                collection,
                constraint,
            } => write!(f, "duplicate key in `{collection}` for constraint `{constraint}`"),
            Self::ReferenceNotFound { collection, id } => {
                write!(f, "referenced document not found in `{collection}`: {id}")
            }
            Self::NotFound { collection, id } => {
                write!(f, "document not found in `{collection}`: {id}")
            }
            Self::Db(err) => write!(f, "{err}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "repository requires table `{table}`")
            }
            Self::MissingRequiredColumn { table, column } => write!(
                f,
                "repository requires column `{column}` in table `{table}`"
            ),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Transition(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ValidationError> for RepoError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<InvalidTransition> for RepoError {
    fn from(value: InvalidTransition) -> Self {
        Self::Transition(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Current wall-clock time in epoch milliseconds.
pub fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_millis() as i64)
        .unwrap_or(0)
}

/// One table a repository depends on, with the columns it reads.
pub(crate) struct TableRequirement {
    pub table: &'static str,
    pub columns: &'static [&'static str],
}

/// Rejects connections that are not migrated to the latest schema or that
/// lack the tables/columns a repository reads.
pub(crate) fn ensure_schema(
    conn: &Connection,
    requirements: &[TableRequirement],
) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    for requirement in requirements {
        if !table_exists(conn, requirement.table)? {
            return Err(RepoError::MissingRequiredTable(requirement.table));
        }
        for column in requirement.columns {
            if !table_has_column(conn, requirement.table, column)? {
                return Err(RepoError::MissingRequiredColumn {
                    table: requirement.table,
                    column,
                });
            }
        }
    }

    Ok(())
}

/// Maps a constraint violation on insert to a semantic duplicate-key error.
pub(crate) fn map_unique_violation(
    err: rusqlite::Error,
    collection: &'static str,
    constraint: &'static str,
) -> RepoError {
    if let rusqlite::Error::SqliteFailure(ffi_err, _) = &err {
        if ffi_err.code == rusqlite::ErrorCode::ConstraintViolation {
            return RepoError::Duplicate {
                collection,
                constraint,
            };
        }
    }
    RepoError::Db(DbError::Sqlite(err))
}

pub(crate) fn parse_uuid(value: &str, context: &'static str) -> RepoResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid value `{value}` in {context}")))
}

fn table_exists(conn: &Connection, table: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> RepoResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let current: String = row.get(1)?;
        if current == column {
            return Ok(true);
        }
    }
    Ok(false)
}
