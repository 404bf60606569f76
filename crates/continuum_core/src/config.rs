//! Store configuration and lifecycle.
//!
//! # Responsibility
//! - Resolve store location and runtime environment from the process
//!   environment.
//! - Open the store with environment-appropriate failure behavior.
//!
//! # Invariants
//! - Production treats store-open failure as fatal: the error propagates.
//! - Development falls back to an in-memory store so health checks can run
//!   against a degraded process; the fallback is always logged.

use crate::db::{open_db, open_db_in_memory, DbResult};
use log::{info, warn};
use rusqlite::Connection;
use std::path::PathBuf;

const ENV_DB_PATH: &str = "CONTINUUM_DB_PATH";
const ENV_ENVIRONMENT: &str = "CONTINUUM_ENV";

/// Runtime environment the store is opened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    /// Parses an environment name; unknown values map to `Development`.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            _ => Self::Development,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
        }
    }
}

/// Explicit store handle configuration, constructed at process start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Database file path; `None` selects an in-memory store.
    pub db_path: Option<PathBuf>,
    pub environment: Environment,
}

impl StoreConfig {
    /// Builds a config for an in-memory store.
    pub fn in_memory(environment: Environment) -> Self {
        Self {
            db_path: None,
            environment,
        }
    }

    /// Builds a config for a file-backed store.
    pub fn file(path: impl Into<PathBuf>, environment: Environment) -> Self {
        Self {
            db_path: Some(path.into()),
            environment,
        }
    }

    /// Reads `CONTINUUM_DB_PATH` and `CONTINUUM_ENV` from the process
    /// environment. A missing path selects an in-memory store; a missing or
    /// unknown environment defaults to development.
    pub fn from_env() -> Self {
        let db_path = std::env::var(ENV_DB_PATH)
            .ok()
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from);
        let environment = std::env::var(ENV_ENVIRONMENT)
            .map(|value| Environment::parse(&value))
            .unwrap_or(Environment::Development);
        Self {
            db_path,
            environment,
        }
    }
}

/// Opens the store described by `config` and returns a migrated connection.
///
/// # Errors
/// - In production, any open/bootstrap failure is returned to the caller.
/// - In development, a file-open failure degrades to an in-memory store.
pub fn open_store(config: &StoreConfig) -> DbResult<Connection> {
    let env = config.environment.as_str();
    match config.db_path.as_deref() {
        None => {
            info!("event=store_open module=config status=start env={env} mode=memory");
            open_db_in_memory()
        }
        Some(path) => {
            info!(
                "event=store_open module=config status=start env={env} mode=file path={}",
                path.display()
            );
            match open_db(path) {
                Ok(conn) => Ok(conn),
                Err(err) if config.environment == Environment::Development => {
                    warn!(
                        "event=store_open module=config status=degraded env={env} error={err} fallback=memory"
                    );
                    open_db_in_memory()
                }
                Err(err) => Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{open_store, Environment, StoreConfig};

    #[test]
    fn parse_maps_unknown_environment_to_development() {
        assert_eq!(Environment::parse("production"), Environment::Production);
        assert_eq!(Environment::parse(" PROD "), Environment::Production);
        assert_eq!(Environment::parse("staging"), Environment::Development);
        assert_eq!(Environment::parse(""), Environment::Development);
    }

    #[test]
    fn open_store_in_memory_succeeds() {
        let config = StoreConfig::in_memory(Environment::Development);
        let conn = open_store(&config).expect("in-memory store should open");
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'users';",
                [],
                |row| row.get(0),
            )
            .expect("schema query should succeed");
        assert_eq!(count, 1);
    }

    #[test]
    fn development_open_degrades_to_memory_on_bad_path() {
        let config = StoreConfig::file(
            "/nonexistent-continuum-dir/store.db",
            Environment::Development,
        );
        let conn = open_store(&config).expect("development open should degrade, not fail");
        assert!(conn.is_autocommit());
    }

    #[test]
    fn production_open_fails_on_bad_path() {
        let config = StoreConfig::file(
            "/nonexistent-continuum-dir/store.db",
            Environment::Production,
        );
        assert!(open_store(&config).is_err());
    }
}
