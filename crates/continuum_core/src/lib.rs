//! Core domain logic for Continuum.
//! This crate is the single source of truth for the document data model and
//! its integrity rules: schema validation, relationship canonicalization,
//! denormalized cache maintenance and the offline sync queue lifecycle.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use config::{open_store, Environment, StoreConfig};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::{InvalidTransition, TargetRef, ValidationError};
pub use repo::{RepoError, RepoResult};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
