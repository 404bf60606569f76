//! Domain model for the Continuum document collections.
//!
//! # Responsibility
//! - Define the canonical record per collection plus its closed enums.
//! - Own field-level validation and pure status transition rules.
//!
//! # Invariants
//! - Every document is identified by a stable `Uuid`.
//! - Enum fields are closed sum types; unknown values never enter the model.
//! - Status transitions are validated here; persistence only executes them.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod activity;
pub mod application;
pub mod comment;
pub mod conversation;
pub mod flashcard;
pub mod friendship;
pub mod message;
pub mod note;
pub mod resume;
pub mod sync_queue;
pub mod target;
pub mod task;
pub mod user;

pub use target::{TargetKind, TargetRef};

/// Field-level validation failure raised before any persistence happens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A required field is empty or missing.
    MissingField { field: &'static str },
    /// A field value is malformed.
    InvalidValue { field: &'static str, message: String },
}

impl ValidationError {
    pub fn missing(field: &'static str) -> Self {
        Self::MissingField { field }
    }

    pub fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            field,
            message: message.into(),
        }
    }
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingField { field } => write!(f, "required field `{field}` is missing"),
            Self::InvalidValue { field, message } => {
                write!(f, "invalid value for field `{field}`: {message}")
            }
        }
    }
}

impl Error for ValidationError {}

/// Illegal status transition for a document with lifecycle rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidTransition {
    pub entity: &'static str,
    pub from: &'static str,
    pub to: &'static str,
}

impl Display for InvalidTransition {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "invalid {} status transition: {} -> {}",
            self.entity, self.from, self.to
        )
    }
}

impl Error for InvalidTransition {}

pub(crate) fn require_text(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::missing(field));
    }
    Ok(())
}
