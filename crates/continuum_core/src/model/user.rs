//! User identity model.
//!
//! # Responsibility
//! - Define the root identity record other collections reference.
//! - Validate signup input before persistence.
//!
//! # Invariants
//! - `email` and `username` are unique across the collection (store-enforced).
//! - The password hash never appears on the default read model; hashing and
//!   verification belong to the external auth layer.

use crate::model::{require_text, ValidationError};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type UserId = Uuid;

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid email regex"));
static USERNAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9_]{3,30}$").expect("valid username regex"));

/// Signup input for one user document.
///
/// `password_hash` is produced by the auth collaborator; the core stores it
/// verbatim and keeps it out of default reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub email: String,
    pub username: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
}

impl NewUser {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_text("email", &self.email)?;
        if !EMAIL_RE.is_match(self.email.trim()) {
            return Err(ValidationError::invalid(
                "email",
                format!("`{}` is not a valid email address", self.email),
            ));
        }
        require_text("username", &self.username)?;
        if !USERNAME_RE.is_match(&self.username) {
            return Err(ValidationError::invalid(
                "username",
                "expected 3-30 lowercase letters, digits or underscores",
            ));
        }
        require_text("password_hash", &self.password_hash)?;
        require_text("first_name", &self.first_name)?;
        require_text("last_name", &self.last_name)?;
        Ok(())
    }
}

/// Default read model for a user document. Excludes the password hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub uuid: UserId,
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    /// Epoch milliseconds.
    pub created_at: i64,
}

impl User {
    /// Derived display name; never persisted.
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Denormalized author profile captured into comments at creation time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSnapshot {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
}

#[cfg(test)]
mod tests {
    use super::{NewUser, User};
    use crate::model::ValidationError;
    use uuid::Uuid;

    fn valid_user() -> NewUser {
        NewUser {
            email: "alice@continuum.dev".to_string(),
            username: "alice".to_string(),
            password_hash: "$2b$10$abcdefghijklmnopqrstuv".to_string(),
            first_name: "Alice".to_string(),
            last_name: "Johnson".to_string(),
        }
    }

    #[test]
    fn valid_signup_passes_validation() {
        valid_user().validate().expect("valid input should pass");
    }

    #[test]
    fn malformed_email_is_rejected() {
        let mut user = valid_user();
        user.email = "not-an-email".to_string();
        let err = user.validate().expect_err("bad email must fail");
        assert!(matches!(
            err,
            ValidationError::InvalidValue { field: "email", .. }
        ));
    }

    #[test]
    fn username_charset_is_enforced() {
        let mut user = valid_user();
        user.username = "Alice Johnson".to_string();
        assert!(user.validate().is_err());
    }

    #[test]
    fn full_name_joins_first_and_last() {
        let user = User {
            uuid: Uuid::new_v4(),
            email: "alice@continuum.dev".to_string(),
            username: "alice".to_string(),
            first_name: "Alice".to_string(),
            last_name: "Johnson".to_string(),
            created_at: 0,
        };
        assert_eq!(user.full_name(), "Alice Johnson");
    }
}
