//! User repository contract and SQLite implementation.
//!
//! # Invariants
//! - `email` and `username` uniqueness is store-enforced; violations surface
//!   as `RepoError::Duplicate`.
//! - Default reads never include the password hash; callers needing it must
//!   use the explicit accessor.

use crate::model::user::{NewUser, User, UserId, UserSnapshot};
use crate::repo::{
    ensure_schema, map_unique_violation, now_ms, parse_uuid, RepoResult, TableRequirement,
};
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

const USER_SELECT_SQL: &str = "SELECT
    uuid,
    email,
    username,
    first_name,
    last_name,
    created_at
FROM users";

/// Repository interface for user identity documents.
pub trait UserRepository {
    /// Creates one user and returns its stable id.
    fn create_user(&self, user: &NewUser) -> RepoResult<UserId>;
    /// Gets one user without the password hash.
    fn get_user(&self, id: UserId) -> RepoResult<Option<User>>;
    /// Gets one user by username without the password hash.
    fn get_user_by_username(&self, username: &str) -> RepoResult<Option<User>>;
    /// Explicitly selects the stored password hash for the auth layer.
    fn get_password_hash(&self, id: UserId) -> RepoResult<Option<String>>;
    /// Replaces the stored password hash.
    fn set_password_hash(&self, id: UserId, password_hash: &str) -> RepoResult<()>;
    /// Updates profile fields; usernames of existing comments keep their
    /// original snapshot by design.
    fn update_profile(
        &self,
        id: UserId,
        username: &str,
        first_name: &str,
        last_name: &str,
    ) -> RepoResult<()>;
}

/// SQLite-backed user repository.
pub struct SqliteUserRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteUserRepository<'conn> {
    /// Constructs a repository from a migrated/ready connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_schema(
            conn,
            &[TableRequirement {
                table: "users",
                columns: &[
                    "uuid",
                    "email",
                    "username",
                    "password_hash",
                    "first_name",
                    "last_name",
                    "created_at",
                ],
            }],
        )?;
        Ok(Self { conn })
    }
}

impl UserRepository for SqliteUserRepository<'_> {
    fn create_user(&self, user: &NewUser) -> RepoResult<UserId> {
        user.validate()?;

        let uuid = Uuid::new_v4();
        self.conn
            .execute(
                "INSERT INTO users (
                    uuid,
                    email,
                    username,
                    password_hash,
                    first_name,
                    last_name,
                    created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
                params![
                    uuid.to_string(),
                    user.email.trim(),
                    user.username.as_str(),
                    user.password_hash.as_str(),
                    user.first_name.as_str(),
                    user.last_name.as_str(),
                    now_ms(),
                ],
            )
            .map_err(|err| map_unique_violation(err, "users", "email_or_username"))?;

        Ok(uuid)
    }

    fn get_user(&self, id: UserId) -> RepoResult<Option<User>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{USER_SELECT_SQL} WHERE uuid = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_user_row(row)?));
        }
        Ok(None)
    }

    fn get_user_by_username(&self, username: &str) -> RepoResult<Option<User>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{USER_SELECT_SQL} WHERE username = ?1;"))?;
        let mut rows = stmt.query([username])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_user_row(row)?));
        }
        Ok(None)
    }

    fn get_password_hash(&self, id: UserId) -> RepoResult<Option<String>> {
        let hash = self
            .conn
            .query_row(
                "SELECT password_hash FROM users WHERE uuid = ?1;",
                [id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(hash)
    }

    fn set_password_hash(&self, id: UserId, password_hash: &str) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE users SET password_hash = ?2 WHERE uuid = ?1;",
            params![id.to_string(), password_hash],
        )?;
        if changed == 0 {
            return Err(crate::repo::RepoError::NotFound {
                collection: "users",
                id,
            });
        }
        Ok(())
    }

    fn update_profile(
        &self,
        id: UserId,
        username: &str,
        first_name: &str,
        last_name: &str,
    ) -> RepoResult<()> {
        let changed = self
            .conn
            .execute(
                "UPDATE users
                 SET username = ?2, first_name = ?3, last_name = ?4
                 WHERE uuid = ?1;",
                params![id.to_string(), username, first_name, last_name],
            )
            .map_err(|err| map_unique_violation(err, "users", "username"))?;
        if changed == 0 {
            return Err(crate::repo::RepoError::NotFound {
                collection: "users",
                id,
            });
        }
        Ok(())
    }
}

/// Loads the author snapshot for comment creation; `None` if the user is
/// missing.
pub(crate) fn load_user_snapshot(
    conn: &Connection,
    user_id: UserId,
) -> RepoResult<Option<UserSnapshot>> {
    let snapshot = conn
        .query_row(
            "SELECT username, first_name, last_name FROM users WHERE uuid = ?1;",
            [user_id.to_string()],
            |row| {
                Ok(UserSnapshot {
                    username: row.get(0)?,
                    first_name: row.get(1)?,
                    last_name: row.get(2)?,
                })
            },
        )
        .optional()?;
    Ok(snapshot)
}

fn parse_user_row(row: &Row<'_>) -> RepoResult<User> {
    let uuid_text: String = row.get("uuid")?;
    Ok(User {
        uuid: parse_uuid(&uuid_text, "users.uuid")?,
        email: row.get("email")?,
        username: row.get("username")?,
        first_name: row.get("first_name")?,
        last_name: row.get("last_name")?,
        created_at: row.get("created_at")?,
    })
}
