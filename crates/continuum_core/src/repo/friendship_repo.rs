//! Friendship repository contract and SQLite implementation.
//!
//! # Invariants
//! - Pairs are canonicalized before insert, so the `(user_lo, user_hi)`
//!   unique index rejects a duplicate request in either direction.
//! - Responding is only legal while the request is `pending`; the response
//!   stamps `responded_at` in the same UPDATE.

use crate::model::friendship::{canonical_pair, Friendship, FriendshipId, FriendshipStatus};
use crate::model::user::UserId;
use crate::repo::{
    ensure_schema, map_unique_violation, parse_uuid, RepoError, RepoResult, TableRequirement,
};
use rusqlite::{params, Connection, Row};
use uuid::Uuid;

const FRIENDSHIP_SELECT_SQL: &str = "SELECT
    uuid,
    user_lo,
    user_hi,
    requested_by,
    status,
    requested_at,
    responded_at
FROM friendships";

/// Repository interface for friendship documents.
pub trait FriendshipRepository {
    /// Records a pending request between two distinct users.
    ///
    /// The pair is canonicalized first; a second request between the same
    /// two users in either direction is a duplicate.
    fn create_request(
        &self,
        requested_by: UserId,
        other: UserId,
        now_ms: i64,
    ) -> RepoResult<FriendshipId>;
    /// Gets one friendship.
    fn get_friendship(&self, id: FriendshipId) -> RepoResult<Option<Friendship>>;
    /// Gets the friendship between two users, if any, in either direction.
    fn get_between(&self, a: UserId, b: UserId) -> RepoResult<Option<Friendship>>;
    /// Applies a response to a pending request and stamps `responded_at`.
    fn respond(&self, id: FriendshipId, status: FriendshipStatus, now_ms: i64) -> RepoResult<()>;
    /// Lists all friendships a user is part of, newest request first.
    fn list_for_user(&self, user_id: UserId) -> RepoResult<Vec<Friendship>>;
    /// Ids of every user with an accepted friendship with `user_id`.
    fn accepted_friend_ids(&self, user_id: UserId) -> RepoResult<Vec<UserId>>;
}

/// SQLite-backed friendship repository.
pub struct SqliteFriendshipRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteFriendshipRepository<'conn> {
    /// Constructs a repository from a migrated/ready connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_schema(
            conn,
            &[TableRequirement {
                table: "friendships",
                columns: &[
                    "uuid",
                    "user_lo",
                    "user_hi",
                    "requested_by",
                    "status",
                    "requested_at",
                    "responded_at",
                ],
            }],
        )?;
        Ok(Self { conn })
    }
}

impl FriendshipRepository for SqliteFriendshipRepository<'_> {
    fn create_request(
        &self,
        requested_by: UserId,
        other: UserId,
        now_ms: i64,
    ) -> RepoResult<FriendshipId> {
        let (user_lo, user_hi) = canonical_pair(requested_by, other)?;

        let uuid = Uuid::new_v4();
        self.conn
            .execute(
                "INSERT INTO friendships (
                    uuid,
                    user_lo,
                    user_hi,
                    requested_by,
                    status,
                    requested_at,
                    responded_at
                ) VALUES (?1, ?2, ?3, ?4, 'pending', ?5, NULL);",
                params![
                    uuid.to_string(),
                    user_lo.to_string(),
                    user_hi.to_string(),
                    requested_by.to_string(),
                    now_ms,
                ],
            )
            .map_err(|err| map_unique_violation(err, "friendships", "user pair"))?;

        Ok(uuid)
    }

    fn get_friendship(&self, id: FriendshipId) -> RepoResult<Option<Friendship>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{FRIENDSHIP_SELECT_SQL} WHERE uuid = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_friendship_row(row)?));
        }
        Ok(None)
    }

    fn get_between(&self, a: UserId, b: UserId) -> RepoResult<Option<Friendship>> {
        let (user_lo, user_hi) = canonical_pair(a, b)?;
        let mut stmt = self.conn.prepare(&format!(
            "{FRIENDSHIP_SELECT_SQL} WHERE user_lo = ?1 AND user_hi = ?2;"
        ))?;
        let mut rows = stmt.query(params![user_lo.to_string(), user_hi.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_friendship_row(row)?));
        }
        Ok(None)
    }

    fn respond(&self, id: FriendshipId, status: FriendshipStatus, now_ms: i64) -> RepoResult<()> {
        let current = self
            .get_friendship(id)?
            .ok_or(RepoError::NotFound {
                collection: "friendships",
                id,
            })?;
        current.status.check_response(status)?;

        self.conn.execute(
            "UPDATE friendships SET status = ?2, responded_at = ?3 WHERE uuid = ?1;",
            params![id.to_string(), status.as_str(), now_ms],
        )?;
        Ok(())
    }

    fn list_for_user(&self, user_id: UserId) -> RepoResult<Vec<Friendship>> {
        let mut stmt = self.conn.prepare(&format!(
            "{FRIENDSHIP_SELECT_SQL}
             WHERE user_lo = ?1 OR user_hi = ?1
             ORDER BY requested_at DESC, uuid ASC;"
        ))?;
        let mut rows = stmt.query([user_id.to_string()])?;

        let mut friendships = Vec::new();
        while let Some(row) = rows.next()? {
            friendships.push(parse_friendship_row(row)?);
        }
        Ok(friendships)
    }

    fn accepted_friend_ids(&self, user_id: UserId) -> RepoResult<Vec<UserId>> {
        let mut stmt = self.conn.prepare(
            "SELECT user_lo, user_hi FROM friendships
             WHERE (user_lo = ?1 OR user_hi = ?1) AND status = 'accepted'
             ORDER BY user_lo ASC, user_hi ASC;",
        )?;
        let mut rows = stmt.query([user_id.to_string()])?;

        let mut friends = Vec::new();
        while let Some(row) = rows.next()? {
            let lo_text: String = row.get(0)?;
            let hi_text: String = row.get(1)?;
            let lo = parse_uuid(&lo_text, "friendships.user_lo")?;
            let hi = parse_uuid(&hi_text, "friendships.user_hi")?;
            friends.push(if lo == user_id { hi } else { lo });
        }
        Ok(friends)
    }
}

fn parse_friendship_row(row: &Row<'_>) -> RepoResult<Friendship> {
    let uuid_text: String = row.get("uuid")?;
    let lo_text: String = row.get("user_lo")?;
    let hi_text: String = row.get("user_hi")?;
    let by_text: String = row.get("requested_by")?;

    let status_text: String = row.get("status")?;
    let status = FriendshipStatus::parse(&status_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid status `{status_text}` in friendships.status"
        ))
    })?;

    Ok(Friendship {
        uuid: parse_uuid(&uuid_text, "friendships.uuid")?,
        user_lo: parse_uuid(&lo_text, "friendships.user_lo")?,
        user_hi: parse_uuid(&hi_text, "friendships.user_hi")?,
        requested_by: parse_uuid(&by_text, "friendships.requested_by")?,
        status,
        requested_at: row.get("requested_at")?,
        responded_at: row.get("responded_at")?,
    })
}
