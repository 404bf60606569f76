//! Comment repository contract and SQLite implementation.
//!
//! # Invariants
//! - The author snapshot is read and written inside the creation
//!   transaction; a missing author aborts the whole creation.
//! - Replies must reference an existing comment.
//! - Liking is idempotent per user.

use crate::model::comment::{Comment, CommentId, NewComment};
use crate::model::target::{TargetKind, TargetRef};
use crate::model::user::{UserId, UserSnapshot};
use crate::repo::user_repo::load_user_snapshot;
use crate::repo::{ensure_schema, parse_uuid, RepoError, RepoResult, TableRequirement};
use rusqlite::{params, Connection, Row};
use uuid::Uuid;

const COMMENT_SELECT_SQL: &str = "SELECT
    uuid,
    target_type,
    target_id,
    user_id,
    content,
    parent_id,
    snapshot_username,
    snapshot_first_name,
    snapshot_last_name,
    created_at
FROM comments";

/// Repository interface for comment documents.
pub trait CommentRepository {
    /// Creates one comment, capturing the author's profile snapshot in the
    /// same transaction.
    fn create_comment(&self, comment: &NewComment, now_ms: i64) -> RepoResult<CommentId>;
    /// Gets one comment with its likes.
    fn get_comment(&self, id: CommentId) -> RepoResult<Option<Comment>>;
    /// Lists comments on a target, oldest first so threads read downward.
    fn list_for_target(&self, target: &TargetRef) -> RepoResult<Vec<Comment>>;
    /// Records a like; repeating it for the same user changes nothing.
    fn like(&self, id: CommentId, user_id: UserId) -> RepoResult<()>;
    /// Removes a like if present.
    fn unlike(&self, id: CommentId, user_id: UserId) -> RepoResult<()>;
}

/// SQLite-backed comment repository.
pub struct SqliteCommentRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteCommentRepository<'conn> {
    /// Constructs a repository from a migrated/ready connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_schema(
            conn,
            &[
                TableRequirement {
                    table: "comments",
                    columns: &[
                        "uuid",
                        "target_type",
                        "target_id",
                        "user_id",
                        "content",
                        "parent_id",
                        "snapshot_username",
                        "snapshot_first_name",
                        "snapshot_last_name",
                        "created_at",
                    ],
                },
                TableRequirement {
                    table: "comment_likes",
                    columns: &["comment_uuid", "user_id"],
                },
            ],
        )?;
        Ok(Self { conn })
    }

    fn comment_exists(&self, id: CommentId) -> RepoResult<bool> {
        let mut stmt = self
            .conn
            .prepare("SELECT 1 FROM comments WHERE uuid = ?1;")?;
        Ok(stmt.exists([id.to_string()])?)
    }

    fn load_likes(&self, id: CommentId) -> RepoResult<Vec<UserId>> {
        let mut stmt = self.conn.prepare(
            "SELECT user_id FROM comment_likes WHERE comment_uuid = ?1 ORDER BY user_id ASC;",
        )?;
        let mut rows = stmt.query([id.to_string()])?;

        let mut likes = Vec::new();
        while let Some(row) = rows.next()? {
            let user_text: String = row.get(0)?;
            likes.push(parse_uuid(&user_text, "comment_likes.user_id")?);
        }
        Ok(likes)
    }
}

impl CommentRepository for SqliteCommentRepository<'_> {
    fn create_comment(&self, comment: &NewComment, now_ms: i64) -> RepoResult<CommentId> {
        comment.validate()?;

        let tx = self.conn.unchecked_transaction()?;

        // Snapshot inside the transaction so a concurrent profile edit
        // cannot slip between the read and the insert.
        let snapshot =
            load_user_snapshot(&tx, comment.user_id)?.ok_or(RepoError::ReferenceNotFound {
                collection: "users",
                id: comment.user_id,
            })?;

        if let Some(parent_id) = comment.parent_id {
            let mut stmt = tx.prepare("SELECT 1 FROM comments WHERE uuid = ?1;")?;
            if !stmt.exists([parent_id.to_string()])? {
                return Err(RepoError::ReferenceNotFound {
                    collection: "comments",
                    id: parent_id,
                });
            }
        }

        let uuid = Uuid::new_v4();
        tx.execute(
            "INSERT INTO comments (
                uuid,
                target_type,
                target_id,
                user_id,
                content,
                parent_id,
                snapshot_username,
                snapshot_first_name,
                snapshot_last_name,
                created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10);",
            params![
                uuid.to_string(),
                comment.target.kind.as_str(),
                comment.target.id.to_string(),
                comment.user_id.to_string(),
                comment.content.as_str(),
                comment.parent_id.map(|id| id.to_string()),
                snapshot.username,
                snapshot.first_name,
                snapshot.last_name,
                now_ms,
            ],
        )?;

        tx.commit()?;
        Ok(uuid)
    }

    fn get_comment(&self, id: CommentId) -> RepoResult<Option<Comment>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{COMMENT_SELECT_SQL} WHERE uuid = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        let parsed = match rows.next()? {
            Some(row) => parse_comment_row(row)?,
            None => return Ok(None),
        };
        drop(rows);
        drop(stmt);

        let likes = self.load_likes(id)?;
        Ok(Some(with_likes(parsed, likes)))
    }

    fn list_for_target(&self, target: &TargetRef) -> RepoResult<Vec<Comment>> {
        let mut stmt = self.conn.prepare(&format!(
            "{COMMENT_SELECT_SQL}
             WHERE target_type = ?1 AND target_id = ?2
             ORDER BY created_at ASC, uuid ASC;"
        ))?;
        let mut rows = stmt.query(params![target.kind.as_str(), target.id.to_string()])?;

        let mut parsed = Vec::new();
        while let Some(row) = rows.next()? {
            parsed.push(parse_comment_row(row)?);
        }
        drop(rows);
        drop(stmt);

        let mut comments = Vec::with_capacity(parsed.len());
        for comment in parsed {
            let likes = self.load_likes(comment.uuid)?;
            comments.push(with_likes(comment, likes));
        }
        Ok(comments)
    }

    fn like(&self, id: CommentId, user_id: UserId) -> RepoResult<()> {
        if !self.comment_exists(id)? {
            return Err(RepoError::NotFound {
                collection: "comments",
                id,
            });
        }
        self.conn.execute(
            "INSERT OR IGNORE INTO comment_likes (comment_uuid, user_id) VALUES (?1, ?2);",
            params![id.to_string(), user_id.to_string()],
        )?;
        Ok(())
    }

    fn unlike(&self, id: CommentId, user_id: UserId) -> RepoResult<()> {
        if !self.comment_exists(id)? {
            return Err(RepoError::NotFound {
                collection: "comments",
                id,
            });
        }
        self.conn.execute(
            "DELETE FROM comment_likes WHERE comment_uuid = ?1 AND user_id = ?2;",
            params![id.to_string(), user_id.to_string()],
        )?;
        Ok(())
    }
}

fn parse_comment_row(row: &Row<'_>) -> RepoResult<Comment> {
    let uuid_text: String = row.get("uuid")?;
    let user_text: String = row.get("user_id")?;
    let target_id_text: String = row.get("target_id")?;
    let parent_text: Option<String> = row.get("parent_id")?;

    let kind_text: String = row.get("target_type")?;
    let kind = TargetKind::parse(&kind_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid target type `{kind_text}` in comments.target_type"
        ))
    })?;

    let parent_id = match parent_text {
        Some(text) => Some(parse_uuid(&text, "comments.parent_id")?),
        None => None,
    };

    Ok(Comment {
        uuid: parse_uuid(&uuid_text, "comments.uuid")?,
        target: TargetRef {
            kind,
            id: parse_uuid(&target_id_text, "comments.target_id")?,
        },
        user_id: parse_uuid(&user_text, "comments.user_id")?,
        content: row.get("content")?,
        parent_id,
        user_snapshot: UserSnapshot {
            username: row.get("snapshot_username")?,
            first_name: row.get("snapshot_first_name")?,
            last_name: row.get("snapshot_last_name")?,
        },
        likes: Vec::new(),
        created_at: row.get("created_at")?,
    })
}

fn with_likes(mut comment: Comment, likes: Vec<UserId>) -> Comment {
    comment.likes = likes;
    comment
}
