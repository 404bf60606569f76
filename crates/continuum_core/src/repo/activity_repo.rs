//! Activity repository contract and SQLite implementation.
//!
//! # Invariants
//! - Visibility fan-out is written with the activity in one transaction.
//! - The 90-day TTL is enforced on every read path with a `created_at`
//!   window, and expired rows are physically purged on the write path. An
//!   embedded store has no background expiry task, so both halves are
//!   needed for the Mongo-style "gone after 90 days" behavior.

use crate::model::activity::{
    is_expired, Activity, ActivityId, ActivityType, NewActivity, ACTIVITY_TTL_SECONDS,
};
use crate::model::target::{TargetKind, TargetRef};
use crate::model::user::UserId;
use crate::repo::{ensure_schema, parse_uuid, RepoError, RepoResult, TableRequirement};
use rusqlite::{params, Connection, Row};
use uuid::Uuid;

const ACTIVITY_SELECT_SQL: &str = "SELECT
    uuid,
    user_id,
    activity_type,
    target_type,
    target_id,
    metadata,
    created_at
FROM activities";

fn ttl_floor(now_ms: i64) -> i64 {
    now_ms - ACTIVITY_TTL_SECONDS * 1_000
}

/// Repository interface for activity feed documents.
pub trait ActivityRepository {
    /// Records one activity with its visibility fan-out, and purges rows
    /// past their TTL as a side effect.
    fn record(
        &self,
        activity: &NewActivity,
        visible_to: &[UserId],
        now_ms: i64,
    ) -> RepoResult<ActivityId>;
    /// Gets one activity unless it has expired.
    fn get_activity(&self, id: ActivityId, now_ms: i64) -> RepoResult<Option<Activity>>;
    /// Unexpired activities visible to `viewer_id`, newest first.
    fn feed_for(&self, viewer_id: UserId, now_ms: i64) -> RepoResult<Vec<Activity>>;
    /// Unexpired activities performed by `user_id`, newest first.
    fn acted_by(&self, user_id: UserId, now_ms: i64) -> RepoResult<Vec<Activity>>;
    /// Deletes rows past their TTL; returns how many were removed.
    fn purge_expired(&self, now_ms: i64) -> RepoResult<usize>;
}

/// SQLite-backed activity repository.
pub struct SqliteActivityRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteActivityRepository<'conn> {
    /// Constructs a repository from a migrated/ready connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_schema(
            conn,
            &[
                TableRequirement {
                    table: "activities",
                    columns: &[
                        "uuid",
                        "user_id",
                        "activity_type",
                        "target_type",
                        "target_id",
                        "metadata",
                        "created_at",
                    ],
                },
                TableRequirement {
                    table: "activity_visibility",
                    columns: &["activity_uuid", "viewer_id"],
                },
            ],
        )?;
        Ok(Self { conn })
    }

    fn load_visible_to(&self, id: ActivityId) -> RepoResult<Vec<UserId>> {
        let mut stmt = self.conn.prepare(
            "SELECT viewer_id FROM activity_visibility
             WHERE activity_uuid = ?1 ORDER BY viewer_id ASC;",
        )?;
        let mut rows = stmt.query([id.to_string()])?;

        let mut viewers = Vec::new();
        while let Some(row) = rows.next()? {
            let viewer_text: String = row.get(0)?;
            viewers.push(parse_uuid(&viewer_text, "activity_visibility.viewer_id")?);
        }
        Ok(viewers)
    }

    fn attach_visibility(&self, parsed: Vec<Activity>) -> RepoResult<Vec<Activity>> {
        let mut activities = Vec::with_capacity(parsed.len());
        for mut activity in parsed {
            activity.visible_to = self.load_visible_to(activity.uuid)?;
            activities.push(activity);
        }
        Ok(activities)
    }
}

impl ActivityRepository for SqliteActivityRepository<'_> {
    fn record(
        &self,
        activity: &NewActivity,
        visible_to: &[UserId],
        now_ms: i64,
    ) -> RepoResult<ActivityId> {
        let tx = self.conn.unchecked_transaction()?;

        tx.execute(
            "DELETE FROM activity_visibility WHERE activity_uuid IN
               (SELECT uuid FROM activities WHERE created_at < ?1);",
            [ttl_floor(now_ms)],
        )?;
        tx.execute(
            "DELETE FROM activities WHERE created_at < ?1;",
            [ttl_floor(now_ms)],
        )?;

        let metadata_text = match &activity.metadata {
            Some(value) => Some(serde_json::to_string(value).map_err(|err| {
                RepoError::InvalidData(format!("unserializable activity metadata: {err}"))
            })?),
            None => None,
        };

        let uuid = Uuid::new_v4();
        tx.execute(
            "INSERT INTO activities (
                uuid,
                user_id,
                activity_type,
                target_type,
                target_id,
                metadata,
                created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
            params![
                uuid.to_string(),
                activity.user_id.to_string(),
                activity.activity_type.as_str(),
                activity.target.kind.as_str(),
                activity.target.id.to_string(),
                metadata_text,
                now_ms,
            ],
        )?;

        for viewer in visible_to {
            tx.execute(
                "INSERT OR IGNORE INTO activity_visibility (activity_uuid, viewer_id)
                 VALUES (?1, ?2);",
                params![uuid.to_string(), viewer.to_string()],
            )?;
        }

        tx.commit()?;
        Ok(uuid)
    }

    fn get_activity(&self, id: ActivityId, now_ms: i64) -> RepoResult<Option<Activity>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{ACTIVITY_SELECT_SQL} WHERE uuid = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        let parsed = match rows.next()? {
            Some(row) => parse_activity_row(row)?,
            None => return Ok(None),
        };
        drop(rows);
        drop(stmt);

        if is_expired(parsed.created_at, now_ms) {
            return Ok(None);
        }

        let mut activity = parsed;
        activity.visible_to = self.load_visible_to(id)?;
        Ok(Some(activity))
    }

    fn feed_for(&self, viewer_id: UserId, now_ms: i64) -> RepoResult<Vec<Activity>> {
        let mut stmt = self.conn.prepare(&format!(
            "{ACTIVITY_SELECT_SQL}
             WHERE created_at >= ?2
               AND uuid IN
                 (SELECT activity_uuid FROM activity_visibility WHERE viewer_id = ?1)
             ORDER BY created_at DESC, uuid ASC;"
        ))?;
        let mut rows = stmt.query(params![viewer_id.to_string(), ttl_floor(now_ms)])?;

        let mut parsed = Vec::new();
        while let Some(row) = rows.next()? {
            parsed.push(parse_activity_row(row)?);
        }
        drop(rows);
        drop(stmt);

        self.attach_visibility(parsed)
    }

    fn acted_by(&self, user_id: UserId, now_ms: i64) -> RepoResult<Vec<Activity>> {
        let mut stmt = self.conn.prepare(&format!(
            "{ACTIVITY_SELECT_SQL}
             WHERE user_id = ?1 AND created_at >= ?2
             ORDER BY created_at DESC, uuid ASC;"
        ))?;
        let mut rows = stmt.query(params![user_id.to_string(), ttl_floor(now_ms)])?;

        let mut parsed = Vec::new();
        while let Some(row) = rows.next()? {
            parsed.push(parse_activity_row(row)?);
        }
        drop(rows);
        drop(stmt);

        self.attach_visibility(parsed)
    }

    fn purge_expired(&self, now_ms: i64) -> RepoResult<usize> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "DELETE FROM activity_visibility WHERE activity_uuid IN
               (SELECT uuid FROM activities WHERE created_at < ?1);",
            [ttl_floor(now_ms)],
        )?;
        let removed = tx.execute(
            "DELETE FROM activities WHERE created_at < ?1;",
            [ttl_floor(now_ms)],
        )?;
        tx.commit()?;
        Ok(removed)
    }
}

fn parse_activity_row(row: &Row<'_>) -> RepoResult<Activity> {
    let uuid_text: String = row.get("uuid")?;
    let user_text: String = row.get("user_id")?;
    let target_id_text: String = row.get("target_id")?;

    let type_text: String = row.get("activity_type")?;
    let activity_type = ActivityType::parse(&type_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid activity type `{type_text}` in activities.activity_type"
        ))
    })?;

    let kind_text: String = row.get("target_type")?;
    let kind = TargetKind::parse(&kind_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid target type `{kind_text}` in activities.target_type"
        ))
    })?;

    let metadata_text: Option<String> = row.get("metadata")?;
    let metadata = match metadata_text {
        Some(text) => Some(serde_json::from_str(&text).map_err(|err| {
            RepoError::InvalidData(format!("invalid JSON in activities.metadata: {err}"))
        })?),
        None => None,
    };

    Ok(Activity {
        uuid: parse_uuid(&uuid_text, "activities.uuid")?,
        user_id: parse_uuid(&user_text, "activities.user_id")?,
        activity_type,
        target: TargetRef {
            kind,
            id: parse_uuid(&target_id_text, "activities.target_id")?,
        },
        visible_to: Vec::new(),
        metadata,
        created_at: row.get("created_at")?,
    })
}
