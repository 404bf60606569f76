//! Sync queue repository contract and SQLite implementation.
//!
//! # Invariants
//! - Claiming is a compare-and-set: the UPDATE only matches `pending` rows,
//!   so two workers racing for the same entry cannot both win.
//! - Terminal states stamp `processed_at` once and are never mutated again;
//!   a retry of a failed entry is a brand-new `pending` row.

use crate::model::sync_queue::{
    NewSyncEntry, SyncEntry, SyncEntryId, SyncEntryStatus, SyncOperation,
};
use crate::model::user::UserId;
use crate::repo::{ensure_schema, parse_uuid, RepoError, RepoResult, TableRequirement};
use rusqlite::{params, Connection, Row};
use uuid::Uuid;

const SYNC_SELECT_SQL: &str = "SELECT
    uuid,
    user_id,
    operation,
    collection,
    document_id,
    data,
    status,
    client_timestamp,
    enqueued_at,
    processed_at,
    error_message
FROM sync_queue";

/// Repository interface for the offline sync queue.
pub trait SyncQueueRepository {
    /// Enqueues one mutation as `pending`.
    fn enqueue(&self, entry: &NewSyncEntry, now_ms: i64) -> RepoResult<SyncEntryId>;
    /// Gets one entry.
    fn get_entry(&self, id: SyncEntryId) -> RepoResult<Option<SyncEntry>>;
    /// Atomically claims the oldest pending entry for a user, moving it to
    /// `processing`. Returns `None` when the queue is drained.
    fn claim_next(&self, user_id: UserId) -> RepoResult<Option<SyncEntry>>;
    /// Marks a processing entry `completed` and stamps `processed_at`.
    fn complete(&self, id: SyncEntryId, now_ms: i64) -> RepoResult<()>;
    /// Marks a processing entry `failed` with the reason.
    fn fail(&self, id: SyncEntryId, error_message: &str, now_ms: i64) -> RepoResult<()>;
    /// Re-enqueues a failed entry as a new pending row; the failed row is
    /// left untouched. Returns the new entry's id.
    fn retry(&self, id: SyncEntryId, now_ms: i64) -> RepoResult<SyncEntryId>;
    /// Entries for a user, optionally filtered by status, oldest first.
    fn list_for_user(
        &self,
        user_id: UserId,
        status: Option<SyncEntryStatus>,
    ) -> RepoResult<Vec<SyncEntry>>;
}

/// SQLite-backed sync queue repository.
pub struct SqliteSyncQueueRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteSyncQueueRepository<'conn> {
    /// Constructs a repository from a migrated/ready connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_schema(
            conn,
            &[TableRequirement {
                table: "sync_queue",
                columns: &[
                    "uuid",
                    "user_id",
                    "operation",
                    "collection",
                    "document_id",
                    "data",
                    "status",
                    "client_timestamp",
                    "enqueued_at",
                    "processed_at",
                    "error_message",
                ],
            }],
        )?;
        Ok(Self { conn })
    }

    fn require_entry(&self, id: SyncEntryId) -> RepoResult<SyncEntry> {
        self.get_entry(id)?.ok_or(RepoError::NotFound {
            collection: "sync_queue",
            id,
        })
    }
}

impl SyncQueueRepository for SqliteSyncQueueRepository<'_> {
    fn enqueue(&self, entry: &NewSyncEntry, now_ms: i64) -> RepoResult<SyncEntryId> {
        entry.validate()?;

        let data_text = serde_json::to_string(&entry.data).map_err(|err| {
            RepoError::InvalidData(format!("unserializable sync payload: {err}"))
        })?;

        let uuid = Uuid::new_v4();
        self.conn.execute(
            "INSERT INTO sync_queue (
                uuid,
                user_id,
                operation,
                collection,
                document_id,
                data,
                status,
                client_timestamp,
                enqueued_at,
                processed_at,
                error_message
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, 'pending', ?7, ?8, NULL, NULL);",
            params![
                uuid.to_string(),
                entry.user_id.to_string(),
                entry.operation.as_str(),
                entry.collection.as_str(),
                entry.document_id.to_string(),
                data_text,
                entry.client_timestamp,
                now_ms,
            ],
        )?;

        Ok(uuid)
    }

    fn get_entry(&self, id: SyncEntryId) -> RepoResult<Option<SyncEntry>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{SYNC_SELECT_SQL} WHERE uuid = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_sync_row(row)?));
        }
        Ok(None)
    }

    fn claim_next(&self, user_id: UserId) -> RepoResult<Option<SyncEntry>> {
        let tx = self.conn.unchecked_transaction()?;

        let candidate: Option<String> = {
            let mut stmt = tx.prepare(
                "SELECT uuid FROM sync_queue
                 WHERE user_id = ?1 AND status = 'pending'
                 ORDER BY client_timestamp ASC, enqueued_at ASC, uuid ASC
                 LIMIT 1;",
            )?;
            let mut rows = stmt.query([user_id.to_string()])?;
            match rows.next()? {
                Some(row) => Some(row.get(0)?),
                None => None,
            }
        };

        let uuid_text = match candidate {
            Some(text) => text,
            None => return Ok(None),
        };

        // Compare-and-set: only a still-pending row can be claimed.
        let claimed = tx.execute(
            "UPDATE sync_queue SET status = 'processing'
             WHERE uuid = ?1 AND status = 'pending';",
            [uuid_text.as_str()],
        )?;
        if claimed == 0 {
            return Ok(None);
        }

        tx.commit()?;
        self.get_entry(parse_uuid(&uuid_text, "sync_queue.uuid")?)
    }

    fn complete(&self, id: SyncEntryId, now_ms: i64) -> RepoResult<()> {
        let current = self.require_entry(id)?;
        current
            .status
            .check_transition(SyncEntryStatus::Completed)?;

        // Compare-and-set: settlement only lands on a still-processing row.
        let changed = self.conn.execute(
            "UPDATE sync_queue
             SET status = 'completed', processed_at = ?2, error_message = NULL
             WHERE uuid = ?1 AND status = 'processing';",
            params![id.to_string(), now_ms],
        )?;
        if changed == 0 {
            let latest = self.require_entry(id)?;
            return Err(RepoError::Transition(crate::model::InvalidTransition {
                entity: "sync_queue",
                from: latest.status.as_str(),
                to: "completed",
            }));
        }
        Ok(())
    }

    fn fail(&self, id: SyncEntryId, error_message: &str, now_ms: i64) -> RepoResult<()> {
        let current = self.require_entry(id)?;
        current.status.check_transition(SyncEntryStatus::Failed)?;

        let changed = self.conn.execute(
            "UPDATE sync_queue
             SET status = 'failed', processed_at = ?2, error_message = ?3
             WHERE uuid = ?1 AND status = 'processing';",
            params![id.to_string(), now_ms, error_message],
        )?;
        if changed == 0 {
            let latest = self.require_entry(id)?;
            return Err(RepoError::Transition(crate::model::InvalidTransition {
                entity: "sync_queue",
                from: latest.status.as_str(),
                to: "failed",
            }));
        }
        Ok(())
    }

    fn retry(&self, id: SyncEntryId, now_ms: i64) -> RepoResult<SyncEntryId> {
        let failed = self.require_entry(id)?;
        if failed.status != SyncEntryStatus::Failed {
            return Err(RepoError::Transition(
                crate::model::InvalidTransition {
                    entity: "sync_queue",
                    from: failed.status.as_str(),
                    to: "pending",
                },
            ));
        }

        self.enqueue(
            &NewSyncEntry {
                user_id: failed.user_id,
                operation: failed.operation,
                collection: failed.collection,
                document_id: failed.document_id,
                data: failed.data,
                client_timestamp: failed.client_timestamp,
            },
            now_ms,
        )
    }

    fn list_for_user(
        &self,
        user_id: UserId,
        status: Option<SyncEntryStatus>,
    ) -> RepoResult<Vec<SyncEntry>> {
        let mut sql = format!("{SYNC_SELECT_SQL} WHERE user_id = ?1");
        if status.is_some() {
            sql.push_str(" AND status = ?2");
        }
        sql.push_str(" ORDER BY enqueued_at ASC, uuid ASC;");

        let mut stmt = self.conn.prepare(&sql)?;
        let user_text = user_id.to_string();
        let mut rows = match status {
            Some(status) => stmt.query(params![user_text, status.as_str()])?,
            None => stmt.query([user_text.as_str()])?,
        };

        let mut entries = Vec::new();
        while let Some(row) = rows.next()? {
            entries.push(parse_sync_row(row)?);
        }
        Ok(entries)
    }
}

fn parse_sync_row(row: &Row<'_>) -> RepoResult<SyncEntry> {
    let uuid_text: String = row.get("uuid")?;
    let user_text: String = row.get("user_id")?;
    let document_text: String = row.get("document_id")?;

    let operation_text: String = row.get("operation")?;
    let operation = SyncOperation::parse(&operation_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid operation `{operation_text}` in sync_queue.operation"
        ))
    })?;

    let status_text: String = row.get("status")?;
    let status = SyncEntryStatus::parse(&status_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid status `{status_text}` in sync_queue.status"
        ))
    })?;

    let data_text: String = row.get("data")?;
    let data = serde_json::from_str(&data_text).map_err(|err| {
        RepoError::InvalidData(format!("invalid JSON in sync_queue.data: {err}"))
    })?;

    Ok(SyncEntry {
        uuid: parse_uuid(&uuid_text, "sync_queue.uuid")?,
        user_id: parse_uuid(&user_text, "sync_queue.user_id")?,
        operation,
        collection: row.get("collection")?,
        document_id: parse_uuid(&document_text, "sync_queue.document_id")?,
        data,
        status,
        client_timestamp: row.get("client_timestamp")?,
        enqueued_at: row.get("enqueued_at")?,
        processed_at: row.get("processed_at")?,
        error_message: row.get("error_message")?,
    })
}
