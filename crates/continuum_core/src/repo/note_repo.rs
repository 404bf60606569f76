//! Note/tag/summary repository contract and SQLite implementation.
//!
//! # Invariants
//! - Tags are normalized before persistence; `set_note_tags` replaces the
//!   whole tag set in a single transaction.
//! - `has_summary` is derived from the `note_summaries` collection on read.
//! - At most one summary exists per note; setting a new one replaces it.

use crate::model::note::{normalize_tags, ContentType, NewNote, NoteId, Visibility};
use crate::model::user::UserId;
use crate::repo::{ensure_schema, now_ms, parse_uuid, RepoError, RepoResult, TableRequirement};
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

const NOTE_SELECT_SQL: &str = "SELECT
    uuid,
    user_id,
    title,
    content,
    content_type,
    subject,
    visibility,
    created_at,
    updated_at,
    EXISTS(SELECT 1 FROM note_summaries ns WHERE ns.note_uuid = notes.uuid) AS has_summary
FROM notes";

/// Read model for note list/detail use-cases.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteRecord {
    pub uuid: NoteId,
    pub user_id: UserId,
    pub title: String,
    pub content: String,
    pub content_type: ContentType,
    pub subject: Option<String>,
    pub visibility: Visibility,
    /// Note tags, normalized to lowercase, sorted.
    pub tags: Vec<String>,
    /// Derived: an associated summary document exists.
    pub has_summary: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Stored note summary produced by the external summarization service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteSummary {
    pub uuid: Uuid,
    pub note_id: NoteId,
    pub content: String,
    pub model: String,
    pub generated_at: i64,
}

/// Repository interface for note documents.
pub trait NoteRepository {
    /// Creates one note with its normalized tags and returns its stable id.
    fn create_note(&self, note: &NewNote) -> RepoResult<NoteId>;
    /// Replaces note body and metadata fields.
    fn update_note(
        &self,
        id: NoteId,
        title: &str,
        content: &str,
        content_type: ContentType,
        subject: Option<&str>,
        visibility: Visibility,
    ) -> RepoResult<()>;
    /// Gets one note with tags and derived fields.
    fn get_note(&self, id: NoteId) -> RepoResult<Option<NoteRecord>>;
    /// Lists a user's notes, optionally filtered by one tag, newest first.
    fn list_notes(&self, user_id: UserId, tag: Option<&str>) -> RepoResult<Vec<NoteRecord>>;
    /// Atomically replaces the full tag set for one note.
    fn set_note_tags(&self, id: NoteId, tags: &[String]) -> RepoResult<()>;
    /// Stores the note's summary, replacing any previous one.
    fn set_summary(&self, note_id: NoteId, content: &str, model: &str) -> RepoResult<()>;
    /// Removes the stored summary, if any.
    fn clear_summary(&self, note_id: NoteId) -> RepoResult<()>;
    /// Gets the note's summary if one exists.
    fn get_summary(&self, note_id: NoteId) -> RepoResult<Option<NoteSummary>>;
}

/// SQLite-backed note repository.
pub struct SqliteNoteRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteNoteRepository<'conn> {
    /// Constructs a repository from a migrated/ready connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_schema(
            conn,
            &[
                TableRequirement {
                    table: "notes",
                    columns: &[
                        "uuid",
                        "user_id",
                        "title",
                        "content",
                        "content_type",
                        "subject",
                        "visibility",
                        "created_at",
                        "updated_at",
                    ],
                },
                TableRequirement {
                    table: "tags",
                    columns: &["id", "name"],
                },
                TableRequirement {
                    table: "note_tags",
                    columns: &["note_uuid", "tag_id"],
                },
                TableRequirement {
                    table: "note_summaries",
                    columns: &["uuid", "note_uuid", "content", "model", "generated_at"],
                },
            ],
        )?;
        Ok(Self { conn })
    }
}

impl NoteRepository for SqliteNoteRepository<'_> {
    fn create_note(&self, note: &NewNote) -> RepoResult<NoteId> {
        note.validate()?;

        let uuid = Uuid::new_v4();
        let now = now_ms();
        let tags = normalize_tags(&note.tags);

        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO notes (
                uuid,
                user_id,
                title,
                content,
                content_type,
                subject,
                visibility,
                created_at,
                updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8);",
            params![
                uuid.to_string(),
                note.user_id.to_string(),
                note.title.as_str(),
                note.content.as_str(),
                note.content_type.as_str(),
                note.subject.as_deref(),
                note.visibility.as_str(),
                now,
            ],
        )?;
        replace_tags_in_tx(&tx, &uuid.to_string(), &tags)?;
        tx.commit()?;

        Ok(uuid)
    }

    fn update_note(
        &self,
        id: NoteId,
        title: &str,
        content: &str,
        content_type: ContentType,
        subject: Option<&str>,
        visibility: Visibility,
    ) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE notes
             SET
                title = ?2,
                content = ?3,
                content_type = ?4,
                subject = ?5,
                visibility = ?6,
                updated_at = ?7
             WHERE uuid = ?1;",
            params![
                id.to_string(),
                title,
                content,
                content_type.as_str(),
                subject,
                visibility.as_str(),
                now_ms(),
            ],
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound {
                collection: "notes",
                id,
            });
        }
        Ok(())
    }

    fn get_note(&self, id: NoteId) -> RepoResult<Option<NoteRecord>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{NOTE_SELECT_SQL} WHERE uuid = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_note_row(self.conn, row)?));
        }
        Ok(None)
    }

    fn list_notes(&self, user_id: UserId, tag: Option<&str>) -> RepoResult<Vec<NoteRecord>> {
        let mut sql = format!("{NOTE_SELECT_SQL} WHERE user_id = ?1");
        if tag.is_some() {
            sql.push_str(
                " AND EXISTS (
                    SELECT 1
                    FROM note_tags nt
                    INNER JOIN tags t ON t.id = nt.tag_id
                    WHERE nt.note_uuid = notes.uuid
                      AND t.name = ?2 COLLATE NOCASE
                )",
            );
        }
        sql.push_str(" ORDER BY updated_at DESC, uuid ASC;");

        let mut stmt = self.conn.prepare(&sql)?;
        let user_text = user_id.to_string();
        let mut rows = match tag {
            Some(tag) => stmt.query(params![user_text, tag])?,
            None => stmt.query([user_text.as_str()])?,
        };

        let mut notes = Vec::new();
        while let Some(row) = rows.next()? {
            notes.push(parse_note_row(self.conn, row)?);
        }
        Ok(notes)
    }

    fn set_note_tags(&self, id: NoteId, tags: &[String]) -> RepoResult<()> {
        let id_text = id.to_string();
        let normalized = normalize_tags(tags);

        let tx = self.conn.unchecked_transaction()?;
        let exists: i64 = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM notes WHERE uuid = ?1);",
            [id_text.as_str()],
            |row| row.get(0),
        )?;
        if exists == 0 {
            return Err(RepoError::NotFound {
                collection: "notes",
                id,
            });
        }
        replace_tags_in_tx(&tx, &id_text, &normalized)?;
        tx.execute(
            "UPDATE notes SET updated_at = ?2 WHERE uuid = ?1;",
            params![id_text.as_str(), now_ms()],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn set_summary(&self, note_id: NoteId, content: &str, model: &str) -> RepoResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "DELETE FROM note_summaries WHERE note_uuid = ?1;",
            [note_id.to_string()],
        )?;
        tx.execute(
            "INSERT INTO note_summaries (uuid, note_uuid, content, model, generated_at)
             VALUES (?1, ?2, ?3, ?4, ?5);",
            params![
                Uuid::new_v4().to_string(),
                note_id.to_string(),
                content,
                model,
                now_ms(),
            ],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn clear_summary(&self, note_id: NoteId) -> RepoResult<()> {
        self.conn.execute(
            "DELETE FROM note_summaries WHERE note_uuid = ?1;",
            [note_id.to_string()],
        )?;
        Ok(())
    }

    fn get_summary(&self, note_id: NoteId) -> RepoResult<Option<NoteSummary>> {
        let summary = self
            .conn
            .query_row(
                "SELECT uuid, note_uuid, content, model, generated_at
                 FROM note_summaries
                 WHERE note_uuid = ?1;",
                [note_id.to_string()],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, i64>(4)?,
                    ))
                },
            )
            .optional()?;

        match summary {
            Some((uuid_text, note_text, content, model, generated_at)) => Ok(Some(NoteSummary {
                uuid: parse_uuid(&uuid_text, "note_summaries.uuid")?,
                note_id: parse_uuid(&note_text, "note_summaries.note_uuid")?,
                content,
                model,
                generated_at,
            })),
            None => Ok(None),
        }
    }
}

fn replace_tags_in_tx(
    tx: &rusqlite::Transaction<'_>,
    note_uuid: &str,
    tags: &[String],
) -> RepoResult<()> {
    tx.execute("DELETE FROM note_tags WHERE note_uuid = ?1;", [note_uuid])?;
    for tag in tags {
        tx.execute(
            "INSERT OR IGNORE INTO tags (name) VALUES (?1);",
            [tag.as_str()],
        )?;
        tx.execute(
            "INSERT INTO note_tags (note_uuid, tag_id)
             SELECT ?1, id
             FROM tags
             WHERE name = ?2 COLLATE NOCASE;",
            params![note_uuid, tag.as_str()],
        )?;
    }
    Ok(())
}

fn load_tags_for_note(conn: &Connection, note_uuid: &str) -> RepoResult<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT t.name
         FROM note_tags nt
         INNER JOIN tags t ON t.id = nt.tag_id
         WHERE nt.note_uuid = ?1
         ORDER BY t.name COLLATE NOCASE ASC;",
    )?;
    let mut rows = stmt.query([note_uuid])?;
    let mut tags = Vec::new();
    while let Some(row) = rows.next()? {
        let value: String = row.get(0)?;
        tags.push(value.to_lowercase());
    }
    Ok(tags)
}

fn parse_note_row(conn: &Connection, row: &Row<'_>) -> RepoResult<NoteRecord> {
    let uuid_text: String = row.get("uuid")?;
    let user_text: String = row.get("user_id")?;

    let content_type_text: String = row.get("content_type")?;
    let content_type = ContentType::parse(&content_type_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid content type `{content_type_text}` in notes.content_type"
        ))
    })?;

    let visibility_text: String = row.get("visibility")?;
    let visibility = Visibility::parse(&visibility_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid visibility `{visibility_text}` in notes.visibility"
        ))
    })?;

    let tags = load_tags_for_note(conn, &uuid_text)?;
    let has_summary: i64 = row.get("has_summary")?;

    Ok(NoteRecord {
        uuid: parse_uuid(&uuid_text, "notes.uuid")?,
        user_id: parse_uuid(&user_text, "notes.user_id")?,
        title: row.get("title")?,
        content: row.get("content")?,
        content_type,
        subject: row.get("subject")?,
        visibility,
        tags,
        has_summary: has_summary == 1,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}
