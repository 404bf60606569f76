//! Flashcard set/card repository contract and SQLite implementation.
//!
//! # Invariants
//! - `total_cards` always equals the child card count; every card mutation
//!   recomputes it inside the same transaction.
//! - New cards append at `max(card_order) + 1`; child listings are ordered
//!   by `card_order ASC, uuid ASC`.

use crate::model::flashcard::{
    Flashcard, FlashcardId, FlashcardSetId, NewFlashcard, NewFlashcardSet,
};
use crate::model::note::{NoteId, Visibility};
use crate::model::user::UserId;
use crate::repo::{ensure_schema, now_ms, parse_uuid, RepoError, RepoResult, TableRequirement};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};
use uuid::Uuid;

const SET_SELECT_SQL: &str = "SELECT
    uuid,
    user_id,
    note_id,
    title,
    description,
    total_cards,
    visibility,
    created_at,
    updated_at
FROM flashcard_sets";

/// Read model for one flashcard set with its ordered cards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlashcardSetRecord {
    pub uuid: FlashcardSetId,
    pub user_id: UserId,
    pub note_id: Option<NoteId>,
    pub title: String,
    pub description: Option<String>,
    /// Cached child count, maintained by the write path.
    pub total_cards: i64,
    pub visibility: Visibility,
    /// Virtual relation: child cards ordered by display sequence.
    pub flashcards: Vec<Flashcard>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Repository interface for flashcard sets and cards.
pub trait FlashcardRepository {
    /// Creates one set with zero cards and returns its stable id.
    fn create_set(&self, set: &NewFlashcardSet) -> RepoResult<FlashcardSetId>;
    /// Appends one card to a set and bumps `total_cards` atomically.
    fn add_card(&self, set_id: FlashcardSetId, card: &NewFlashcard) -> RepoResult<FlashcardId>;
    /// Removes one card and decrements `total_cards` atomically.
    fn remove_card(&self, card_id: FlashcardId) -> RepoResult<()>;
    /// Gets one set with its ordered cards.
    fn get_set(&self, id: FlashcardSetId) -> RepoResult<Option<FlashcardSetRecord>>;
    /// Lists a user's sets, newest first, without child cards.
    fn list_sets(&self, user_id: UserId) -> RepoResult<Vec<FlashcardSetRecord>>;
}

/// SQLite-backed flashcard repository.
pub struct SqliteFlashcardRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteFlashcardRepository<'conn> {
    /// Constructs a repository from a migrated/ready connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_schema(
            conn,
            &[
                TableRequirement {
                    table: "flashcard_sets",
                    columns: &[
                        "uuid",
                        "user_id",
                        "note_id",
                        "title",
                        "description",
                        "total_cards",
                        "visibility",
                        "created_at",
                        "updated_at",
                    ],
                },
                TableRequirement {
                    table: "flashcards",
                    columns: &["uuid", "set_id", "front", "back", "card_order", "created_at"],
                },
            ],
        )?;
        Ok(Self { conn })
    }
}

impl FlashcardRepository for SqliteFlashcardRepository<'_> {
    fn create_set(&self, set: &NewFlashcardSet) -> RepoResult<FlashcardSetId> {
        set.validate()?;

        let uuid = Uuid::new_v4();
        self.conn.execute(
            "INSERT INTO flashcard_sets (
                uuid,
                user_id,
                note_id,
                title,
                description,
                total_cards,
                visibility,
                created_at,
                updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6, ?7, ?7);",
            params![
                uuid.to_string(),
                set.user_id.to_string(),
                set.note_id.map(|id| id.to_string()),
                set.title.as_str(),
                set.description.as_deref(),
                set.visibility.as_str(),
                now_ms(),
            ],
        )?;

        Ok(uuid)
    }

    fn add_card(&self, set_id: FlashcardSetId, card: &NewFlashcard) -> RepoResult<FlashcardId> {
        card.validate()?;

        let set_text = set_id.to_string();
        let tx = self.conn.unchecked_transaction()?;
        if !set_exists_in_tx(&tx, &set_text)? {
            return Err(RepoError::NotFound {
                collection: "flashcard_sets",
                id: set_id,
            });
        }

        let next_order: i64 = tx.query_row(
            "SELECT COALESCE(MAX(card_order) + 1, 0) FROM flashcards WHERE set_id = ?1;",
            [set_text.as_str()],
            |row| row.get(0),
        )?;

        let uuid = Uuid::new_v4();
        tx.execute(
            "INSERT INTO flashcards (uuid, set_id, front, back, card_order, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
            params![
                uuid.to_string(),
                set_text.as_str(),
                card.front.as_str(),
                card.back.as_str(),
                next_order,
                now_ms(),
            ],
        )?;
        refresh_total_cards_in_tx(&tx, &set_text)?;
        tx.commit()?;

        Ok(uuid)
    }

    fn remove_card(&self, card_id: FlashcardId) -> RepoResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        let set_text: Option<String> = tx
            .query_row(
                "SELECT set_id FROM flashcards WHERE uuid = ?1;",
                [card_id.to_string()],
                |row| row.get(0),
            )
            .optional()?;

        let Some(set_text) = set_text else {
            return Err(RepoError::NotFound {
                collection: "flashcards",
                id: card_id,
            });
        };

        tx.execute(
            "DELETE FROM flashcards WHERE uuid = ?1;",
            [card_id.to_string()],
        )?;
        refresh_total_cards_in_tx(&tx, &set_text)?;
        tx.commit()?;
        Ok(())
    }

    fn get_set(&self, id: FlashcardSetId) -> RepoResult<Option<FlashcardSetRecord>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{SET_SELECT_SQL} WHERE uuid = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            let mut record = parse_set_row(row)?;
            record.flashcards = load_cards_for_set(self.conn, &record.uuid.to_string())?;
            return Ok(Some(record));
        }
        Ok(None)
    }

    fn list_sets(&self, user_id: UserId) -> RepoResult<Vec<FlashcardSetRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "{SET_SELECT_SQL} WHERE user_id = ?1 ORDER BY updated_at DESC, uuid ASC;"
        ))?;
        let mut rows = stmt.query([user_id.to_string()])?;
        let mut sets = Vec::new();
        while let Some(row) = rows.next()? {
            sets.push(parse_set_row(row)?);
        }
        Ok(sets)
    }
}

fn set_exists_in_tx(tx: &Transaction<'_>, set_uuid: &str) -> RepoResult<bool> {
    let exists: i64 = tx.query_row(
        "SELECT EXISTS(SELECT 1 FROM flashcard_sets WHERE uuid = ?1);",
        [set_uuid],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn refresh_total_cards_in_tx(tx: &Transaction<'_>, set_uuid: &str) -> RepoResult<()> {
    tx.execute(
        "UPDATE flashcard_sets
         SET
            total_cards = (SELECT COUNT(*) FROM flashcards WHERE set_id = ?1),
            updated_at = ?2
         WHERE uuid = ?1;",
        params![set_uuid, now_ms()],
    )?;
    Ok(())
}

fn load_cards_for_set(conn: &Connection, set_uuid: &str) -> RepoResult<Vec<Flashcard>> {
    let mut stmt = conn.prepare(
        "SELECT uuid, set_id, front, back, card_order
         FROM flashcards
         WHERE set_id = ?1
         ORDER BY card_order ASC, uuid ASC;",
    )?;
    let mut rows = stmt.query([set_uuid])?;
    let mut cards = Vec::new();
    while let Some(row) = rows.next()? {
        let uuid_text: String = row.get("uuid")?;
        let set_text: String = row.get("set_id")?;
        cards.push(Flashcard {
            uuid: parse_uuid(&uuid_text, "flashcards.uuid")?,
            set_id: parse_uuid(&set_text, "flashcards.set_id")?,
            front: row.get("front")?,
            back: row.get("back")?,
            order: row.get("card_order")?,
        });
    }
    Ok(cards)
}

fn parse_set_row(row: &Row<'_>) -> RepoResult<FlashcardSetRecord> {
    let uuid_text: String = row.get("uuid")?;
    let user_text: String = row.get("user_id")?;
    let note_text: Option<String> = row.get("note_id")?;

    let visibility_text: String = row.get("visibility")?;
    let visibility = Visibility::parse(&visibility_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid visibility `{visibility_text}` in flashcard_sets.visibility"
        ))
    })?;

    let note_id = match note_text {
        Some(text) => Some(parse_uuid(&text, "flashcard_sets.note_id")?),
        None => None,
    };

    Ok(FlashcardSetRecord {
        uuid: parse_uuid(&uuid_text, "flashcard_sets.uuid")?,
        user_id: parse_uuid(&user_text, "flashcard_sets.user_id")?,
        note_id,
        title: row.get("title")?,
        description: row.get("description")?,
        total_cards: row.get("total_cards")?,
        visibility,
        flashcards: Vec::new(),
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}
