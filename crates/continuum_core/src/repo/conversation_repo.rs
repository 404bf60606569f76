//! Conversation and message repository, SQLite implementation.
//!
//! # Invariants
//! - Appending a message, receipting the sender, overwriting the
//!   `last_message` cache and incrementing the other participants' unread
//!   counters happen in one transaction; the cache can never lag the
//!   messages table.
//! - Marking read resets exactly one unread counter and receipts only
//!   messages from other senders that the reader has not seen yet.

use crate::model::conversation::{
    preview_of, validate_participants, Conversation, ConversationId, LastMessage, UnreadCount,
};
use crate::model::message::{Message, MessageId, MessageSyncStatus, NewMessage, ReadReceipt};
use crate::model::user::UserId;
use crate::repo::{ensure_schema, parse_uuid, RepoError, RepoResult, TableRequirement};
use rusqlite::{params, Connection, Row};
use uuid::Uuid;

const MESSAGE_SELECT_SQL: &str = "SELECT
    uuid,
    conversation_uuid,
    sender_id,
    content,
    client_timestamp,
    sync_status,
    sent_at
FROM messages";

/// Repository interface for conversations and their messages.
pub trait ConversationRepository {
    /// Creates an empty conversation with zeroed unread counters.
    fn create_conversation(
        &self,
        participants: &[UserId],
        now_ms: i64,
    ) -> RepoResult<ConversationId>;
    /// Gets one conversation with participants, counters and cache.
    fn get_conversation(&self, id: ConversationId) -> RepoResult<Option<Conversation>>;
    /// Conversations a user participates in, most recently active first.
    fn list_for_user(&self, user_id: UserId) -> RepoResult<Vec<Conversation>>;
    /// Appends a message and maintains the denormalized inbox state.
    fn append_message(&self, message: &NewMessage, now_ms: i64) -> RepoResult<MessageId>;
    /// Messages of a conversation in send order.
    fn list_messages(&self, conversation_id: ConversationId) -> RepoResult<Vec<Message>>;
    /// Receipts unread messages for `reader_id` and resets their counter.
    fn mark_read(
        &self,
        conversation_id: ConversationId,
        reader_id: UserId,
        now_ms: i64,
    ) -> RepoResult<usize>;
    /// Flips an offline-composed message to `synced` once reconciled.
    fn mark_message_synced(&self, id: MessageId) -> RepoResult<()>;
}

/// SQLite-backed conversation repository.
pub struct SqliteConversationRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteConversationRepository<'conn> {
    /// Constructs a repository from a migrated/ready connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_schema(
            conn,
            &[
                TableRequirement {
                    table: "conversations",
                    columns: &[
                        "uuid",
                        "created_at",
                        "last_sender_id",
                        "last_preview",
                        "last_sent_at",
                    ],
                },
                TableRequirement {
                    table: "conversation_participants",
                    columns: &["conversation_uuid", "user_id", "position"],
                },
                TableRequirement {
                    table: "conversation_unread",
                    columns: &["conversation_uuid", "user_id", "count"],
                },
                TableRequirement {
                    table: "messages",
                    columns: &[
                        "uuid",
                        "conversation_uuid",
                        "sender_id",
                        "content",
                        "client_timestamp",
                        "sync_status",
                        "sent_at",
                    ],
                },
                TableRequirement {
                    table: "message_reads",
                    columns: &["message_uuid", "user_id", "read_at"],
                },
            ],
        )?;
        Ok(Self { conn })
    }

    fn load_participants(&self, id: ConversationId) -> RepoResult<Vec<UserId>> {
        let mut stmt = self.conn.prepare(
            "SELECT user_id FROM conversation_participants
             WHERE conversation_uuid = ?1 ORDER BY position ASC;",
        )?;
        let mut rows = stmt.query([id.to_string()])?;

        let mut participants = Vec::new();
        while let Some(row) = rows.next()? {
            let user_text: String = row.get(0)?;
            participants.push(parse_uuid(&user_text, "conversation_participants.user_id")?);
        }
        Ok(participants)
    }

    fn load_unread_counts(&self, id: ConversationId) -> RepoResult<Vec<UnreadCount>> {
        let mut stmt = self.conn.prepare(
            "SELECT unread.user_id, unread.count
             FROM conversation_unread AS unread
             JOIN conversation_participants AS participants
               ON participants.conversation_uuid = unread.conversation_uuid
              AND participants.user_id = unread.user_id
             WHERE unread.conversation_uuid = ?1
             ORDER BY participants.position ASC;",
        )?;
        let mut rows = stmt.query([id.to_string()])?;

        let mut counts = Vec::new();
        while let Some(row) = rows.next()? {
            let user_text: String = row.get(0)?;
            counts.push(UnreadCount {
                user_id: parse_uuid(&user_text, "conversation_unread.user_id")?,
                count: row.get(1)?,
            });
        }
        Ok(counts)
    }

    fn assemble_conversation(&self, row: &Row<'_>) -> RepoResult<Conversation> {
        let uuid_text: String = row.get("uuid")?;
        let uuid = parse_uuid(&uuid_text, "conversations.uuid")?;

        let last_sender_text: Option<String> = row.get("last_sender_id")?;
        let last_message = match last_sender_text {
            Some(sender_text) => Some(LastMessage {
                sender_id: parse_uuid(&sender_text, "conversations.last_sender_id")?,
                preview: row.get("last_preview")?,
                sent_at: row.get("last_sent_at")?,
            }),
            None => None,
        };

        Ok(Conversation {
            uuid,
            participants: Vec::new(),
            unread_counts: Vec::new(),
            last_message,
            created_at: row.get("created_at")?,
        })
    }

    fn attach_children(&self, mut conversation: Conversation) -> RepoResult<Conversation> {
        conversation.participants = self.load_participants(conversation.uuid)?;
        conversation.unread_counts = self.load_unread_counts(conversation.uuid)?;
        Ok(conversation)
    }

    fn load_read_receipts(&self, id: MessageId) -> RepoResult<Vec<ReadReceipt>> {
        let mut stmt = self.conn.prepare(
            "SELECT user_id, read_at FROM message_reads
             WHERE message_uuid = ?1 ORDER BY read_at ASC, user_id ASC;",
        )?;
        let mut rows = stmt.query([id.to_string()])?;

        let mut receipts = Vec::new();
        while let Some(row) = rows.next()? {
            let user_text: String = row.get(0)?;
            receipts.push(ReadReceipt {
                user_id: parse_uuid(&user_text, "message_reads.user_id")?,
                read_at: row.get(1)?,
            });
        }
        Ok(receipts)
    }
}

impl ConversationRepository for SqliteConversationRepository<'_> {
    fn create_conversation(
        &self,
        participants: &[UserId],
        now_ms: i64,
    ) -> RepoResult<ConversationId> {
        validate_participants(participants)?;

        let tx = self.conn.unchecked_transaction()?;

        let uuid = Uuid::new_v4();
        tx.execute(
            "INSERT INTO conversations (uuid, created_at, last_sender_id, last_preview, last_sent_at)
             VALUES (?1, ?2, NULL, NULL, NULL);",
            params![uuid.to_string(), now_ms],
        )?;

        for (position, user_id) in participants.iter().enumerate() {
            tx.execute(
                "INSERT INTO conversation_participants (conversation_uuid, user_id, position)
                 VALUES (?1, ?2, ?3);",
                params![uuid.to_string(), user_id.to_string(), position as i64],
            )?;
            tx.execute(
                "INSERT INTO conversation_unread (conversation_uuid, user_id, count)
                 VALUES (?1, ?2, 0);",
                params![uuid.to_string(), user_id.to_string()],
            )?;
        }

        tx.commit()?;
        Ok(uuid)
    }

    fn get_conversation(&self, id: ConversationId) -> RepoResult<Option<Conversation>> {
        let mut stmt = self.conn.prepare(
            "SELECT uuid, created_at, last_sender_id, last_preview, last_sent_at
             FROM conversations WHERE uuid = ?1;",
        )?;
        let mut rows = stmt.query([id.to_string()])?;
        let parsed = match rows.next()? {
            Some(row) => self.assemble_conversation(row)?,
            None => return Ok(None),
        };
        drop(rows);
        drop(stmt);

        Ok(Some(self.attach_children(parsed)?))
    }

    fn list_for_user(&self, user_id: UserId) -> RepoResult<Vec<Conversation>> {
        let mut stmt = self.conn.prepare(
            "SELECT uuid, created_at, last_sender_id, last_preview, last_sent_at
             FROM conversations
             WHERE uuid IN
               (SELECT conversation_uuid FROM conversation_participants WHERE user_id = ?1)
             ORDER BY COALESCE(last_sent_at, created_at) DESC, uuid ASC;",
        )?;
        let mut rows = stmt.query([user_id.to_string()])?;

        let mut parsed = Vec::new();
        while let Some(row) = rows.next()? {
            parsed.push(self.assemble_conversation(row)?);
        }
        drop(rows);
        drop(stmt);

        let mut conversations = Vec::with_capacity(parsed.len());
        for conversation in parsed {
            conversations.push(self.attach_children(conversation)?);
        }
        Ok(conversations)
    }

    fn append_message(&self, message: &NewMessage, now_ms: i64) -> RepoResult<MessageId> {
        message.validate()?;

        let tx = self.conn.unchecked_transaction()?;

        let conversation_text = message.conversation_id.to_string();
        let sender_text = message.sender_id.to_string();

        let mut participant_check = tx.prepare(
            "SELECT 1 FROM conversation_participants
             WHERE conversation_uuid = ?1 AND user_id = ?2;",
        )?;
        if !participant_check.exists(params![conversation_text, sender_text])? {
            return Err(RepoError::ReferenceNotFound {
                collection: "conversations",
                id: message.conversation_id,
            });
        }
        drop(participant_check);

        let uuid = Uuid::new_v4();
        tx.execute(
            "INSERT INTO messages (
                uuid,
                conversation_uuid,
                sender_id,
                content,
                client_timestamp,
                sync_status,
                sent_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
            params![
                uuid.to_string(),
                conversation_text,
                sender_text,
                message.content.as_str(),
                message.client_timestamp,
                message.initial_sync_status().as_str(),
                now_ms,
            ],
        )?;

        // The sender has read their own message by definition.
        tx.execute(
            "INSERT INTO message_reads (message_uuid, user_id, read_at) VALUES (?1, ?2, ?3);",
            params![uuid.to_string(), sender_text, now_ms],
        )?;

        tx.execute(
            "UPDATE conversations
             SET last_sender_id = ?2, last_preview = ?3, last_sent_at = ?4
             WHERE uuid = ?1;",
            params![
                conversation_text,
                sender_text,
                preview_of(&message.content),
                now_ms,
            ],
        )?;

        tx.execute(
            "UPDATE conversation_unread SET count = count + 1
             WHERE conversation_uuid = ?1 AND user_id <> ?2;",
            params![conversation_text, sender_text],
        )?;

        tx.commit()?;
        Ok(uuid)
    }

    fn list_messages(&self, conversation_id: ConversationId) -> RepoResult<Vec<Message>> {
        let mut stmt = self.conn.prepare(&format!(
            "{MESSAGE_SELECT_SQL} WHERE conversation_uuid = ?1 ORDER BY sent_at ASC, uuid ASC;"
        ))?;
        let mut rows = stmt.query([conversation_id.to_string()])?;

        let mut parsed = Vec::new();
        while let Some(row) = rows.next()? {
            parsed.push(parse_message_row(row)?);
        }
        drop(rows);
        drop(stmt);

        let mut messages = Vec::with_capacity(parsed.len());
        for mut message in parsed {
            message.read_by = self.load_read_receipts(message.uuid)?;
            messages.push(message);
        }
        Ok(messages)
    }

    fn mark_read(
        &self,
        conversation_id: ConversationId,
        reader_id: UserId,
        now_ms: i64,
    ) -> RepoResult<usize> {
        let tx = self.conn.unchecked_transaction()?;

        let conversation_text = conversation_id.to_string();
        let reader_text = reader_id.to_string();

        let mut participant_check = tx.prepare(
            "SELECT 1 FROM conversation_participants
             WHERE conversation_uuid = ?1 AND user_id = ?2;",
        )?;
        if !participant_check.exists(params![conversation_text, reader_text])? {
            return Err(RepoError::ReferenceNotFound {
                collection: "conversations",
                id: conversation_id,
            });
        }
        drop(participant_check);

        let receipted = tx.execute(
            "INSERT INTO message_reads (message_uuid, user_id, read_at)
             SELECT uuid, ?2, ?3 FROM messages
             WHERE conversation_uuid = ?1
               AND sender_id <> ?2
               AND uuid NOT IN
                 (SELECT message_uuid FROM message_reads WHERE user_id = ?2);",
            params![conversation_text, reader_text, now_ms],
        )?;

        tx.execute(
            "UPDATE conversation_unread SET count = 0
             WHERE conversation_uuid = ?1 AND user_id = ?2;",
            params![conversation_text, reader_text],
        )?;

        tx.commit()?;
        Ok(receipted)
    }

    fn mark_message_synced(&self, id: MessageId) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE messages SET sync_status = 'synced' WHERE uuid = ?1;",
            [id.to_string()],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound {
                collection: "messages",
                id,
            });
        }
        Ok(())
    }
}

fn parse_message_row(row: &Row<'_>) -> RepoResult<Message> {
    let uuid_text: String = row.get("uuid")?;
    let conversation_text: String = row.get("conversation_uuid")?;
    let sender_text: String = row.get("sender_id")?;

    let status_text: String = row.get("sync_status")?;
    let sync_status = MessageSyncStatus::parse(&status_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid sync status `{status_text}` in messages.sync_status"
        ))
    })?;

    Ok(Message {
        uuid: parse_uuid(&uuid_text, "messages.uuid")?,
        conversation_id: parse_uuid(&conversation_text, "messages.conversation_uuid")?,
        sender_id: parse_uuid(&sender_text, "messages.sender_id")?,
        content: row.get("content")?,
        read_by: Vec::new(),
        client_timestamp: row.get("client_timestamp")?,
        sync_status,
        sent_at: row.get("sent_at")?,
    })
}
