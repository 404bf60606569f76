//! Message model with read receipts and offline composition fields.
//!
//! # Invariants
//! - `read_by` is append-only; the sender is receipted at creation, every
//!   other participant at most once on first read.
//! - `sync_status = pending` marks a message composed offline and not yet
//!   reconciled with the server's canonical ordering.

use crate::model::conversation::ConversationId;
use crate::model::user::UserId;
use crate::model::{require_text, ValidationError};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type MessageId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageSyncStatus {
    Synced,
    Pending,
}

impl MessageSyncStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Synced => "synced",
            Self::Pending => "pending",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "synced" => Some(Self::Synced),
            "pending" => Some(Self::Pending),
            _ => None,
        }
    }
}

/// One read receipt; receipts are never removed or updated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadReceipt {
    pub user_id: UserId,
    pub read_at: i64,
}

/// Creation input for one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    pub conversation_id: ConversationId,
    pub sender_id: UserId,
    pub content: String,
    /// Client-side compose time for offline sends; implies `pending`.
    pub client_timestamp: Option<i64>,
}

impl NewMessage {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_text("content", &self.content)
    }

    /// Offline-composed messages enter the store as `pending`.
    pub fn initial_sync_status(&self) -> MessageSyncStatus {
        if self.client_timestamp.is_some() {
            MessageSyncStatus::Pending
        } else {
            MessageSyncStatus::Synced
        }
    }
}

/// Read model for one message document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub uuid: MessageId,
    pub conversation_id: ConversationId,
    pub sender_id: UserId,
    pub content: String,
    pub read_by: Vec<ReadReceipt>,
    pub client_timestamp: Option<i64>,
    pub sync_status: MessageSyncStatus,
    pub sent_at: i64,
}
