//! Offline sync queue entry and its status state machine.
//!
//! # Invariants
//! - `pending` is the sole initial state; `processed_at` is unset until a
//!   terminal state is reached.
//! - Legal transitions: pending -> processing -> completed | failed.
//! - `completed` and `failed` are terminal; a retry is a new entry, never a
//!   mutation of the terminal one.

use crate::model::user::UserId;
use crate::model::{require_text, InvalidTransition, ValidationError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

pub type SyncEntryId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncOperation {
    Create,
    Update,
    Delete,
}

impl SyncOperation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "create" => Some(Self::Create),
            "update" => Some(Self::Update),
            "delete" => Some(Self::Delete),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncEntryStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl SyncEntryStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "processing" => Some(Self::Processing),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Checks one step of the lifecycle state machine.
    pub fn check_transition(self, next: SyncEntryStatus) -> Result<(), InvalidTransition> {
        let legal = matches!(
            (self, next),
            (Self::Pending, Self::Processing)
                | (Self::Processing, Self::Completed)
                | (Self::Processing, Self::Failed)
        );
        if legal {
            Ok(())
        } else {
            Err(InvalidTransition {
                entity: "sync_queue",
                from: self.as_str(),
                to: next.as_str(),
            })
        }
    }
}

/// Creation input for one queued offline mutation.
///
/// `data` is an open-ended JSON payload; its expected shape per operation:
///
/// | operation | expected `data` shape                                    |
/// |-----------|----------------------------------------------------------|
/// | `create`  | full field set for a new document in `collection`        |
/// | `update`  | partial field set to merge into `document_id`            |
/// | `delete`  | empty object; `document_id` alone identifies the target  |
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSyncEntry {
    pub user_id: UserId,
    pub operation: SyncOperation,
    /// Target collection name, e.g. `notes` or `tasks`.
    pub collection: String,
    /// Target document id; client-generated for creates.
    pub document_id: Uuid,
    pub data: Value,
    /// When the mutation was composed offline, epoch milliseconds.
    pub client_timestamp: i64,
}

impl NewSyncEntry {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_text("collection", &self.collection)
    }
}

/// Read model for one sync queue entry.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncEntry {
    pub uuid: SyncEntryId,
    pub user_id: UserId,
    pub operation: SyncOperation,
    pub collection: String,
    pub document_id: Uuid,
    pub data: Value,
    pub status: SyncEntryStatus,
    pub client_timestamp: i64,
    pub enqueued_at: i64,
    /// Stamped when the entry reaches a terminal state.
    pub processed_at: Option<i64>,
    /// Present only for failed entries.
    pub error_message: Option<String>,
}
