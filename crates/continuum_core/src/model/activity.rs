//! Activity feed model with fixed-window expiry.
//!
//! # Invariants
//! - `visible_to` is computed once at creation from the actor's friend list
//!   and never re-derived.
//! - Every activity expires 7,776,000 seconds (90 days) after `created_at`;
//!   expired documents are unretrievable and unrecoverable.

use crate::model::target::TargetRef;
use crate::model::user::UserId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

pub type ActivityId = Uuid;

/// Retention window before automatic expiry.
pub const ACTIVITY_TTL_SECONDS: i64 = 7_776_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityType {
    NoteShared,
    FlashcardShared,
    TaskCreated,
    CommentAdded,
    LikeAdded,
}

impl ActivityType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NoteShared => "note_shared",
            Self::FlashcardShared => "flashcard_shared",
            Self::TaskCreated => "task_created",
            Self::CommentAdded => "comment_added",
            Self::LikeAdded => "like_added",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "note_shared" => Some(Self::NoteShared),
            "flashcard_shared" => Some(Self::FlashcardShared),
            "task_created" => Some(Self::TaskCreated),
            "comment_added" => Some(Self::CommentAdded),
            "like_added" => Some(Self::LikeAdded),
            _ => None,
        }
    }
}

/// Creation input for one activity document.
///
/// `metadata` is an open-ended JSON payload whose expected shape depends on
/// `activity_type`:
///
/// | type              | expected metadata keys                  |
/// |-------------------|-----------------------------------------|
/// | `note_shared`     | `noteTitle`, `sharedWith`               |
/// | `flashcard_shared`| `setTitle`, `cardCount`                 |
/// | `task_created`    | `taskTitle`, `dueDate`                  |
/// | `comment_added`   | `commentPreview`, `parentNoteTitle`     |
/// | `like_added`      | `commentPreview`                        |
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewActivity {
    pub user_id: UserId,
    pub activity_type: ActivityType,
    pub target: TargetRef,
    pub metadata: Option<Value>,
}

/// Read model for one activity document.
#[derive(Debug, Clone, PartialEq)]
pub struct Activity {
    pub uuid: ActivityId,
    pub user_id: UserId,
    pub activity_type: ActivityType,
    pub target: TargetRef,
    /// Friends the activity was fanned out to at creation time.
    pub visible_to: Vec<UserId>,
    pub metadata: Option<Value>,
    pub created_at: i64,
}

/// Whether a document created at `created_at_ms` has passed its TTL.
pub fn is_expired(created_at_ms: i64, now_ms: i64) -> bool {
    now_ms - created_at_ms > ACTIVITY_TTL_SECONDS * 1_000
}

#[cfg(test)]
mod tests {
    use super::{is_expired, ActivityType, ACTIVITY_TTL_SECONDS};

    #[test]
    fn ttl_is_ninety_days() {
        assert_eq!(ACTIVITY_TTL_SECONDS, 90 * 24 * 60 * 60);
    }

    #[test]
    fn expiry_boundary_is_exclusive() {
        let created = 1_000_000;
        let ttl_ms = ACTIVITY_TTL_SECONDS * 1_000;
        assert!(!is_expired(created, created + ttl_ms));
        assert!(is_expired(created, created + ttl_ms + 1));
    }

    #[test]
    fn type_roundtrips_through_storage_text() {
        for activity_type in [
            ActivityType::NoteShared,
            ActivityType::FlashcardShared,
            ActivityType::TaskCreated,
            ActivityType::CommentAdded,
            ActivityType::LikeAdded,
        ] {
            assert_eq!(
                ActivityType::parse(activity_type.as_str()),
                Some(activity_type)
            );
        }
    }
}
