//! Conversation model with denormalized inbox cache.
//!
//! # Invariants
//! - `last_message` mirrors the most recent message in the conversation; it
//!   is overwritten by every append in the same transaction.
//! - One unread counter exists per participant; appending increments every
//!   counter except the sender's, and marking read resets exactly one.

use crate::model::user::UserId;
use crate::model::ValidationError;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type ConversationId = Uuid;

/// Longest content preview stored in the `last_message` cache.
pub const LAST_MESSAGE_PREVIEW_MAX_CHARS: usize = 200;

/// Denormalized cache of the most recent message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastMessage {
    pub sender_id: UserId,
    /// Truncated to [`LAST_MESSAGE_PREVIEW_MAX_CHARS`] characters.
    pub preview: String,
    pub sent_at: i64,
}

/// Per-participant unread counter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnreadCount {
    pub user_id: UserId,
    pub count: i64,
}

/// Read model for one conversation document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    pub uuid: ConversationId,
    /// Participants in their original insertion order.
    pub participants: Vec<UserId>,
    pub unread_counts: Vec<UnreadCount>,
    pub last_message: Option<LastMessage>,
    pub created_at: i64,
}

impl Conversation {
    pub fn unread_for(&self, user_id: UserId) -> Option<i64> {
        self.unread_counts
            .iter()
            .find(|entry| entry.user_id == user_id)
            .map(|entry| entry.count)
    }
}

/// Validates a participant list: at least two distinct users, no duplicates.
pub fn validate_participants(participants: &[UserId]) -> Result<(), ValidationError> {
    if participants.len() < 2 {
        return Err(ValidationError::invalid(
            "participants",
            "a conversation needs at least two participants",
        ));
    }
    for (index, user_id) in participants.iter().enumerate() {
        if participants[..index].contains(user_id) {
            return Err(ValidationError::invalid(
                "participants",
                format!("duplicate participant {user_id}"),
            ));
        }
    }
    Ok(())
}

/// Truncates message content for the inbox cache.
pub fn preview_of(content: &str) -> String {
    content.chars().take(LAST_MESSAGE_PREVIEW_MAX_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::{preview_of, validate_participants, LAST_MESSAGE_PREVIEW_MAX_CHARS};
    use uuid::Uuid;

    #[test]
    fn preview_is_bounded() {
        let long = "x".repeat(500);
        assert_eq!(preview_of(&long).chars().count(), LAST_MESSAGE_PREVIEW_MAX_CHARS);
        assert_eq!(preview_of("short"), "short");
    }

    #[test]
    fn participant_list_needs_two_distinct_users() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        assert!(validate_participants(&[a, b]).is_ok());
        assert!(validate_participants(&[a]).is_err());
        assert!(validate_participants(&[a, a]).is_err());
    }
}
