//! Flashcard set and card models.
//!
//! # Invariants
//! - `total_cards` must equal the child card count; the write path maintains
//!   this inside the same transaction as every card mutation.
//! - Card order defines display sequence within a set; new cards append at
//!   `max(order) + 1`.

use crate::model::note::{NoteId, Visibility};
use crate::model::user::UserId;
use crate::model::{require_text, ValidationError};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type FlashcardSetId = Uuid;
pub type FlashcardId = Uuid;

/// Creation input for one flashcard set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewFlashcardSet {
    pub user_id: UserId,
    /// Optional source note the set was generated from.
    pub note_id: Option<NoteId>,
    pub title: String,
    pub description: Option<String>,
    pub visibility: Visibility,
}

impl NewFlashcardSet {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_text("title", &self.title)
    }
}

/// Creation input for one card; order is assigned by the write path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewFlashcard {
    pub front: String,
    pub back: String,
}

impl NewFlashcard {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_text("front", &self.front)?;
        require_text("back", &self.back)?;
        Ok(())
    }
}

/// Read model for one card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flashcard {
    pub uuid: FlashcardId,
    pub set_id: FlashcardSetId,
    pub front: String,
    pub back: String,
    /// Display sequence within the set.
    pub order: i64,
}

#[cfg(test)]
mod tests {
    use super::{NewFlashcard, NewFlashcardSet};
    use crate::model::note::Visibility;
    use uuid::Uuid;

    #[test]
    fn set_requires_title() {
        let set = NewFlashcardSet {
            user_id: Uuid::new_v4(),
            note_id: None,
            title: String::new(),
            description: None,
            visibility: Visibility::Private,
        };
        assert!(set.validate().is_err());
    }

    #[test]
    fn card_requires_front_and_back() {
        let card = NewFlashcard {
            front: "What is an array?".to_string(),
            back: " ".to_string(),
        };
        assert!(card.validate().is_err());
    }
}
