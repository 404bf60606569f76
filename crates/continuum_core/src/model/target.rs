//! Polymorphic target references used by comments and activities.
//!
//! A target is modeled as a tagged union over the finite set of commentable
//! collections, so dereferencing is exhaustively handled per target kind
//! instead of carrying an untyped identifier around.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Collections a comment or activity may point at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TargetKind {
    Note,
    FlashcardSet,
    Task,
    Comment,
}

impl TargetKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Note => "note",
            Self::FlashcardSet => "flashcardSet",
            Self::Task => "task",
            Self::Comment => "comment",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "note" => Some(Self::Note),
            "flashcardSet" => Some(Self::FlashcardSet),
            "task" => Some(Self::Task),
            "comment" => Some(Self::Comment),
            _ => None,
        }
    }
}

/// One typed reference to a target document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetRef {
    pub kind: TargetKind,
    pub id: Uuid,
}

impl TargetRef {
    pub fn note(id: Uuid) -> Self {
        Self {
            kind: TargetKind::Note,
            id,
        }
    }

    pub fn flashcard_set(id: Uuid) -> Self {
        Self {
            kind: TargetKind::FlashcardSet,
            id,
        }
    }

    pub fn task(id: Uuid) -> Self {
        Self {
            kind: TargetKind::Task,
            id,
        }
    }

    pub fn comment(id: Uuid) -> Self {
        Self {
            kind: TargetKind::Comment,
            id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::TargetKind;

    #[test]
    fn kind_roundtrips_through_storage_text() {
        for kind in [
            TargetKind::Note,
            TargetKind::FlashcardSet,
            TargetKind::Task,
            TargetKind::Comment,
        ] {
            assert_eq!(TargetKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(TargetKind::parse("resume"), None);
    }
}
