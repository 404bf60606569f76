//! Comment model with denormalized author snapshot and threading.
//!
//! # Invariants
//! - The author snapshot is captured synchronously at creation and never
//!   recomputed; later profile edits do not touch existing comments.
//! - Replies reference a parent comment in the same collection.
//! - Likes are a set of user references.

use crate::model::target::TargetRef;
use crate::model::user::{UserId, UserSnapshot};
use crate::model::{require_text, ValidationError};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type CommentId = Uuid;

/// Creation input for one comment document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewComment {
    pub target: TargetRef,
    pub user_id: UserId,
    pub content: String,
    /// Present for threaded replies.
    pub parent_id: Option<CommentId>,
}

impl NewComment {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_text("content", &self.content)
    }
}

/// Read model for one comment document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub uuid: CommentId,
    pub target: TargetRef,
    pub user_id: UserId,
    pub content: String,
    pub parent_id: Option<CommentId>,
    /// Author profile as it was when the comment was created.
    pub user_snapshot: UserSnapshot,
    /// Users who liked this comment, sorted by uuid text.
    pub likes: Vec<UserId>,
    pub created_at: i64,
}
