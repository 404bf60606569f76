//! Resume model with embedded append-only feedback entries.
//!
//! # Invariants
//! - `feedback` is append-only; entries are produced by the external AI
//!   feedback service and never edited afterwards.
//! - `extracted_text` is privileged: excluded from default reads, returned
//!   only by an explicit accessor.

use crate::model::user::UserId;
use crate::model::{require_text, ValidationError};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type ResumeId = Uuid;

/// Per-section score inside one feedback entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionFeedback {
    pub name: String,
    pub feedback: String,
    pub score: i64,
}

/// Keyword coverage analysis inside one feedback entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordOptimization {
    pub present_keywords: Vec<String>,
    pub missing_keywords: Vec<String>,
}

/// One embedded AI feedback entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackEntry {
    pub overall_score: i64,
    pub strengths: Vec<String>,
    pub improvements: Vec<String>,
    pub sections: Vec<SectionFeedback>,
    pub keyword_optimization: KeywordOptimization,
    /// Identifier of the model that generated the entry.
    pub model: String,
    pub generated_at: i64,
}

/// Creation input for one resume document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewResume {
    pub user_id: UserId,
    pub file_name: String,
    pub file_url: String,
    pub file_size: i64,
    pub mime_type: String,
    /// Version label, e.g. "Software Engineer v1".
    pub version: String,
    pub target_role: Option<String>,
}

impl NewResume {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_text("file_name", &self.file_name)?;
        require_text("file_url", &self.file_url)?;
        require_text("mime_type", &self.mime_type)?;
        require_text("version", &self.version)?;
        if self.file_size <= 0 {
            return Err(ValidationError::invalid(
                "file_size",
                "file size must be positive",
            ));
        }
        Ok(())
    }
}

/// Default read model for one resume. Excludes `extracted_text`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resume {
    pub uuid: ResumeId,
    pub user_id: UserId,
    pub file_name: String,
    pub file_url: String,
    pub file_size: i64,
    pub mime_type: String,
    pub version: String,
    pub target_role: Option<String>,
    pub uploaded_at: i64,
    pub feedback: Vec<FeedbackEntry>,
}

impl Resume {
    /// Derived: any feedback entry exists.
    pub fn has_feedback(&self) -> bool {
        !self.feedback.is_empty()
    }

    /// Derived: feedback entry with the most recent `generated_at`.
    pub fn latest_feedback(&self) -> Option<&FeedbackEntry> {
        self.feedback.iter().max_by_key(|entry| entry.generated_at)
    }
}
