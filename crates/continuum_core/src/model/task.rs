//! Task model and completion lifecycle.
//!
//! # Invariants
//! - `completed_at` is null unless status is `completed`.
//! - Entering `completed` stamps `completed_at` in the same operation;
//!   leaving it clears the stamp.

use crate::model::user::UserId;
use crate::model::{require_text, ValidationError};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type TaskId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    Study,
    Assignment,
    Exam,
    Personal,
}

impl TaskType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Study => "study",
            Self::Assignment => "assignment",
            Self::Exam => "exam",
            Self::Personal => "personal",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "study" => Some(Self::Study),
            "assignment" => Some(Self::Assignment),
            "exam" => Some(Self::Exam),
            "personal" => Some(Self::Personal),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Low,
    Medium,
    High,
}

impl TaskPriority {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Todo,
    InProgress,
    Completed,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Todo => "todo",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "todo" => Some(Self::Todo),
            "in_progress" => Some(Self::InProgress),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }
}

/// Creation input for one task document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTask {
    pub user_id: UserId,
    pub title: String,
    pub description: Option<String>,
    /// Epoch milliseconds.
    pub due_date: i64,
    pub task_type: TaskType,
    pub priority: TaskPriority,
}

impl NewTask {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_text("title", &self.title)
    }
}

/// Read model for one task document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub uuid: TaskId,
    pub user_id: UserId,
    pub title: String,
    pub description: Option<String>,
    pub due_date: i64,
    pub task_type: TaskType,
    pub priority: TaskPriority,
    pub status: TaskStatus,
    pub completed_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Task {
    /// Derived: past due and not completed. Never persisted.
    pub fn is_overdue(&self, now_ms: i64) -> bool {
        self.due_date < now_ms && self.status != TaskStatus::Completed
    }
}

/// Returns the `completed_at` value that must accompany a status change.
pub fn completed_at_for(status: TaskStatus, now_ms: i64) -> Option<i64> {
    match status {
        TaskStatus::Completed => Some(now_ms),
        TaskStatus::Todo | TaskStatus::InProgress => None,
    }
}
