//! Job application model with pipeline status and embedded sub-documents.
//!
//! # Invariants
//! - Status progresses through the pipeline; terminal states never change.
//! - `interview_dates` is append-only.

use crate::model::resume::ResumeId;
use crate::model::user::UserId;
use crate::model::{require_text, InvalidTransition, ValidationError};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type ApplicationId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Applied,
    Interview,
    Offer,
    Rejected,
    Withdrawn,
}

impl ApplicationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Applied => "applied",
            Self::Interview => "interview",
            Self::Offer => "offer",
            Self::Rejected => "rejected",
            Self::Withdrawn => "withdrawn",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "applied" => Some(Self::Applied),
            "interview" => Some(Self::Interview),
            "offer" => Some(Self::Offer),
            "rejected" => Some(Self::Rejected),
            "withdrawn" => Some(Self::Withdrawn),
            _ => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Offer | Self::Rejected | Self::Withdrawn)
    }

    /// Checks a pipeline progression step. Applied and interview stages may
    /// move forward or exit; terminal stages never move.
    pub fn check_transition(self, next: ApplicationStatus) -> Result<(), InvalidTransition> {
        let legal = match (self, next) {
            (Self::Applied, Self::Interview)
            | (Self::Applied, Self::Offer)
            | (Self::Applied, Self::Rejected)
            | (Self::Applied, Self::Withdrawn)
            | (Self::Interview, Self::Offer)
            | (Self::Interview, Self::Rejected)
            | (Self::Interview, Self::Withdrawn) => true,
            _ => false,
        };
        if legal {
            Ok(())
        } else {
            Err(InvalidTransition {
                entity: "application",
                from: self.as_str(),
                to: next.as_str(),
            })
        }
    }
}

/// Embedded recruiting contact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub name: String,
    pub role: Option<String>,
    pub email: Option<String>,
    pub linked_in: Option<String>,
    pub last_contact_date: Option<i64>,
    pub notes: Option<String>,
}

/// Embedded follow-up reminder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowUpReminder {
    pub date: i64,
    pub description: String,
    pub completed: bool,
}

/// Creation input for one application document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewApplication {
    pub user_id: UserId,
    pub company: String,
    pub position: String,
    pub location: Option<String>,
    pub job_url: Option<String>,
    pub applied_at: i64,
    pub deadline_date: Option<i64>,
    pub resume_used: Option<ResumeId>,
    pub notes: Option<String>,
}

impl NewApplication {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_text("company", &self.company)?;
        require_text("position", &self.position)?;
        Ok(())
    }
}

/// Read model for one application document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Application {
    pub uuid: ApplicationId,
    pub user_id: UserId,
    pub company: String,
    pub position: String,
    pub location: Option<String>,
    pub job_url: Option<String>,
    pub status: ApplicationStatus,
    pub applied_at: i64,
    pub deadline_date: Option<i64>,
    pub resume_used: Option<ResumeId>,
    pub interview_dates: Vec<i64>,
    pub contacts: Vec<Contact>,
    pub follow_up_reminders: Vec<FollowUpReminder>,
    pub notes: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[cfg(test)]
mod tests {
    use super::ApplicationStatus;

    #[test]
    fn pipeline_moves_forward_only() {
        use ApplicationStatus::*;

        Applied.check_transition(Interview).expect("legal");
        Interview.check_transition(Offer).expect("legal");
        Applied.check_transition(Withdrawn).expect("legal");

        assert!(Interview.check_transition(Applied).is_err());
        assert!(Offer.check_transition(Rejected).is_err());
        assert!(Rejected.check_transition(Interview).is_err());
        assert!(Applied.check_transition(Applied).is_err());
    }

    #[test]
    fn terminal_states_are_offer_rejected_withdrawn() {
        assert!(ApplicationStatus::Offer.is_terminal());
        assert!(ApplicationStatus::Rejected.is_terminal());
        assert!(ApplicationStatus::Withdrawn.is_terminal());
        assert!(!ApplicationStatus::Applied.is_terminal());
        assert!(!ApplicationStatus::Interview.is_terminal());
    }
}
