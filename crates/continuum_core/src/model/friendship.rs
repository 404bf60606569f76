//! Friendship model: unordered user pair with canonical storage order.
//!
//! # Invariants
//! - The pair is stored canonically: `user_lo < user_hi` as uuid text,
//!   regardless of submission order. The unique index on the pair then
//!   catches duplicates in either direction.
//! - `responded_at` is set exactly on the transition out of `pending`.

use crate::model::user::UserId;
use crate::model::{InvalidTransition, ValidationError};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type FriendshipId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FriendshipStatus {
    Pending,
    Accepted,
    Declined,
    Blocked,
}

impl FriendshipStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Declined => "declined",
            Self::Blocked => "blocked",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "accepted" => Some(Self::Accepted),
            "declined" => Some(Self::Declined),
            "blocked" => Some(Self::Blocked),
            _ => None,
        }
    }

    /// Checks the only legal response transitions: pending -> accepted,
    /// declined or blocked. Unblocking is out of scope.
    pub fn check_response(self, next: FriendshipStatus) -> Result<(), InvalidTransition> {
        let legal = self == Self::Pending && next != Self::Pending;
        if legal {
            Ok(())
        } else {
            Err(InvalidTransition {
                entity: "friendship",
                from: self.as_str(),
                to: next.as_str(),
            })
        }
    }
}

/// Orders an unordered user pair canonically by uuid text.
///
/// # Errors
/// - Self-friendship is rejected as a validation failure.
pub fn canonical_pair(a: UserId, b: UserId) -> Result<(UserId, UserId), ValidationError> {
    if a == b {
        return Err(ValidationError::invalid(
            "user2",
            "a user cannot befriend themselves",
        ));
    }
    if a.to_string() < b.to_string() {
        Ok((a, b))
    } else {
        Ok((b, a))
    }
}

/// Read model for one friendship document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Friendship {
    pub uuid: FriendshipId,
    /// Smaller uuid of the pair (canonical order).
    pub user_lo: UserId,
    /// Larger uuid of the pair (canonical order).
    pub user_hi: UserId,
    /// Which of the two users initiated the request.
    pub requested_by: UserId,
    pub status: FriendshipStatus,
    pub requested_at: i64,
    pub responded_at: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::{canonical_pair, FriendshipStatus};
    use uuid::Uuid;

    #[test]
    fn pair_is_canonical_regardless_of_argument_order() {
        let a = Uuid::parse_str("00000000-0000-4000-8000-000000000001").unwrap();
        let b = Uuid::parse_str("00000000-0000-4000-8000-000000000002").unwrap();

        assert_eq!(canonical_pair(a, b).unwrap(), (a, b));
        assert_eq!(canonical_pair(b, a).unwrap(), (a, b));
    }

    #[test]
    fn self_friendship_is_rejected() {
        let a = Uuid::new_v4();
        assert!(canonical_pair(a, a).is_err());
    }

    #[test]
    fn only_pending_may_be_responded_to() {
        FriendshipStatus::Pending
            .check_response(FriendshipStatus::Accepted)
            .expect("pending -> accepted is legal");
        FriendshipStatus::Pending
            .check_response(FriendshipStatus::Blocked)
            .expect("pending -> blocked is legal");

        assert!(FriendshipStatus::Accepted
            .check_response(FriendshipStatus::Declined)
            .is_err());
        assert!(FriendshipStatus::Pending
            .check_response(FriendshipStatus::Pending)
            .is_err());
    }
}
