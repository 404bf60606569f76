//! Social use-case service.
//!
//! # Responsibility
//! - Drive the friend-request lifecycle over canonical pairs.
//! - Create comments with their author snapshot.
//! - Publish activities, computing the visibility fan-out from the
//!   actor's accepted friends at publish time.
//!
//! # Invariants
//! - An activity's `visible_to` is the actor's accepted friend list at the
//!   moment of publication; later friendship changes do not rewrite it.

use crate::model::activity::{Activity, NewActivity};
use crate::model::comment::{Comment, CommentId, NewComment};
use crate::model::friendship::{Friendship, FriendshipId, FriendshipStatus};
use crate::model::user::UserId;
use crate::repo::activity_repo::ActivityRepository;
use crate::repo::comment_repo::CommentRepository;
use crate::repo::friendship_repo::FriendshipRepository;
use crate::repo::{now_ms, RepoError};
use log::info;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Service error for social use-cases.
#[derive(Debug)]
pub enum SocialServiceError {
    /// A request already exists between the two users.
    AlreadyRequested,
    /// Persistence-layer failure.
    Repo(RepoError),
    /// Internal consistency mismatch between write and read-back.
    InconsistentState(&'static str),
}

impl Display for SocialServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AlreadyRequested => {
                write!(f, "a friendship already exists between these users")
            }
            Self::Repo(err) => write!(f, "{err}"),
            Self::InconsistentState(details) => {
                write!(f, "inconsistent social state: {details}")
            }
        }
    }
}

impl Error for SocialServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for SocialServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::Duplicate { .. } => Self::AlreadyRequested,
            other => Self::Repo(other),
        }
    }
}

/// Social service facade over friendship, comment and activity repositories.
pub struct SocialService<F, C, A>
where
    F: FriendshipRepository,
    C: CommentRepository,
    A: ActivityRepository,
{
    friendships: F,
    comments: C,
    activities: A,
}

impl<F, C, A> SocialService<F, C, A>
where
    F: FriendshipRepository,
    C: CommentRepository,
    A: ActivityRepository,
{
    /// Creates a service using the provided repository implementations.
    pub fn new(friendships: F, comments: C, activities: A) -> Self {
        Self {
            friendships,
            comments,
            activities,
        }
    }

    /// Sends a friend request from `requested_by` to `other`.
    pub fn send_friend_request(
        &self,
        requested_by: UserId,
        other: UserId,
    ) -> Result<Friendship, SocialServiceError> {
        let friendship_id = self
            .friendships
            .create_request(requested_by, other, now_ms())?;
        info!("event=friend_request module=social status=ok friendship={friendship_id}");

        self.friendships
            .get_friendship(friendship_id)?
            .ok_or(SocialServiceError::InconsistentState(
                "created friendship not found in read-back",
            ))
    }

    /// Responds to a pending friend request.
    pub fn respond_to_request(
        &self,
        friendship_id: FriendshipId,
        status: FriendshipStatus,
    ) -> Result<Friendship, SocialServiceError> {
        self.friendships.respond(friendship_id, status, now_ms())?;
        info!(
            "event=friend_response module=social status=ok friendship={friendship_id} response={}",
            status.as_str()
        );

        self.friendships
            .get_friendship(friendship_id)?
            .ok_or(SocialServiceError::InconsistentState(
                "responded friendship not found in read-back",
            ))
    }

    /// Accepted friends of a user.
    pub fn friends_of(&self, user_id: UserId) -> Result<Vec<UserId>, SocialServiceError> {
        Ok(self.friendships.accepted_friend_ids(user_id)?)
    }

    /// Creates one comment, snapshotting the author profile.
    pub fn create_comment(&self, comment: &NewComment) -> Result<Comment, SocialServiceError> {
        let comment_id = self.comments.create_comment(comment, now_ms())?;
        info!("event=comment_create module=social status=ok comment={comment_id}");

        self.comments
            .get_comment(comment_id)?
            .ok_or(SocialServiceError::InconsistentState(
                "created comment not found in read-back",
            ))
    }

    /// Likes a comment; repeat likes by the same user are no-ops.
    pub fn like_comment(
        &self,
        comment_id: CommentId,
        user_id: UserId,
    ) -> Result<Comment, SocialServiceError> {
        self.comments.like(comment_id, user_id)?;
        self.comments
            .get_comment(comment_id)?
            .ok_or(SocialServiceError::InconsistentState(
                "liked comment not found in read-back",
            ))
    }

    /// Publishes one activity, fanning it out to the actor's accepted
    /// friends as of now.
    pub fn publish_activity(
        &self,
        activity: &NewActivity,
    ) -> Result<Activity, SocialServiceError> {
        let now = now_ms();
        let visible_to = self.friendships.accepted_friend_ids(activity.user_id)?;
        let activity_id = self.activities.record(activity, &visible_to, now)?;
        info!(
            "event=activity_publish module=social status=ok activity={activity_id} viewers={}",
            visible_to.len()
        );

        self.activities
            .get_activity(activity_id, now)?
            .ok_or(SocialServiceError::InconsistentState(
                "published activity not found in read-back",
            ))
    }

    /// Unexpired activities visible to a viewer, newest first.
    pub fn feed_for(&self, viewer_id: UserId) -> Result<Vec<Activity>, SocialServiceError> {
        Ok(self.activities.feed_for(viewer_id, now_ms())?)
    }
}
