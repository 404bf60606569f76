//! Messaging use-case service.
//!
//! # Responsibility
//! - Start conversations and append messages through the repository, which
//!   keeps the inbox cache and unread counters consistent.
//! - Expose the inbox view sorted by last activity.
//!
//! # Invariants
//! - Sending always leaves the conversation's `last_message` equal to the
//!   sent message and every other participant's counter incremented.

use crate::model::conversation::{Conversation, ConversationId};
use crate::model::message::{Message, MessageId, NewMessage};
use crate::model::user::UserId;
use crate::repo::conversation_repo::ConversationRepository;
use crate::repo::{now_ms, RepoError};
use log::info;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Service error for messaging use-cases.
#[derive(Debug)]
pub enum MessagingServiceError {
    /// The sender or reader is not a participant of the conversation.
    NotAParticipant(ConversationId),
    /// Persistence-layer failure.
    Repo(RepoError),
    /// Internal consistency mismatch between write and read-back.
    InconsistentState(&'static str),
}

impl Display for MessagingServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotAParticipant(conversation_id) => {
                write!(f, "not a participant of conversation {conversation_id}")
            }
            Self::Repo(err) => write!(f, "{err}"),
            Self::InconsistentState(details) => {
                write!(f, "inconsistent messaging state: {details}")
            }
        }
    }
}

impl Error for MessagingServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for MessagingServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::ReferenceNotFound {
                collection: "conversations",
                id,
            } => Self::NotAParticipant(id),
            other => Self::Repo(other),
        }
    }
}

/// Messaging service facade over the conversation repository.
pub struct MessagingService<R: ConversationRepository> {
    conversations: R,
}

impl<R: ConversationRepository> MessagingService<R> {
    /// Creates a service using the provided repository implementation.
    pub fn new(conversations: R) -> Self {
        Self { conversations }
    }

    /// Starts a conversation between at least two distinct users.
    pub fn start_conversation(
        &self,
        participants: &[UserId],
    ) -> Result<Conversation, MessagingServiceError> {
        let conversation_id = self
            .conversations
            .create_conversation(participants, now_ms())?;
        info!(
            "event=conversation_start module=messaging status=ok conversation={conversation_id} participants={}",
            participants.len()
        );

        self.conversations
            .get_conversation(conversation_id)?
            .ok_or(MessagingServiceError::InconsistentState(
                "created conversation not found in read-back",
            ))
    }

    /// Sends one message and returns it with its sender receipt.
    pub fn send_message(&self, message: &NewMessage) -> Result<Message, MessagingServiceError> {
        let message_id = self.conversations.append_message(message, now_ms())?;
        info!(
            "event=message_send module=messaging status=ok message={message_id} conversation={}",
            message.conversation_id
        );

        self.find_message(message.conversation_id, message_id)
    }

    /// The reader's inbox, most recently active conversation first.
    pub fn inbox(&self, user_id: UserId) -> Result<Vec<Conversation>, MessagingServiceError> {
        Ok(self.conversations.list_for_user(user_id)?)
    }

    /// Messages of one conversation in send order.
    pub fn history(
        &self,
        conversation_id: ConversationId,
    ) -> Result<Vec<Message>, MessagingServiceError> {
        Ok(self.conversations.list_messages(conversation_id)?)
    }

    /// Marks a conversation read for one participant; returns how many
    /// messages were newly receipted.
    pub fn mark_read(
        &self,
        conversation_id: ConversationId,
        reader_id: UserId,
    ) -> Result<usize, MessagingServiceError> {
        let receipted = self
            .conversations
            .mark_read(conversation_id, reader_id, now_ms())?;
        info!(
            "event=conversation_read module=messaging status=ok conversation={conversation_id} receipted={receipted}"
        );
        Ok(receipted)
    }

    fn find_message(
        &self,
        conversation_id: ConversationId,
        message_id: MessageId,
    ) -> Result<Message, MessagingServiceError> {
        self.conversations
            .list_messages(conversation_id)?
            .into_iter()
            .find(|message| message.uuid == message_id)
            .ok_or(MessagingServiceError::InconsistentState(
                "sent message not found in read-back",
            ))
    }
}
