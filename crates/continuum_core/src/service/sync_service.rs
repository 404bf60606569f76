//! Sync queue use-case service.
//!
//! # Responsibility
//! - Enqueue offline mutations and drive their lifecycle.
//! - Drain the queue through a caller-supplied applier.
//!
//! # Invariants
//! - One entry is in flight per `process_next` call: claim, apply, then
//!   settle to `completed` or `failed` before returning.
//! - A failed entry is never mutated again; retrying creates a new row.

use crate::model::sync_queue::{NewSyncEntry, SyncEntry, SyncEntryId, SyncEntryStatus};
use crate::model::user::UserId;
use crate::repo::sync_repo::SyncQueueRepository;
use crate::repo::{now_ms, RepoError};
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Outcome of processing one claimed entry.
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessOutcome {
    /// The queue had no pending entry for the user.
    Drained,
    /// The entry was applied and completed.
    Completed(SyncEntry),
    /// The applier rejected the entry; it is now failed.
    Failed(SyncEntry),
}

/// Service error for sync use-cases.
#[derive(Debug)]
pub enum SyncServiceError {
    /// Persistence-layer failure.
    Repo(RepoError),
    /// Internal consistency mismatch between write and read-back.
    InconsistentState(&'static str),
}

impl Display for SyncServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Repo(err) => write!(f, "{err}"),
            Self::InconsistentState(details) => {
                write!(f, "inconsistent sync state: {details}")
            }
        }
    }
}

impl Error for SyncServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            Self::InconsistentState(_) => None,
        }
    }
}

impl From<RepoError> for SyncServiceError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

/// Sync service facade over the queue repository.
pub struct SyncService<R: SyncQueueRepository> {
    queue: R,
}

impl<R: SyncQueueRepository> SyncService<R> {
    /// Creates a service using the provided repository implementation.
    pub fn new(queue: R) -> Self {
        Self { queue }
    }

    /// Enqueues one offline mutation as pending.
    pub fn enqueue(&self, entry: &NewSyncEntry) -> Result<SyncEntry, SyncServiceError> {
        let entry_id = self.queue.enqueue(entry, now_ms())?;
        info!(
            "event=sync_enqueue module=sync status=ok entry={entry_id} collection={}",
            entry.collection
        );

        self.require_entry(entry_id)
    }

    /// Claims the oldest pending entry for a user and applies it.
    ///
    /// The applier receives the claimed entry; `Ok` settles it as
    /// completed, `Err` as failed with the returned message.
    pub fn process_next<F>(
        &self,
        user_id: UserId,
        mut applier: F,
    ) -> Result<ProcessOutcome, SyncServiceError>
    where
        F: FnMut(&SyncEntry) -> Result<(), String>,
    {
        let claimed = match self.queue.claim_next(user_id)? {
            Some(entry) => entry,
            None => return Ok(ProcessOutcome::Drained),
        };

        match applier(&claimed) {
            Ok(()) => {
                self.queue.complete(claimed.uuid, now_ms())?;
                info!(
                    "event=sync_process module=sync status=completed entry={}",
                    claimed.uuid
                );
                Ok(ProcessOutcome::Completed(self.require_entry(claimed.uuid)?))
            }
            Err(reason) => {
                self.queue.fail(claimed.uuid, &reason, now_ms())?;
                warn!(
                    "event=sync_process module=sync status=failed entry={} reason={reason}",
                    claimed.uuid
                );
                Ok(ProcessOutcome::Failed(self.require_entry(claimed.uuid)?))
            }
        }
    }

    /// Re-enqueues one failed entry as a fresh pending entry.
    pub fn retry_failed(&self, entry_id: SyncEntryId) -> Result<SyncEntry, SyncServiceError> {
        let retry_id = self.queue.retry(entry_id, now_ms())?;
        info!("event=sync_retry module=sync status=ok failed={entry_id} retry={retry_id}");
        self.require_entry(retry_id)
    }

    /// Pending entries for a user, oldest first.
    pub fn pending_for(&self, user_id: UserId) -> Result<Vec<SyncEntry>, SyncServiceError> {
        Ok(self
            .queue
            .list_for_user(user_id, Some(SyncEntryStatus::Pending))?)
    }

    fn require_entry(&self, entry_id: SyncEntryId) -> Result<SyncEntry, SyncServiceError> {
        self.queue
            .get_entry(entry_id)?
            .ok_or(SyncServiceError::InconsistentState(
                "queue entry not found in read-back",
            ))
    }
}
