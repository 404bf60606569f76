use continuum_core::db::open_db_in_memory;
use continuum_core::model::sync_queue::{NewSyncEntry, SyncEntryStatus, SyncOperation};
use continuum_core::repo::sync_repo::{SqliteSyncQueueRepository, SyncQueueRepository};
use continuum_core::service::sync_service::{ProcessOutcome, SyncService};
use continuum_core::RepoError;
use serde_json::json;
use uuid::Uuid;

fn entry_for(user_id: Uuid, client_timestamp: i64) -> NewSyncEntry {
    NewSyncEntry {
        user_id,
        operation: SyncOperation::Update,
        collection: "tasks".to_string(),
        document_id: Uuid::new_v4(),
        data: json!({ "priority": "high" }),
        client_timestamp,
    }
}

#[test]
fn enqueue_starts_pending_without_processing_stamps() {
    let conn = open_db_in_memory().unwrap();
    let queue = SqliteSyncQueueRepository::try_new(&conn).unwrap();
    let user = Uuid::new_v4();

    let id = queue.enqueue(&entry_for(user, 500), 1_000).unwrap();
    let entry = queue.get_entry(id).unwrap().expect("entry exists");

    assert_eq!(entry.status, SyncEntryStatus::Pending);
    assert_eq!(entry.enqueued_at, 1_000);
    assert_eq!(entry.processed_at, None);
    assert_eq!(entry.error_message, None);
    assert_eq!(entry.data, json!({ "priority": "high" }));
}

#[test]
fn claim_takes_oldest_pending_by_client_timestamp() {
    let conn = open_db_in_memory().unwrap();
    let queue = SqliteSyncQueueRepository::try_new(&conn).unwrap();
    let user = Uuid::new_v4();

    let newer = queue.enqueue(&entry_for(user, 900), 1_000).unwrap();
    let older = queue.enqueue(&entry_for(user, 100), 1_001).unwrap();

    let first = queue.claim_next(user).unwrap().expect("queue has entries");
    assert_eq!(first.uuid, older);
    assert_eq!(first.status, SyncEntryStatus::Processing);

    // The claimed entry is out of the pending pool; the next claim moves on.
    let second = queue.claim_next(user).unwrap().expect("one entry left");
    assert_eq!(second.uuid, newer);

    assert!(queue.claim_next(user).unwrap().is_none());
}

#[test]
fn complete_stamps_processed_at_and_is_terminal() {
    let conn = open_db_in_memory().unwrap();
    let queue = SqliteSyncQueueRepository::try_new(&conn).unwrap();
    let user = Uuid::new_v4();

    let id = queue.enqueue(&entry_for(user, 100), 1_000).unwrap();
    queue.claim_next(user).unwrap();
    queue.complete(id, 2_000).unwrap();

    let entry = queue.get_entry(id).unwrap().expect("entry exists");
    assert_eq!(entry.status, SyncEntryStatus::Completed);
    assert_eq!(entry.processed_at, Some(2_000));

    assert!(matches!(
        queue.fail(id, "too late", 3_000),
        Err(RepoError::Transition(_))
    ));
}

#[test]
fn terminal_states_are_only_reachable_from_processing() {
    let conn = open_db_in_memory().unwrap();
    let queue = SqliteSyncQueueRepository::try_new(&conn).unwrap();
    let user = Uuid::new_v4();

    let id = queue.enqueue(&entry_for(user, 100), 1_000).unwrap();

    assert!(matches!(
        queue.complete(id, 2_000),
        Err(RepoError::Transition(_))
    ));
    assert!(matches!(
        queue.fail(id, "not claimed", 2_000),
        Err(RepoError::Transition(_))
    ));
}

#[test]
fn failed_entry_keeps_its_error_and_retry_creates_a_new_row() {
    let conn = open_db_in_memory().unwrap();
    let queue = SqliteSyncQueueRepository::try_new(&conn).unwrap();
    let user = Uuid::new_v4();

    let id = queue.enqueue(&entry_for(user, 100), 1_000).unwrap();
    queue.claim_next(user).unwrap();
    queue.fail(id, "server rejected payload", 2_000).unwrap();

    let failed = queue.get_entry(id).unwrap().expect("entry exists");
    assert_eq!(failed.status, SyncEntryStatus::Failed);
    assert_eq!(failed.error_message.as_deref(), Some("server rejected payload"));

    let retry_id = queue.retry(id, 3_000).unwrap();
    assert_ne!(retry_id, id);

    let retried = queue.get_entry(retry_id).unwrap().expect("retry exists");
    assert_eq!(retried.status, SyncEntryStatus::Pending);
    assert_eq!(retried.document_id, failed.document_id);
    assert_eq!(retried.data, failed.data);

    // The failed original is untouched by the retry.
    let original = queue.get_entry(id).unwrap().expect("entry exists");
    assert_eq!(original.status, SyncEntryStatus::Failed);
    assert_eq!(original.processed_at, Some(2_000));
}

#[test]
fn retry_is_only_legal_for_failed_entries() {
    let conn = open_db_in_memory().unwrap();
    let queue = SqliteSyncQueueRepository::try_new(&conn).unwrap();
    let user = Uuid::new_v4();

    let id = queue.enqueue(&entry_for(user, 100), 1_000).unwrap();
    assert!(matches!(
        queue.retry(id, 2_000),
        Err(RepoError::Transition(_))
    ));
}

#[test]
fn service_settles_each_claimed_entry_via_the_applier() {
    let conn = open_db_in_memory().unwrap();
    let service = SyncService::new(SqliteSyncQueueRepository::try_new(&conn).unwrap());
    let user = Uuid::new_v4();

    service.enqueue(&entry_for(user, 100)).unwrap();
    let mut bad = entry_for(user, 200);
    bad.collection = "unknown".to_string();
    service.enqueue(&bad).unwrap();

    let applier = |entry: &continuum_core::model::sync_queue::SyncEntry| {
        if entry.collection == "tasks" {
            Ok(())
        } else {
            Err(format!("no handler for {}", entry.collection))
        }
    };

    match service.process_next(user, applier).unwrap() {
        ProcessOutcome::Completed(entry) => {
            assert_eq!(entry.status, SyncEntryStatus::Completed)
        }
        other => panic!("expected completion, got {other:?}"),
    }
    match service.process_next(user, applier).unwrap() {
        ProcessOutcome::Failed(entry) => {
            assert_eq!(entry.status, SyncEntryStatus::Failed);
            assert_eq!(entry.error_message.as_deref(), Some("no handler for unknown"));
        }
        other => panic!("expected failure, got {other:?}"),
    }
    assert!(matches!(
        service.process_next(user, applier).unwrap(),
        ProcessOutcome::Drained
    ));
}

#[test]
fn settlement_refuses_a_row_that_changed_after_the_claim_was_read() {
    let conn = open_db_in_memory().unwrap();
    let queue = SqliteSyncQueueRepository::try_new(&conn).unwrap();
    let user = Uuid::new_v4();

    let id = queue.enqueue(&entry_for(user, 100), 1_000).unwrap();
    queue.claim_next(user).unwrap().expect("entry claimed");

    // A racing writer moves the row out of `processing` between the
    // settlement read and its UPDATE.
    conn.execute(
        "UPDATE sync_queue SET status = 'pending' WHERE uuid = ?1;",
        [id.to_string()],
    )
    .unwrap();

    assert!(matches!(
        queue.complete(id, 2_000),
        Err(RepoError::Transition(_))
    ));
    assert!(matches!(
        queue.fail(id, "boom", 2_000),
        Err(RepoError::Transition(_))
    ));

    let entry = queue.get_entry(id).unwrap().expect("entry exists");
    assert_eq!(entry.status, SyncEntryStatus::Pending);
    assert_eq!(entry.processed_at, None);
}
