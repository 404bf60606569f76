//! Seed-and-verify entry point.
//!
//! # Responsibility
//! - Populate a store with demo data across every collection.
//! - Read the data back and verify the derived fields and caches the core
//!   maintains, printing a deterministic report.

use continuum_core::model::activity::{ActivityType, NewActivity};
use continuum_core::model::comment::NewComment;
use continuum_core::model::flashcard::{NewFlashcard, NewFlashcardSet};
use continuum_core::model::friendship::FriendshipStatus;
use continuum_core::model::message::NewMessage;
use continuum_core::model::note::{ContentType, NewNote, Visibility};
use continuum_core::model::sync_queue::{NewSyncEntry, SyncOperation};
use continuum_core::model::task::{NewTask, TaskPriority, TaskStatus, TaskType};
use continuum_core::model::user::NewUser;
use continuum_core::repo::career_repo::{CareerRepository, SqliteCareerRepository};
use continuum_core::repo::flashcard_repo::{FlashcardRepository, SqliteFlashcardRepository};
use continuum_core::repo::note_repo::{NoteRepository, SqliteNoteRepository};
use continuum_core::repo::task_repo::{SqliteTaskRepository, TaskRepository};
use continuum_core::repo::user_repo::{SqliteUserRepository, UserRepository};
use continuum_core::repo::{
    activity_repo::SqliteActivityRepository, comment_repo::SqliteCommentRepository,
    conversation_repo::SqliteConversationRepository, friendship_repo::SqliteFriendshipRepository,
    now_ms, sync_repo::SqliteSyncQueueRepository,
};
use continuum_core::service::messaging_service::MessagingService;
use continuum_core::service::social_service::SocialService;
use continuum_core::service::sync_service::{ProcessOutcome, SyncService};
use continuum_core::{
    core_version, default_log_level, init_logging, open_store, StoreConfig, TargetRef,
};
use continuum_core::model::application::NewApplication;
use continuum_core::model::resume::NewResume;
use serde_json::json;
use std::error::Error;
use std::process::ExitCode;

fn main() -> ExitCode {
    let log_dir = std::env::temp_dir().join("continuum-seed-logs");
    if let Err(err) = init_logging(default_log_level(), &log_dir.to_string_lossy()) {
        eprintln!("logging init failed: {err}");
    }
    println!("continuum_core version={}", core_version());

    match run() {
        Ok(()) => {
            println!("\n--- Seed script finished ---");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("seed failed: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let config = StoreConfig::from_env();
    let conn = open_store(&config)?;
    println!("--- Starting seed script ---\n");

    let users = SqliteUserRepository::try_new(&conn)?;
    let notes = SqliteNoteRepository::try_new(&conn)?;
    let flashcards = SqliteFlashcardRepository::try_new(&conn)?;
    let tasks = SqliteTaskRepository::try_new(&conn)?;
    let career = SqliteCareerRepository::try_new(&conn)?;

    // USERS
    let carol = users.create_user(&NewUser {
        email: "carol@continuum.dev".to_string(),
        username: "carol".to_string(),
        password_hash: "$2b$10$seeded-hash-carol".to_string(),
        first_name: "Carol".to_string(),
        last_name: "Davis".to_string(),
    })?;
    let dave = users.create_user(&NewUser {
        email: "dave@continuum.dev".to_string(),
        username: "dave".to_string(),
        password_hash: "$2b$10$seeded-hash-dave".to_string(),
        first_name: "Dave".to_string(),
        last_name: "Wilson".to_string(),
    })?;
    println!("USERS CREATED");
    for id in [carol, dave] {
        let user = users.get_user(id)?.ok_or("seeded user missing")?;
        println!("  {} | {}", user.uuid, user.full_name());
    }
    println!();

    // NOTES
    let note_id = notes.create_note(&NewNote {
        user_id: carol,
        title: "Graph traversal".to_string(),
        content: "# BFS vs DFS\nQueue vs stack, visited sets.".to_string(),
        content_type: ContentType::Markdown,
        subject: Some("Algorithms".to_string()),
        tags: vec!["Algorithms".to_string(), "exam".to_string()],
        visibility: Visibility::Friends,
    })?;
    notes.set_summary(note_id, "BFS explores level by level; DFS dives deep.", "llama-3.1-70b")?;
    let note = notes.get_note(note_id)?.ok_or("seeded note missing")?;
    println!("NOTE CREATED");
    println!("  {} | tags={:?} has_summary={}", note.uuid, note.tags, note.has_summary);
    println!();

    // FLASHCARDS
    let set_id = flashcards.create_set(&NewFlashcardSet {
        user_id: carol,
        note_id: Some(note_id),
        title: "Graph traversal drill".to_string(),
        description: None,
        visibility: Visibility::Private,
    })?;
    flashcards.add_card(
        set_id,
        &NewFlashcard {
            front: "BFS data structure?".to_string(),
            back: "Queue".to_string(),
        },
    )?;
    flashcards.add_card(
        set_id,
        &NewFlashcard {
            front: "DFS data structure?".to_string(),
            back: "Stack (or recursion)".to_string(),
        },
    )?;
    let set = flashcards.get_set(set_id)?.ok_or("seeded set missing")?;
    println!("FLASHCARD SET CREATED");
    println!("  {} | total_cards={}", set.uuid, set.total_cards);
    println!();

    // TASKS
    let task_id = tasks.create_task(
        &NewTask {
            user_id: dave,
            title: "Review graph traversal".to_string(),
            description: Some("Before the algorithms exam".to_string()),
            due_date: now_ms() + 86_400_000,
            task_type: TaskType::Study,
            priority: TaskPriority::High,
        },
        now_ms(),
    )?;
    tasks.set_status(task_id, TaskStatus::Completed, now_ms())?;
    let task = tasks.get_task(task_id)?.ok_or("seeded task missing")?;
    println!("TASK CREATED");
    println!(
        "  {} | status={} completed_at_set={}",
        task.uuid,
        task.status.as_str(),
        task.completed_at.is_some()
    );
    println!();

    // SOCIAL: friendship, comment, activity
    let social = SocialService::new(
        SqliteFriendshipRepository::try_new(&conn)?,
        SqliteCommentRepository::try_new(&conn)?,
        SqliteActivityRepository::try_new(&conn)?,
    );
    let request = social.send_friend_request(carol, dave)?;
    let accepted = social.respond_to_request(request.uuid, FriendshipStatus::Accepted)?;
    println!("FRIENDSHIP");
    println!(
        "  {} | status={} pair=({}, {})",
        accepted.uuid,
        accepted.status.as_str(),
        accepted.user_lo,
        accepted.user_hi
    );

    let comment = social.create_comment(&NewComment {
        target: TargetRef::note(note_id),
        user_id: dave,
        content: "This helped me a lot, thanks!".to_string(),
        parent_id: None,
    })?;
    println!("COMMENT");
    println!(
        "  {} | author_snapshot={} {}",
        comment.uuid, comment.user_snapshot.first_name, comment.user_snapshot.last_name
    );

    let activity = social.publish_activity(&NewActivity {
        user_id: carol,
        activity_type: ActivityType::NoteShared,
        target: TargetRef::note(note_id),
        metadata: Some(json!({ "noteTitle": "Graph traversal", "sharedWith": "friends" })),
    })?;
    println!("ACTIVITY");
    println!(
        "  {} | type={} visible_to={} viewer(s)",
        activity.uuid,
        activity.activity_type.as_str(),
        activity.visible_to.len()
    );
    let dave_feed = social.feed_for(dave)?;
    println!("  dave feed entries: {}", dave_feed.len());
    println!();

    // MESSAGING: conversation, messages, unread counters
    let messaging = MessagingService::new(SqliteConversationRepository::try_new(&conn)?);
    let conversation = messaging.start_conversation(&[carol, dave])?;
    messaging.send_message(&NewMessage {
        conversation_id: conversation.uuid,
        sender_id: carol,
        content: "Hey Dave! Want to study for the algorithms exam together?".to_string(),
        client_timestamp: None,
    })?;
    messaging.send_message(&NewMessage {
        conversation_id: conversation.uuid,
        sender_id: dave,
        content: "Sure! I was just reviewing graph traversal. Library at 3pm?".to_string(),
        client_timestamp: Some(now_ms()),
    })?;
    let inbox = messaging.inbox(carol)?;
    let current = inbox.first().ok_or("seeded conversation missing")?;
    println!("CONVERSATION");
    println!(
        "  {} | last_preview={:?} carol_unread={:?}",
        current.uuid,
        current.last_message.as_ref().map(|cache| cache.preview.as_str()),
        current.unread_for(carol)
    );
    let receipted = messaging.mark_read(conversation.uuid, carol)?;
    println!("  carol marked read, receipted {receipted} message(s)");
    println!();

    // SYNC QUEUE: enqueue, process, retry
    let sync = SyncService::new(SqliteSyncQueueRepository::try_new(&conn)?);
    sync.enqueue(&NewSyncEntry {
        user_id: dave,
        operation: SyncOperation::Update,
        collection: "tasks".to_string(),
        document_id: task_id,
        data: json!({ "priority": "medium" }),
        client_timestamp: now_ms() - 60_000,
    })?;
    let outcome = sync.process_next(dave, |entry| {
        if entry.collection == "tasks" {
            Ok(())
        } else {
            Err(format!("unknown collection {}", entry.collection))
        }
    })?;
    println!("SYNC QUEUE");
    match outcome {
        ProcessOutcome::Completed(entry) => println!(
            "  {} | status={} processed_at_set={}",
            entry.uuid,
            entry.status.as_str(),
            entry.processed_at.is_some()
        ),
        ProcessOutcome::Failed(entry) => println!(
            "  {} | status={} error={:?}",
            entry.uuid,
            entry.status.as_str(),
            entry.error_message
        ),
        ProcessOutcome::Drained => println!("  queue drained unexpectedly"),
    }
    println!();

    // CAREER: resume and application
    let resume_id = career.create_resume(
        &NewResume {
            user_id: dave,
            file_name: "dave-wilson-resume.pdf".to_string(),
            file_url: "https://cdn.continuum.dev/resumes/dave-v1.pdf".to_string(),
            file_size: 245_000,
            mime_type: "application/pdf".to_string(),
            version: "Software Engineer v1".to_string(),
            target_role: Some("Backend Engineer".to_string()),
        },
        now_ms(),
    )?;
    let application_id = career.create_application(
        &NewApplication {
            user_id: dave,
            company: "Vertex Labs".to_string(),
            position: "Backend Engineer Intern".to_string(),
            location: Some("Remote".to_string()),
            job_url: None,
            applied_at: now_ms(),
            deadline_date: None,
            resume_used: Some(resume_id),
            notes: Some("Referred by Carol".to_string()),
        },
        now_ms(),
    )?;
    career.add_interview_date(application_id, now_ms() + 7 * 86_400_000, now_ms())?;
    let application = career
        .get_application(application_id)?
        .ok_or("seeded application missing")?;
    println!("CAREER");
    println!(
        "  resume {} -> application {} | status={} interviews={}",
        resume_id,
        application.uuid,
        application.status.as_str(),
        application.interview_dates.len()
    );

    Ok(())
}
