use continuum_core::db::open_db_in_memory;
use continuum_core::model::flashcard::{NewFlashcard, NewFlashcardSet};
use continuum_core::model::note::{ContentType, NewNote, Visibility};
use continuum_core::model::user::NewUser;
use continuum_core::repo::flashcard_repo::{FlashcardRepository, SqliteFlashcardRepository};
use continuum_core::repo::note_repo::{NoteRepository, SqliteNoteRepository};
use continuum_core::repo::user_repo::{SqliteUserRepository, UserRepository};
use continuum_core::RepoError;
use uuid::Uuid;

fn seed_user(conn: &rusqlite::Connection, username: &str) -> Uuid {
    let users = SqliteUserRepository::try_new(conn).unwrap();
    users
        .create_user(&NewUser {
            email: format!("{username}@continuum.dev"),
            username: username.to_string(),
            password_hash: "hash".to_string(),
            first_name: username.to_string(),
            last_name: "Tester".to_string(),
        })
        .expect("user should be created")
}

fn note_for(user_id: Uuid, title: &str, tags: &[&str]) -> NewNote {
    NewNote {
        user_id,
        title: title.to_string(),
        content: "content body".to_string(),
        content_type: ContentType::Markdown,
        subject: None,
        tags: tags.iter().map(|t| t.to_string()).collect(),
        visibility: Visibility::Private,
    }
}

#[test]
fn duplicate_email_or_username_is_rejected() {
    let conn = open_db_in_memory().unwrap();
    let users = SqliteUserRepository::try_new(&conn).unwrap();

    users
        .create_user(&NewUser {
            email: "alice@continuum.dev".to_string(),
            username: "alice".to_string(),
            password_hash: "hash".to_string(),
            first_name: "Alice".to_string(),
            last_name: "One".to_string(),
        })
        .unwrap();

    let same_email = users.create_user(&NewUser {
        email: "alice@continuum.dev".to_string(),
        username: "alice2".to_string(),
        password_hash: "hash".to_string(),
        first_name: "Alice".to_string(),
        last_name: "Two".to_string(),
    });
    assert!(matches!(
        same_email,
        Err(RepoError::Duplicate {
            collection: "users",
            ..
        })
    ));

    let same_username = users.create_user(&NewUser {
        email: "other@continuum.dev".to_string(),
        username: "alice".to_string(),
        password_hash: "hash".to_string(),
        first_name: "Alice".to_string(),
        last_name: "Three".to_string(),
    });
    assert!(matches!(same_username, Err(RepoError::Duplicate { .. })));
}

#[test]
fn password_hash_is_only_reachable_via_the_explicit_accessor() {
    let conn = open_db_in_memory().unwrap();
    let users = SqliteUserRepository::try_new(&conn).unwrap();
    let id = seed_user(&conn, "secretive");

    // The default read model carries no hash field; the accessor does.
    let user = users.get_user(id).unwrap().expect("user exists");
    assert_eq!(user.full_name(), "secretive Tester");
    assert_eq!(
        users.get_password_hash(id).unwrap().as_deref(),
        Some("hash")
    );
}

#[test]
fn note_tags_are_normalized_and_deduplicated() {
    let conn = open_db_in_memory().unwrap();
    let user = seed_user(&conn, "tagger");
    let notes = SqliteNoteRepository::try_new(&conn).unwrap();

    let id = notes
        .create_note(&note_for(user, "CS 101", &["Algorithms", "  EXAM ", "algorithms"]))
        .unwrap();

    let note = notes.get_note(id).unwrap().expect("note exists");
    assert_eq!(note.tags, vec!["algorithms".to_string(), "exam".to_string()]);

    let by_tag = notes.list_notes(user, Some("EXAM")).unwrap();
    assert_eq!(by_tag.len(), 1);
}

#[test]
fn note_summary_is_one_per_note_and_replaced_on_rewrite() {
    let conn = open_db_in_memory().unwrap();
    let user = seed_user(&conn, "summarized");
    let notes = SqliteNoteRepository::try_new(&conn).unwrap();

    let id = notes.create_note(&note_for(user, "Long note", &[])).unwrap();
    assert!(!notes.get_note(id).unwrap().unwrap().has_summary);

    notes.set_summary(id, "first pass", "llama-3.1-70b").unwrap();
    notes.set_summary(id, "second pass", "llama-3.1-70b").unwrap();

    let summary = notes.get_summary(id).unwrap().expect("summary exists");
    assert_eq!(summary.content, "second pass");
    assert!(notes.get_note(id).unwrap().unwrap().has_summary);

    let rows: i64 = conn
        .query_row("SELECT COUNT(*) FROM note_summaries;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(rows, 1);

    notes.clear_summary(id).unwrap();
    assert!(notes.get_summary(id).unwrap().is_none());
    assert!(!notes.get_note(id).unwrap().unwrap().has_summary);
}

#[test]
fn total_cards_tracks_card_mutations() {
    let conn = open_db_in_memory().unwrap();
    let user = seed_user(&conn, "drills");
    let flashcards = SqliteFlashcardRepository::try_new(&conn).unwrap();

    let set_id = flashcards
        .create_set(&NewFlashcardSet {
            user_id: user,
            note_id: None,
            title: "Graph drill".to_string(),
            description: None,
            visibility: Visibility::Private,
        })
        .unwrap();
    assert_eq!(flashcards.get_set(set_id).unwrap().unwrap().total_cards, 0);

    let first = flashcards
        .add_card(
            set_id,
            &NewFlashcard {
                front: "BFS?".to_string(),
                back: "Queue".to_string(),
            },
        )
        .unwrap();
    flashcards
        .add_card(
            set_id,
            &NewFlashcard {
                front: "DFS?".to_string(),
                back: "Stack".to_string(),
            },
        )
        .unwrap();

    let set = flashcards.get_set(set_id).unwrap().expect("set exists");
    assert_eq!(set.total_cards, 2);
    assert_eq!(set.flashcards.len(), 2);
    assert_eq!(set.flashcards[0].order, 0);
    assert_eq!(set.flashcards[1].order, 1);

    flashcards.remove_card(first).unwrap();
    let set = flashcards.get_set(set_id).unwrap().expect("set exists");
    assert_eq!(set.total_cards, 1);
    assert_eq!(set.flashcards[0].front, "DFS?");
}

#[test]
fn cards_require_an_existing_set() {
    let conn = open_db_in_memory().unwrap();
    let flashcards = SqliteFlashcardRepository::try_new(&conn).unwrap();

    let result = flashcards.add_card(
        Uuid::new_v4(),
        &NewFlashcard {
            front: "front".to_string(),
            back: "back".to_string(),
        },
    );
    assert!(matches!(
        result,
        Err(RepoError::NotFound {
            collection: "flashcard_sets",
            ..
        })
    ));
}

#[test]
fn remove_card_distinguishes_missing_rows_from_storage_errors() {
    let conn = open_db_in_memory().unwrap();
    let flashcards = SqliteFlashcardRepository::try_new(&conn).unwrap();

    assert!(matches!(
        flashcards.remove_card(Uuid::new_v4()),
        Err(RepoError::NotFound {
            collection: "flashcards",
            ..
        })
    ));

    conn.execute_batch("ALTER TABLE flashcards RENAME TO flashcards_gone;")
        .unwrap();
    assert!(matches!(
        flashcards.remove_card(Uuid::new_v4()),
        Err(RepoError::Db(_))
    ));
}
