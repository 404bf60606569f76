use continuum_core::db::open_db_in_memory;
use continuum_core::model::comment::NewComment;
use continuum_core::model::user::NewUser;
use continuum_core::repo::comment_repo::{CommentRepository, SqliteCommentRepository};
use continuum_core::repo::user_repo::{SqliteUserRepository, UserRepository};
use continuum_core::{RepoError, TargetRef};
use uuid::Uuid;

fn seed_user(conn: &rusqlite::Connection, username: &str) -> Uuid {
    let users = SqliteUserRepository::try_new(conn).unwrap();
    users
        .create_user(&NewUser {
            email: format!("{username}@continuum.dev"),
            username: username.to_string(),
            password_hash: "hash".to_string(),
            first_name: "Original".to_string(),
            last_name: "Name".to_string(),
        })
        .expect("user should be created")
}

fn comment_on_note(author: Uuid, content: &str) -> NewComment {
    NewComment {
        target: TargetRef::note(Uuid::new_v4()),
        user_id: author,
        content: content.to_string(),
        parent_id: None,
    }
}

#[test]
fn author_snapshot_survives_profile_edits() {
    let conn = open_db_in_memory().unwrap();
    let author = seed_user(&conn, "original_handle");
    let comments = SqliteCommentRepository::try_new(&conn).unwrap();

    let id = comments
        .create_comment(&comment_on_note(author, "great write-up"), 1_000)
        .unwrap();

    let users = SqliteUserRepository::try_new(&conn).unwrap();
    users
        .update_profile(author, "renamed_handle", "Renamed", "Person")
        .unwrap();

    let comment = comments.get_comment(id).unwrap().expect("comment exists");
    assert_eq!(comment.user_snapshot.username, "original_handle");
    assert_eq!(comment.user_snapshot.first_name, "Original");
    assert_eq!(comment.user_snapshot.last_name, "Name");
}

#[test]
fn missing_author_aborts_creation() {
    let conn = open_db_in_memory().unwrap();
    let comments = SqliteCommentRepository::try_new(&conn).unwrap();

    let ghost = Uuid::new_v4();
    let result = comments.create_comment(&comment_on_note(ghost, "hello"), 1_000);

    assert!(matches!(
        result,
        Err(RepoError::ReferenceNotFound {
            collection: "users",
            ..
        })
    ));

    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM comments;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(count, 0, "failed creation must not leave a partial row");
}

#[test]
fn reply_requires_an_existing_parent() {
    let conn = open_db_in_memory().unwrap();
    let author = seed_user(&conn, "replier");
    let comments = SqliteCommentRepository::try_new(&conn).unwrap();

    let mut reply = comment_on_note(author, "replying into the void");
    reply.parent_id = Some(Uuid::new_v4());

    let result = comments.create_comment(&reply, 1_000);
    assert!(matches!(
        result,
        Err(RepoError::ReferenceNotFound {
            collection: "comments",
            ..
        })
    ));
}

#[test]
fn threaded_reply_links_to_its_parent() {
    let conn = open_db_in_memory().unwrap();
    let author = seed_user(&conn, "threader");
    let comments = SqliteCommentRepository::try_new(&conn).unwrap();

    let target = TargetRef::note(Uuid::new_v4());
    let parent_id = comments
        .create_comment(
            &NewComment {
                target,
                user_id: author,
                content: "top level".to_string(),
                parent_id: None,
            },
            1_000,
        )
        .unwrap();
    let reply_id = comments
        .create_comment(
            &NewComment {
                target,
                user_id: author,
                content: "reply".to_string(),
                parent_id: Some(parent_id),
            },
            2_000,
        )
        .unwrap();

    let listed = comments.list_for_target(&target).unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].uuid, parent_id);
    assert_eq!(listed[1].uuid, reply_id);
    assert_eq!(listed[1].parent_id, Some(parent_id));
}

#[test]
fn likes_are_idempotent_per_user() {
    let conn = open_db_in_memory().unwrap();
    let author = seed_user(&conn, "author");
    let fan = seed_user(&conn, "fan");
    let comments = SqliteCommentRepository::try_new(&conn).unwrap();

    let id = comments
        .create_comment(&comment_on_note(author, "likeable"), 1_000)
        .unwrap();

    comments.like(id, fan).unwrap();
    comments.like(id, fan).unwrap();
    comments.like(id, author).unwrap();

    let comment = comments.get_comment(id).unwrap().expect("comment exists");
    assert_eq!(comment.likes.len(), 2);
    assert!(comment.likes.contains(&fan));

    comments.unlike(id, fan).unwrap();
    let comment = comments.get_comment(id).unwrap().expect("comment exists");
    assert_eq!(comment.likes, vec![author]);
}
