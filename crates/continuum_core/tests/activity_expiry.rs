use continuum_core::db::open_db_in_memory;
use continuum_core::model::activity::{ActivityType, NewActivity, ACTIVITY_TTL_SECONDS};
use continuum_core::model::friendship::FriendshipStatus;
use continuum_core::model::user::NewUser;
use continuum_core::repo::activity_repo::{ActivityRepository, SqliteActivityRepository};
use continuum_core::repo::comment_repo::SqliteCommentRepository;
use continuum_core::repo::friendship_repo::{FriendshipRepository, SqliteFriendshipRepository};
use continuum_core::repo::user_repo::{SqliteUserRepository, UserRepository};
use continuum_core::service::social_service::SocialService;
use continuum_core::TargetRef;
use serde_json::json;
use uuid::Uuid;

const TTL_MS: i64 = ACTIVITY_TTL_SECONDS * 1_000;

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

fn note_shared(actor: Uuid) -> NewActivity {
    NewActivity {
        user_id: actor,
        activity_type: ActivityType::NoteShared,
        target: TargetRef::note(Uuid::new_v4()),
        metadata: Some(json!({ "noteTitle": "Linear algebra recap" })),
    }
}

#[test]
fn record_fans_out_to_the_given_viewers() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteActivityRepository::try_new(&conn).unwrap();
    let actor = Uuid::new_v4();
    let (friend_a, friend_b) = (Uuid::new_v4(), Uuid::new_v4());

    let id = repo
        .record(&note_shared(actor), &[friend_a, friend_b], 1_000)
        .unwrap();
    let activity = repo.get_activity(id, 1_000).unwrap().expect("exists");

    assert_eq!(activity.visible_to.len(), 2);
    assert!(activity.visible_to.contains(&friend_a));
    assert_eq!(
        activity.metadata,
        Some(json!({ "noteTitle": "Linear algebra recap" }))
    );
}

#[test]
fn expiry_boundary_is_exclusive_on_reads() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteActivityRepository::try_new(&conn).unwrap();
    let actor = Uuid::new_v4();
    let viewer = Uuid::new_v4();

    let created_at = 1_000_000;
    let id = repo
        .record(&note_shared(actor), &[viewer], created_at)
        .unwrap();

    // Exactly at the TTL the document is still readable.
    assert!(repo.get_activity(id, created_at + TTL_MS).unwrap().is_some());
    assert_eq!(repo.feed_for(viewer, created_at + TTL_MS).unwrap().len(), 1);

    // One millisecond past it, the document is gone from every read path.
    assert!(repo
        .get_activity(id, created_at + TTL_MS + 1)
        .unwrap()
        .is_none());
    assert!(repo
        .feed_for(viewer, created_at + TTL_MS + 1)
        .unwrap()
        .is_empty());
    assert!(repo
        .acted_by(actor, created_at + TTL_MS + 1)
        .unwrap()
        .is_empty());
}

#[test]
fn purge_physically_removes_expired_rows_and_their_fanout() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteActivityRepository::try_new(&conn).unwrap();
    let actor = Uuid::new_v4();
    let viewer = Uuid::new_v4();

    let old = repo.record(&note_shared(actor), &[viewer], 1_000).unwrap();
    repo.record(&note_shared(actor), &[viewer], 1_000).unwrap();

    // Backdate one row past its window, as if ninety days had passed.
    conn.execute(
        "UPDATE activities SET created_at = ?2 WHERE uuid = ?1;",
        rusqlite::params![old.to_string(), 1_000 - TTL_MS - 1],
    )
    .unwrap();

    let removed = repo.purge_expired(1_000).unwrap();
    assert_eq!(removed, 1);

    let rows: i64 = conn
        .query_row("SELECT COUNT(*) FROM activities;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(rows, 1);
    let fanout: i64 = conn
        .query_row("SELECT COUNT(*) FROM activity_visibility;", [], |row| {
            row.get(0)
        })
        .unwrap();
    assert_eq!(fanout, 1);
}

#[test]
fn publish_computes_visibility_from_accepted_friends() {
    let conn = open_db_in_memory().unwrap();
    let actor = seed_user(&conn, "actor");
    let friend = seed_user(&conn, "friend");
    let pending = seed_user(&conn, "pending");

    {
        let friendships = SqliteFriendshipRepository::try_new(&conn).unwrap();
        let accepted = friendships.create_request(actor, friend, 1_000).unwrap();
        friendships
            .respond(accepted, FriendshipStatus::Accepted, 1_100)
            .unwrap();
        // A pending request contributes nothing to the fan-out.
        friendships.create_request(pending, actor, 1_200).unwrap();
    }

    let social = SocialService::new(
        SqliteFriendshipRepository::try_new(&conn).unwrap(),
        SqliteCommentRepository::try_new(&conn).unwrap(),
        SqliteActivityRepository::try_new(&conn).unwrap(),
    );

    let activity = social.publish_activity(&note_shared(actor)).unwrap();
    assert_eq!(activity.visible_to, vec![friend]);

    assert_eq!(social.feed_for(friend).unwrap().len(), 1);
    assert!(social.feed_for(pending).unwrap().is_empty());
}

#[test]
fn later_friendships_do_not_rewrite_old_fanouts() {
    let conn = open_db_in_memory().unwrap();
    let actor = seed_user(&conn, "actor");
    let latecomer = seed_user(&conn, "latecomer");

    let social = SocialService::new(
        SqliteFriendshipRepository::try_new(&conn).unwrap(),
        SqliteCommentRepository::try_new(&conn).unwrap(),
        SqliteActivityRepository::try_new(&conn).unwrap(),
    );

    social.publish_activity(&note_shared(actor)).unwrap();

    let request = social.send_friend_request(actor, latecomer).unwrap();
    social
        .respond_to_request(request.uuid, FriendshipStatus::Accepted)
        .unwrap();

    // The earlier activity was fanned out before the friendship existed.
    assert!(social.feed_for(latecomer).unwrap().is_empty());

    social.publish_activity(&note_shared(actor)).unwrap();
    assert_eq!(social.feed_for(latecomer).unwrap().len(), 1);
}
