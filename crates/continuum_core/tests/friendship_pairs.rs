use continuum_core::db::open_db_in_memory;
use continuum_core::model::friendship::FriendshipStatus;
use continuum_core::model::user::NewUser;
use continuum_core::repo::friendship_repo::{FriendshipRepository, SqliteFriendshipRepository};
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

#[test]
fn request_stores_pair_in_canonical_order() {
    let conn = open_db_in_memory().unwrap();
    let alice = seed_user(&conn, "alice");
    let bob = seed_user(&conn, "bob");
    let repo = SqliteFriendshipRepository::try_new(&conn).unwrap();

    let id = repo.create_request(bob, alice, 1_000).unwrap();
    let friendship = repo.get_friendship(id).unwrap().expect("request exists");

    assert!(friendship.user_lo.to_string() < friendship.user_hi.to_string());
    assert_eq!(friendship.requested_by, bob);
    assert_eq!(friendship.status, FriendshipStatus::Pending);
    assert_eq!(friendship.responded_at, None);
}

#[test]
fn reversed_duplicate_request_is_rejected() {
    let conn = open_db_in_memory().unwrap();
    let alice = seed_user(&conn, "alice");
    let bob = seed_user(&conn, "bob");
    let repo = SqliteFriendshipRepository::try_new(&conn).unwrap();

    repo.create_request(alice, bob, 1_000).unwrap();
    let duplicate = repo.create_request(bob, alice, 2_000);

    assert!(matches!(
        duplicate,
        Err(RepoError::Duplicate {
            collection: "friendships",
            ..
        })
    ));
}

#[test]
fn self_friendship_fails_validation() {
    let conn = open_db_in_memory().unwrap();
    let alice = seed_user(&conn, "alice");
    let repo = SqliteFriendshipRepository::try_new(&conn).unwrap();

    let result = repo.create_request(alice, alice, 1_000);
    assert!(matches!(result, Err(RepoError::Validation(_))));
}

#[test]
fn accepting_stamps_responded_at_and_closes_the_request() {
    let conn = open_db_in_memory().unwrap();
    let alice = seed_user(&conn, "alice");
    let bob = seed_user(&conn, "bob");
    let repo = SqliteFriendshipRepository::try_new(&conn).unwrap();

    let id = repo.create_request(alice, bob, 1_000).unwrap();
    repo.respond(id, FriendshipStatus::Accepted, 2_000).unwrap();

    let friendship = repo.get_friendship(id).unwrap().expect("request exists");
    assert_eq!(friendship.status, FriendshipStatus::Accepted);
    assert_eq!(friendship.responded_at, Some(2_000));

    // The request is no longer pending, so a second response is illegal.
    let again = repo.respond(id, FriendshipStatus::Declined, 3_000);
    assert!(matches!(again, Err(RepoError::Transition(_))));
}

#[test]
fn accepted_friend_ids_sees_both_directions() {
    let conn = open_db_in_memory().unwrap();
    let alice = seed_user(&conn, "alice");
    let bob = seed_user(&conn, "bob");
    let carol = seed_user(&conn, "carol");
    let repo = SqliteFriendshipRepository::try_new(&conn).unwrap();

    let with_bob = repo.create_request(alice, bob, 1_000).unwrap();
    repo.respond(with_bob, FriendshipStatus::Accepted, 1_500)
        .unwrap();

    // Declined requests never count as friends.
    let with_carol = repo.create_request(carol, alice, 2_000).unwrap();
    repo.respond(with_carol, FriendshipStatus::Declined, 2_500)
        .unwrap();

    assert_eq!(repo.accepted_friend_ids(alice).unwrap(), vec![bob]);
    assert_eq!(repo.accepted_friend_ids(bob).unwrap(), vec![alice]);
    assert!(repo.accepted_friend_ids(carol).unwrap().is_empty());
}

#[test]
fn get_between_finds_the_pair_in_either_direction() {
    let conn = open_db_in_memory().unwrap();
    let alice = seed_user(&conn, "alice");
    let bob = seed_user(&conn, "bob");
    let repo = SqliteFriendshipRepository::try_new(&conn).unwrap();

    let id = repo.create_request(alice, bob, 1_000).unwrap();

    assert_eq!(repo.get_between(alice, bob).unwrap().map(|f| f.uuid), Some(id));
    assert_eq!(repo.get_between(bob, alice).unwrap().map(|f| f.uuid), Some(id));
}
