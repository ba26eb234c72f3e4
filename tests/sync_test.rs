//! Tests for inbox synchronization

mod common;

use chrono::{Duration, Utc};
use common::{create_test_server, sign_in, TestApp};
use mailbridge::gmail::RemoteMessage;
use mailbridge::store::{GmailTokens, UserId};
use mailbridge::{ThreadStore, UserStore};
use serde_json::Value;

fn remote(id: &str, from: &str, to: &str, subject: &str, body: &str) -> RemoteMessage {
    RemoteMessage {
        id: id.to_string(),
        from: Some(from.to_string()),
        to: Some(to.to_string()),
        subject: Some(subject.to_string()),
        snippet: Some(body.chars().take(20).collect()),
        internal_date: Some(Utc::now().timestamp_millis()),
        body: Some(body.to_string()),
    }
}

fn connect_gmail(app: &TestApp, user_id: UserId, expired: bool) {
    let expiry = if expired {
        Utc::now() - Duration::minutes(1)
    } else {
        Utc::now() + Duration::hours(1)
    };
    app.users
        .set_gmail_tokens(
            user_id,
            GmailTokens {
                access_token: "access-initial".into(),
                refresh_token: Some("refresh-initial".into()),
                scope: None,
                token_type: Some("Bearer".into()),
                expiry_date: Some(expiry),
            },
        )
        .unwrap();
}

/// Test: sync requires a session
#[tokio::test]
async fn test_sync_requires_login() {
    let app = create_test_server();

    let response = app.server.post("/api/threads/sync").await;
    assert_eq!(response.status_code(), 401);
}

/// Test: sync without a connected Gmail account fails cleanly
#[tokio::test]
async fn test_sync_without_tokens() {
    let app = create_test_server();
    sign_in(&app, "me@example.com", "Me", "User").await;

    let response = app.server.post("/api/threads/sync").await;

    assert_eq!(response.status_code(), 400);
    let body: Value = response.json();
    assert_eq!(body["error"], "Gmail account not connected");
}

/// Test: messages group into threads by unordered participant pair
#[tokio::test]
async fn test_sync_groups_by_pair() {
    let app = create_test_server();
    sign_in(&app, "me@example.com", "Me", "User").await;
    connect_gmail(&app, UserId(1), false);

    // Both directions of one conversation, plus an unrelated one
    app.gmail.add_message(remote(
        "m1",
        "Them <them@other.com>",
        "me@example.com",
        "Lunch",
        "free today?",
    ));
    app.gmail.add_message(remote(
        "m2",
        "Me <me@example.com>",
        "them@other.com",
        "Lunch",
        "sure, noon",
    ));
    app.gmail.add_message(remote(
        "m3",
        "other@elsewhere.com",
        "me@example.com",
        "Invoice",
        "attached",
    ));

    let response = app.server.post("/api/threads/sync").await;
    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert_eq!(body["success"], true);
    assert_eq!(body["listed"], 3);
    assert_eq!(body["merged"], 3);

    let threads = app.threads.list_threads(UserId(1)).unwrap();
    assert_eq!(threads.len(), 2);

    let lunch = threads
        .iter()
        .find(|t| t.subject == "Lunch")
        .expect("lunch thread");
    assert_eq!(lunch.messages.len(), 2);
    assert_eq!(
        lunch.participants,
        ["me@example.com".to_string(), "them@other.com".to_string()]
    );
}

/// Test: a second sync is a no-op thanks to message-id dedup
#[tokio::test]
async fn test_sync_is_idempotent() {
    let app = create_test_server();
    sign_in(&app, "me@example.com", "Me", "User").await;
    connect_gmail(&app, UserId(1), false);

    app.gmail.add_message(remote(
        "m1",
        "them@other.com",
        "me@example.com",
        "Hi",
        "hello",
    ));

    app.server.post("/api/threads/sync").await;
    let response = app.server.post("/api/threads/sync").await;

    let body: Value = response.json();
    assert_eq!(body["merged"], 0);
    assert_eq!(body["duplicates"], 1);

    let threads = app.threads.list_threads(UserId(1)).unwrap();
    assert_eq!(threads.len(), 1);
    assert_eq!(threads[0].messages.len(), 1);
}

/// Test: an expired access token is refreshed before the sync, and the
/// stored refresh token survives the refresh response omitting it
#[tokio::test]
async fn test_sync_refreshes_expired_token() {
    let app = create_test_server();
    sign_in(&app, "me@example.com", "Me", "User").await;
    connect_gmail(&app, UserId(1), true);

    let response = app.server.post("/api/threads/sync").await;
    assert_eq!(response.status_code(), 200);

    assert_eq!(
        app.gmail
            .refresh_calls
            .load(std::sync::atomic::Ordering::SeqCst),
        1
    );

    let user = app.users.get_user(UserId(1)).unwrap().unwrap();
    let tokens = user.gmail_tokens.unwrap();
    assert_eq!(tokens.access_token, "access-refreshed");
    assert_eq!(tokens.refresh_token.as_deref(), Some("refresh-initial"));
}

/// Test: unusable messages are counted, not fatal
#[tokio::test]
async fn test_sync_skips_unusable_messages() {
    let app = create_test_server();
    sign_in(&app, "me@example.com", "Me", "User").await;
    connect_gmail(&app, UserId(1), false);

    // No From header and no body at all
    app.gmail.add_message(RemoteMessage {
        id: "broken".into(),
        from: None,
        to: None,
        subject: None,
        snippet: None,
        internal_date: None,
        body: None,
    });
    app.gmail.add_message(remote(
        "ok",
        "them@other.com",
        "me@example.com",
        "Hi",
        "hello",
    ));

    let response = app.server.post("/api/threads/sync").await;
    let body: Value = response.json();
    assert_eq!(body["merged"], 1);
    assert_eq!(body["failed"], 1);
}

/// Test: thread detail returns messages ordered by timestamp, not
/// by arrival order
#[tokio::test]
async fn test_thread_detail_sorted_by_timestamp() {
    let app = create_test_server();
    sign_in(&app, "me@example.com", "Me", "User").await;
    connect_gmail(&app, UserId(1), false);

    let now = Utc::now();
    app.gmail.add_message(RemoteMessage {
        internal_date: Some(now.timestamp_millis()),
        ..remote("newest", "them@other.com", "me@example.com", "Hi", "reply")
    });
    app.gmail.add_message(RemoteMessage {
        internal_date: Some((now - Duration::hours(3)).timestamp_millis()),
        ..remote("oldest", "me@example.com", "them@other.com", "Hi", "original")
    });

    app.server.post("/api/threads/sync").await;

    let list: Value = app.server.get("/api/threads").await.json();
    let thread_id = list[0]["id"].as_str().unwrap().to_string();

    let detail: Value = app
        .server
        .get(&format!("/api/threads/{}", thread_id))
        .await
        .json();

    let messages = detail["messages"].as_array().unwrap();
    assert_eq!(messages[0]["messageId"], "oldest");
    assert_eq!(messages[1]["messageId"], "newest");
}

/// Test: thread reads are scoped to the signed-in user
#[tokio::test]
async fn test_thread_detail_not_found_for_unknown_id() {
    let app = create_test_server();
    sign_in(&app, "me@example.com", "Me", "User").await;

    let response = app.server.get("/api/threads/not-a-thread").await;
    assert_eq!(response.status_code(), 404);
}

/// Test: the fetched body and sender land on the stored message
#[tokio::test]
async fn test_sync_persists_body_and_sender() {
    let app = create_test_server();
    sign_in(&app, "me@example.com", "Me", "User").await;
    connect_gmail(&app, UserId(1), false);

    app.gmail.add_message(remote(
        "m1",
        "Them <Them@Other.com>",
        "me@example.com",
        "Hi",
        "hello from gmail",
    ));
    app.server.post("/api/threads/sync").await;

    let threads = app.threads.list_threads(UserId(1)).unwrap();
    assert_eq!(threads[0].messages[0].content, "hello from gmail");
    assert_eq!(threads[0].messages[0].sender, "them@other.com");
}
