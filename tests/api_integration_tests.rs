//! API Integration Tests
//!
//! Tests the HTTP API endpoints with a real database.
//!
//! Tests are serialized because they share a global test pool and the reply
//! poll environment overrides.
//!
//! Note: The `more-di` DI framework doesn't support injecting custom pools.
//! We work around this by using `DatabaseConnection::set_test_pool()` to set
//! a global pool that the DI-created DatabaseConnection will use.

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use chrono::Utc;
use di::{Injectable, ServiceCollection};
use di_axum::RouterServiceProviderExtensions;
use serde_json::Value;
use serial_test::serial;
use sqlx::SqlitePool;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tokio_queued_chat_api::{
    api, core::services::MyChatService, core::worker::FAILURE_SENTINEL,
    infrastructure::cache::SqliteCacheStore, infrastructure::database::DatabaseConnection,
    infrastructure::queue::SqliteTaskQueue, infrastructure::repositories::DbChatRepository,
};
use tower::ServiceExt;

/// Counter for unique test database URIs
static TEST_DB_COUNTER: AtomicU32 = AtomicU32::new(0);

/// Setup test database with migrations and returns pool
/// Uses in-memory SQLite for test isolation
async fn setup_test_db() -> SqlitePool {
    let db_num = TEST_DB_COUNTER.fetch_add(1, Ordering::SeqCst);
    // Use file URI format with shared cache - each test gets a unique DB
    let db_url = format!("sqlite:file:testdb{}?mode=memory&cache=shared", db_num);

    let pool = SqlitePool::connect(&db_url).await.unwrap();
    sqlx::migrate!().run(&pool).await.unwrap();

    // Set this pool as the global test pool so DI uses it
    DatabaseConnection::set_test_pool(pool.clone());

    pool
}

/// Clean up after test
fn cleanup_test_db() {
    DatabaseConnection::clear_test_pool();
}

/// Create test app - uses the global test pool set by setup_test_db()
fn create_test_app() -> axum::Router {
    let provider = ServiceCollection::new()
        .add(DatabaseConnection::transient())
        .add(DbChatRepository::scoped())
        .add(SqliteTaskQueue::scoped())
        .add(SqliteCacheStore::scoped())
        .add(MyChatService::scoped())
        .build_provider()
        .unwrap();

    axum::Router::new()
        .nest("/chatroom", api::chatrooms::router())
        .nest("/subscription", api::subscription::router())
        .with_provider(provider)
}

/// Shrinks the waiter deadline so tests don't sit through the 20s default.
fn set_poll_policy(interval_ms: u64, attempts: u32) {
    unsafe {
        std::env::set_var("REPLY_POLL_INTERVAL_MS", interval_ms.to_string());
        std::env::set_var("REPLY_POLL_ATTEMPTS", attempts.to_string());
    }
}

async fn create_chatroom(pool: &SqlitePool, user_id: i64, name: &str) -> i64 {
    let (id,): (i64,) = sqlx::query_as(
        "INSERT INTO chatrooms (user_id, name, created_at) VALUES (?, ?, ?) RETURNING id",
    )
    .bind(user_id)
    .bind(name)
    .bind(Utc::now())
    .fetch_one(pool)
    .await
    .unwrap();
    id
}

/// Plays the generation worker: writes an assistant reply after a delay.
fn spawn_fake_worker(pool: SqlitePool, chatroom_id: i64, reply: &'static str) {
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        sqlx::query(
            "INSERT INTO messages (chatroom_id, sender, content, created_at) VALUES (?, 2, ?, ?)",
        )
        .bind(chatroom_id)
        .bind(reply)
        .bind(Utc::now())
        .execute(&pool)
        .await
        .unwrap();
    });
}

fn post_message_request(chatroom_id: i64, user_id: i64, content: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(format!("/chatroom/{}/message", chatroom_id))
        .header("X-User-ID", user_id.to_string())
        .header("content-type", "application/json")
        .body(Body::from(format!(r#"{{"content":"{}"}}"#, content)))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
#[serial]
async fn test_list_chatrooms_empty() {
    let _pool = setup_test_db().await;

    let app = create_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/chatroom")
                .header("X-User-ID", "1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["success"], true);
    assert_eq!(json["chatrooms"].as_array().unwrap().len(), 0);
    assert_eq!(json["cached"], false);

    cleanup_test_db();
}

#[tokio::test]
#[serial]
async fn test_list_chatrooms_requires_auth() {
    let _pool = setup_test_db().await;

    let app = create_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/chatroom")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    // Should fail without X-User-ID header
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    cleanup_test_db();
}

#[tokio::test]
#[serial]
async fn test_create_chatroom() {
    let _pool = setup_test_db().await;

    let app = create_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/chatroom")
                .header("X-User-ID", "1")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"name":"general"}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);

    let json = body_json(response).await;
    assert_eq!(json["success"], true);
    assert_eq!(json["name"], "general");
    assert!(json["chatroom_id"].as_i64().unwrap() > 0);

    cleanup_test_db();
}

#[tokio::test]
#[serial]
async fn test_get_chatroom_wrong_user() {
    let pool = setup_test_db().await;
    let chatroom_id = create_chatroom(&pool, 1, "mine").await;

    let app = create_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .uri(format!("/chatroom/{}", chatroom_id))
                .header("X-User-ID", "2")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    // Another user's chatroom looks like it doesn't exist
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    cleanup_test_db();
}

#[tokio::test]
#[serial]
async fn test_list_chatrooms_second_read_is_cached() {
    let pool = setup_test_db().await;
    create_chatroom(&pool, 1, "general").await;

    let app = create_test_app();
    let response = app
        .oneshot(
            Request::builder()
                .uri("/chatroom")
                .header("X-User-ID", "1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let json = body_json(response).await;
    assert_eq!(json["cached"], false);
    assert_eq!(json["chatrooms"].as_array().unwrap().len(), 1);

    // second read is served from the 5-minute cache
    let app = create_test_app();
    let response = app
        .oneshot(
            Request::builder()
                .uri("/chatroom")
                .header("X-User-ID", "1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let json = body_json(response).await;
    assert_eq!(json["cached"], true);
    assert_eq!(json["chatrooms"].as_array().unwrap().len(), 1);

    cleanup_test_db();
}

#[tokio::test]
#[serial]
async fn test_post_message_unknown_chatroom() {
    let _pool = setup_test_db().await;
    set_poll_policy(1, 1);

    let app = create_test_app();
    let response = app.oneshot(post_message_request(999, 1, "hello")).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    cleanup_test_db();
}

#[tokio::test]
#[serial]
async fn test_post_message_returns_reply() {
    let pool = setup_test_db().await;
    let chatroom_id = create_chatroom(&pool, 42, "general").await;
    set_poll_policy(25, 200);

    spawn_fake_worker(pool.clone(), chatroom_id, "hi");

    let app = create_test_app();
    let response = app
        .oneshot(post_message_request(chatroom_id, 42, "hello"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["success"], true);
    assert!(json["message_id"].as_i64().unwrap() > 0);
    assert_eq!(json["reply"]["sender"], "ai");
    assert_eq!(json["reply"]["content"], "hi");

    // the user message itself got persisted too
    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM messages WHERE sender = 1")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count.0, 1);

    cleanup_test_db();
}

#[tokio::test]
#[serial]
async fn test_post_message_queued_when_no_worker() {
    let pool = setup_test_db().await;
    let chatroom_id = create_chatroom(&pool, 42, "general").await;
    set_poll_policy(1, 3);

    let app = create_test_app();
    let response = app
        .oneshot(post_message_request(chatroom_id, 42, "hello"))
        .await
        .unwrap();

    // deadline elapsed: queued, not an error
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let json = body_json(response).await;
    assert_eq!(json["success"], true);

    // the task is still sitting in the queue
    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM task_queue")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count.0, 1);

    cleanup_test_db();
}

#[tokio::test]
#[serial]
async fn test_post_message_quota_exceeded() {
    let pool = setup_test_db().await;
    let chatroom_id = create_chatroom(&pool, 42, "general").await;
    set_poll_policy(25, 200);

    // today's counter is already at the ceiling
    let key = format!("usage:42:{}", Utc::now().date_naive().format("%Y-%m-%d"));
    sqlx::query("INSERT INTO cache (key, value, expires_at) VALUES (?, '5', ?)")
        .bind(&key)
        .bind(Utc::now().timestamp() + 3600)
        .execute(&pool)
        .await
        .unwrap();

    spawn_fake_worker(pool.clone(), chatroom_id, "hi");

    let app = create_test_app();
    let response = app
        .oneshot(post_message_request(chatroom_id, 42, "hello"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

    // the reply was generated and persisted, just not surfaced or charged
    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM messages WHERE sender = 2")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count.0, 1);

    let (counter,): (String,) = sqlx::query_as("SELECT value FROM cache WHERE key = ?")
        .bind(&key)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(counter, "5");

    cleanup_test_db();
}

#[tokio::test]
#[serial]
async fn test_post_message_sentinel_reply_not_charged() {
    let pool = setup_test_db().await;
    let chatroom_id = create_chatroom(&pool, 42, "general").await;
    set_poll_policy(25, 200);

    spawn_fake_worker(pool.clone(), chatroom_id, FAILURE_SENTINEL);

    let app = create_test_app();
    let response = app
        .oneshot(post_message_request(chatroom_id, 42, "hello"))
        .await
        .unwrap();

    // surfaced as a normal completion carrying the sentinel content
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["reply"]["content"], FAILURE_SENTINEL);

    // failed generations never consume quota
    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM cache WHERE key LIKE 'usage:%'")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count.0, 0);

    cleanup_test_db();
}

#[tokio::test]
#[serial]
async fn test_subscription_status() {
    let pool = setup_test_db().await;

    sqlx::query("INSERT INTO users (id, mobile, tier, created_at) VALUES (1, '5551234', 'pro', ?)")
        .bind(Utc::now().to_rfc3339())
        .execute(&pool)
        .await
        .unwrap();

    let app = create_test_app();
    let response = app
        .oneshot(
            Request::builder()
                .uri("/subscription/status")
                .header("X-User-ID", "1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["subscription"], "pro");

    // users without a row read as the metered tier
    let app = create_test_app();
    let response = app
        .oneshot(
            Request::builder()
                .uri("/subscription/status")
                .header("X-User-ID", "2")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let json = body_json(response).await;
    assert_eq!(json["subscription"], "basic");

    cleanup_test_db();
}
