//! Queued AI chatroom web server
//!
//! Two long-lived tasks share the runtime: the axum web server and the
//! generation worker draining the durable task queue.

use tokio_queued_chat_api::api;
use tokio_queued_chat_api::core::generator::HttpTextGenerator;
use tokio_queued_chat_api::core::services::MyChatService;
use tokio_queued_chat_api::core::worker::GenerationWorker;
use tokio_queued_chat_api::infrastructure::cache::SqliteCacheStore;
use tokio_queued_chat_api::infrastructure::database::DatabaseConnection;
use tokio_queued_chat_api::infrastructure::queue::SqliteTaskQueue;
use tokio_queued_chat_api::infrastructure::repositories::DbChatRepository;

use axum::http::{HeaderValue, Method};
use axum::routing::get;
use axum::{Json, Router};
use di::{Injectable, Ref, ServiceCollection};
use di_axum::RouterServiceProviderExtensions;
use log::{error, info};
use serde_json::json;
use tokio::runtime::{Builder, Runtime};
use tower_http::cors::{Any, CorsLayer};

fn main() -> anyhow::Result<()> {
    // initialize tracing
    tracing_subscriber::fmt::init();

    let runtime: Runtime = Builder::new_multi_thread().enable_all().build()?;

    runtime.block_on(async {
        let connection = DatabaseConnection::create();
        sqlx::migrate!()
            .run(&*connection)
            .await
            .expect("failed to run database migrations");
    });

    let worker_join_handle = runtime.spawn(worker_task());
    let web_task_handle = runtime.spawn(web_server_task());

    runtime.block_on(async {
        web_task_handle
            .await
            .expect("failed to join web_task_handle");
        worker_join_handle
            .await
            .expect("failed to join worker_join_handle");
    });

    Ok(())
}

/// Background generation worker: pop, generate, persist, forever.
async fn worker_task() {
    let connection = Ref::new(DatabaseConnection::create());

    let worker = GenerationWorker::new(
        Ref::new(SqliteTaskQueue::with_connection(connection.clone())),
        Ref::new(DbChatRepository::with_connection(connection)),
        Ref::new(HttpTextGenerator::from_env()),
    );

    if let Err(e) = worker.run().await {
        error!("generation worker stopped: {e}");
    }
}

async fn web_server_task() {
    let provider = ServiceCollection::new()
        .add(DatabaseConnection::singleton())
        .add(DbChatRepository::scoped())
        .add(SqliteTaskQueue::scoped())
        .add(SqliteCacheStore::scoped())
        .add(MyChatService::scoped())
        .build_provider()
        .unwrap();

    // build our application with a route
    let app = Router::new()
        .route("/", get(index))
        .nest("/chatroom", api::chatrooms::router())
        .nest("/subscription", api::subscription::router())
        .layer(
            CorsLayer::new()
                .allow_headers(Any)
                .allow_methods([Method::GET, Method::POST])
                .allow_origin([
                    "http://localhost:3000".parse::<HeaderValue>().unwrap(),
                    "http://localhost:5173".parse::<HeaderValue>().unwrap(),
                ]),
        )
        .with_provider(provider);

    // run our app with hyper, listening globally on port 3000
    let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await.unwrap();
    info!("listening on {}", listener.local_addr().unwrap());
    axum::serve(listener, app).await.unwrap();
    info!("Shutting down...");
}

async fn index() -> Json<serde_json::Value> {
    Json(json!({ "message": "AI chatroom backend API" }))
}
