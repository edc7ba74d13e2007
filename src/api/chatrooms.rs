//! Chatroom endpoints

use crate::api::ExtractUser;
use crate::core::traits::{ChatService, PostOutcome};
use axum::extract::Path;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use di_axum::Inject;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_chatrooms).post(create_chatroom))
        .route("/:id", get(get_chatroom))
        .route("/:id/messages", get(chatroom_messages))
        .route("/:id/message", post(post_message))
}

async fn list_chatrooms(
    Inject(chat_service): Inject<dyn ChatService>,
    ExtractUser(current_user): ExtractUser,
) -> Response {
    match chat_service.list_chatrooms(current_user).await {
        Ok((chatrooms, cached)) => (
            StatusCode::OK,
            Json(schemas::ChatroomList {
                success: true,
                chatrooms: chatrooms
                    .into_iter()
                    .map(schemas::Chatroom::from)
                    .collect(),
                cached,
            }),
        )
            .into_response(),
        Err(()) => schemas::server_error(),
    }
}

async fn create_chatroom(
    Inject(chat_service): Inject<dyn ChatService>,
    ExtractUser(current_user): ExtractUser,
    Json(create_chatroom): Json<schemas::CreateChatroom>,
) -> Response {
    match chat_service
        .create_chatroom(current_user, create_chatroom.name)
        .await
    {
        Ok(chatroom) => (
            StatusCode::CREATED,
            Json(schemas::ChatroomCreated {
                success: true,
                chatroom_id: chatroom.id,
                name: chatroom.name,
            }),
        )
            .into_response(),
        Err(()) => schemas::server_error(),
    }
}

async fn get_chatroom(
    Inject(chat_service): Inject<dyn ChatService>,
    ExtractUser(current_user): ExtractUser,
    Path(chatroom_id): Path<i64>,
) -> Response {
    match chat_service.get_chatroom(current_user, chatroom_id).await {
        Ok(Some(chatroom)) => (
            StatusCode::OK,
            Json(schemas::ChatroomDetail {
                success: true,
                chatroom: chatroom.into(),
            }),
        )
            .into_response(),
        Ok(None) => schemas::not_found(),
        Err(()) => schemas::server_error(),
    }
}

async fn chatroom_messages(
    Inject(chat_service): Inject<dyn ChatService>,
    ExtractUser(current_user): ExtractUser,
    Path(chatroom_id): Path<i64>,
) -> Response {
    match chat_service.list_messages(current_user, chatroom_id).await {
        Ok(Some(messages)) => (
            StatusCode::OK,
            Json(schemas::MessagesList {
                success: true,
                messages: messages.into_iter().map(schemas::Message::from).collect(),
            }),
        )
            .into_response(),
        Ok(None) => schemas::not_found(),
        Err(()) => schemas::server_error(),
    }
}

/// The queued-generation request path: 200 when the reply landed within the
/// poll deadline, 202 when it is still being generated, 429 when the daily
/// ceiling is reached.
async fn post_message(
    Inject(chat_service): Inject<dyn ChatService>,
    ExtractUser(current_user): ExtractUser,
    Path(chatroom_id): Path<i64>,
    Json(message): Json<schemas::CreateMessage>,
) -> Response {
    match chat_service
        .post_message(current_user, chatroom_id, message.content)
        .await
    {
        Ok(PostOutcome::Replied { message_id, reply }) => (
            StatusCode::OK,
            Json(schemas::MessagePosted {
                success: true,
                message_id,
                reply: reply.into(),
            }),
        )
            .into_response(),
        Ok(PostOutcome::Queued) => (
            StatusCode::ACCEPTED,
            Json(schemas::StatusMessage {
                success: true,
                message: "reply is still being generated".to_owned(),
            }),
        )
            .into_response(),
        Ok(PostOutcome::QuotaExceeded) => (
            StatusCode::TOO_MANY_REQUESTS,
            Json(schemas::StatusMessage {
                success: false,
                message: "daily message quota exceeded".to_owned(),
            }),
        )
            .into_response(),
        Ok(PostOutcome::ChatroomNotFound) => schemas::not_found(),
        Err(()) => schemas::server_error(),
    }
}

pub mod schemas {
    use crate::infrastructure::entities;
    use axum::Json;
    use axum::http::StatusCode;
    use axum::response::{IntoResponse, Response};
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Serialize};

    #[derive(Deserialize, Debug)]
    pub struct CreateChatroom {
        pub name: String,
    }

    #[derive(Serialize, Debug)]
    pub struct ChatroomCreated {
        pub success: bool,
        pub chatroom_id: i64,
        pub name: String,
    }

    #[derive(Serialize, Debug)]
    pub struct Chatroom {
        pub id: i64,
        pub name: String,
        pub created_at: DateTime<Utc>,
    }

    impl From<entities::Chatroom> for Chatroom {
        fn from(chatroom: entities::Chatroom) -> Self {
            Chatroom {
                id: chatroom.id,
                name: chatroom.name,
                created_at: chatroom.created_at,
            }
        }
    }

    #[derive(Serialize, Debug)]
    pub struct ChatroomList {
        pub success: bool,
        pub chatrooms: Vec<Chatroom>,
        pub cached: bool,
    }

    #[derive(Serialize, Debug)]
    pub struct ChatroomDetail {
        pub success: bool,
        pub chatroom: Chatroom,
    }

    #[derive(Serialize, Debug)]
    pub struct Message {
        pub id: i64,
        pub chatroom_id: i64,
        pub sender: &'static str,
        pub content: String,
        pub created_at: DateTime<Utc>,
    }

    impl From<entities::Message> for Message {
        fn from(message: entities::Message) -> Self {
            Message {
                id: message.id,
                chatroom_id: message.chatroom_id,
                sender: message.sender.as_str(),
                content: message.content,
                created_at: message.created_at,
            }
        }
    }

    #[derive(Serialize, Debug)]
    pub struct MessagesList {
        pub success: bool,
        pub messages: Vec<Message>,
    }

    #[derive(Deserialize, Debug)]
    pub struct CreateMessage {
        pub content: String,
    }

    #[derive(Serialize, Debug)]
    pub struct MessagePosted {
        pub success: bool,
        pub message_id: i64,
        pub reply: Message,
    }

    #[derive(Serialize, Debug)]
    pub struct StatusMessage {
        pub success: bool,
        pub message: String,
    }

    pub(super) fn not_found() -> Response {
        (
            StatusCode::NOT_FOUND,
            Json(StatusMessage {
                success: false,
                message: "chatroom not found".to_owned(),
            }),
        )
            .into_response()
    }

    pub(super) fn server_error() -> Response {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(StatusMessage {
                success: false,
                message: "internal server error".to_owned(),
            }),
        )
            .into_response()
    }
}
