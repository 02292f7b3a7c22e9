use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::{AppError, Result},
    middleware_layer::auth::CurrentUser,
    models::chat::Chat,
    models::message::Message,
    repositories::message as message_repo,
    services::chat as chat_service,
    state::AppState,
};

/// The query parameters for fetching one chat.
#[derive(Deserialize)]
pub struct GetChatQuery {
    #[serde(default)]
    pub include_chat_history: Option<bool>,
}

/// The response payload for fetching one chat.
#[derive(Serialize)]
pub struct GetChatResponse {
    pub chat: Chat,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub messages: Option<Vec<Message>>,
}

/// The request payload for posting a message into a chat.
#[derive(Deserialize, Debug)]
pub struct ChatMessageCreate {
    pub system_prompt: String,
    pub question: String,
}

/// Lists the authenticated user's chats, each with its latest message.
#[axum::debug_handler]
pub async fn list_chats(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> Result<Response> {
    let chats = chat_service::list_chats(&state, current.user.id).await?;
    Ok(Json(chats).into_response())
}

/// Creates a new chat for the authenticated user.
#[axum::debug_handler]
pub async fn create_chat(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> Result<Response> {
    let chat = chat_service::create_chat(&state, current.user.id, None).await?;
    Ok((StatusCode::CREATED, Json(chat)).into_response())
}

/// Fetches one chat, optionally with its full message history.
#[axum::debug_handler]
pub async fn get_chat(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(chat_id): Path<Uuid>,
    Query(query): Query<GetChatQuery>,
) -> Result<Response> {
    let chat = chat_service::get_owned_chat(&state, current.user.id, chat_id).await?;

    let messages = if query.include_chat_history.unwrap_or(true) {
        Some(message_repo::list_by_chat(&state.db, &chat.id).await?)
    } else {
        None
    };

    Ok(Json(GetChatResponse { chat, messages }).into_response())
}

/// Lists a chat's messages, oldest first.
#[axum::debug_handler]
pub async fn get_chat_messages(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(chat_id): Path<Uuid>,
) -> Result<Response> {
    let chat = chat_service::get_owned_chat(&state, current.user.id, chat_id).await?;
    let messages = message_repo::list_by_chat(&state.db, &chat.id).await?;
    Ok(Json(messages).into_response())
}

/// Posts a message into a chat and returns the last message the flow
/// created (the system reply, or the user message when no reply is made).
#[axum::debug_handler]
pub async fn create_chat_message(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(chat_id): Path<Uuid>,
    Json(payload): Json<ChatMessageCreate>,
) -> Result<Response> {
    if payload.question.trim().is_empty() {
        return Err(AppError::Validation("question cannot be empty".to_string()));
    }

    let message = chat_service::post_message(
        &state,
        &current.user,
        chat_id,
        &payload.system_prompt,
        &payload.question,
    )
    .await?;

    Ok(Json(message).into_response())
}
