use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    error::{AppError, Result},
    middleware_layer::auth::CurrentUser,
    repositories::memory as memory_repo,
    services::chat as chat_service,
    state::AppState,
};

/// The request payload for creating a memory.
#[derive(Deserialize, Debug)]
pub struct MemoryCreateRequest {
    pub content: String,
}

/// Lists a chat's memories, oldest first.
#[axum::debug_handler]
pub async fn list_memories(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(chat_id): Path<Uuid>,
) -> Result<Response> {
    let chat = chat_service::get_owned_chat(&state, current.user.id, chat_id).await?;
    let memories = memory_repo::list_by_chat(&state.db, &chat.id).await?;
    Ok(Json(memories).into_response())
}

/// Creates a new memory on a chat.
#[axum::debug_handler]
pub async fn create_memory(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(chat_id): Path<Uuid>,
    Json(payload): Json<MemoryCreateRequest>,
) -> Result<Response> {
    if payload.content.trim().is_empty() {
        return Err(AppError::Validation("content cannot be empty".to_string()));
    }

    let chat = chat_service::get_owned_chat(&state, current.user.id, chat_id).await?;
    let memory =
        memory_repo::create_memory(&state.db, Uuid::new_v4(), chat.id, &payload.content).await?;
    Ok((StatusCode::CREATED, Json(memory)).into_response())
}

/// Deletes a memory from a chat.
#[axum::debug_handler]
pub async fn delete_memory(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path((chat_id, memory_id)): Path<(Uuid, Uuid)>,
) -> Result<Response> {
    let chat = chat_service::get_owned_chat(&state, current.user.id, chat_id).await?;

    if !memory_repo::delete_memory(&state.db, &memory_id, &chat.id).await? {
        return Err(AppError::NotFound);
    }

    Ok((
        StatusCode::OK,
        r#"{"message":"Memory deleted successfully"}"#,
    )
        .into_response())
}
