//! Chat orchestration: ownership checks, the message flow, and the
//! gateway relay. Every message is durably persisted before it is
//! broadcast, so clients that miss a broadcast can always recover by
//! re-fetching the chat history.

use serde::Serialize;
use uuid::Uuid;

use crate::{
    error::{AppError, Result},
    models::chat::{Chat, ChatStatus},
    models::message::{Message, MessageKind},
    models::user::User,
    repositories::chat as chat_repo,
    repositories::message as message_repo,
    services::responder::{HistoryTurn, Role, RouteRequest},
    state::AppState,
    validation::markdown::is_markdown,
    ws::events::{MessagePayload, ServerEvent},
};

/// A chat paired with its most recent message, for the chat list view.
#[derive(Serialize)]
pub struct ChatWithLatestMessage {
    pub chat: Chat,
    pub latest_message: Option<Message>,
}

/// Creates a new chat for a user.
pub async fn create_chat(state: &AppState, user_id: Uuid, title: Option<&str>) -> Result<Chat> {
    let chat = chat_repo::create_chat(&state.db, Uuid::new_v4(), user_id, title).await?;
    tracing::info!(chat_id = %chat.id, %user_id, "chat created");
    Ok(chat)
}

/// Lists a user's chats, each with its most recent message.
pub async fn list_chats(state: &AppState, user_id: Uuid) -> Result<Vec<ChatWithLatestMessage>> {
    let chats = chat_repo::list_by_user(&state.db, &user_id).await?;
    let mut result = Vec::with_capacity(chats.len());
    for chat in chats {
        let latest_message = message_repo::latest_by_chat(&state.db, &chat.id).await?;
        result.push(ChatWithLatestMessage {
            chat,
            latest_message,
        });
    }
    Ok(result)
}

/// Fetches a chat, enforcing ownership: an unknown chat is a 404, a chat
/// owned by someone else is a 403.
pub async fn get_owned_chat(state: &AppState, user_id: Uuid, chat_id: Uuid) -> Result<Chat> {
    let chat = chat_repo::find_by_id(&state.db, &chat_id)
        .await?
        .ok_or(AppError::NotFound)?;
    if chat.user_id != user_id {
        return Err(AppError::Unauthorized);
    }
    Ok(chat)
}

/// Converts stored messages into responder history: system-authored
/// messages speak as the assistant, the rest as the user.
fn to_history(messages: &[Message]) -> Vec<HistoryTurn> {
    messages
        .iter()
        .map(|message| HistoryTurn {
            role: if message.is_system {
                Role::Assistant
            } else {
                Role::User
            },
            content: message.content.clone(),
        })
        .collect()
}

/// Derives the gateway recipient address from the user's email, tagging
/// the local part with the chat id so inbound webhooks can be correlated.
fn gateway_address(email: &str, chat_id: Uuid) -> Option<String> {
    let (local, domain) = email.split_once('@')?;
    if local.is_empty() || domain.is_empty() {
        return None;
    }
    Some(format!("{local}+{chat_id}@{domain}"))
}

/// Returns the chat's gateway session id, generating and persisting one
/// on first use.
async fn ensure_gateway_session(state: &AppState, chat: &Chat) -> Result<String> {
    if let Some(session_id) = &chat.gateway_session_id {
        return Ok(session_id.clone());
    }
    let session_id = Uuid::new_v4().to_string();
    chat_repo::set_gateway_session(&state.db, &chat.id, &session_id).await?;
    tracing::info!(chat_id = %chat.id, gateway_session_id = %session_id, "gateway session initialized");
    Ok(session_id)
}

/// Persists a message and broadcasts it to the chat's room, in that
/// order. The classification is computed here, once, from the flags.
async fn persist_and_broadcast(
    state: &AppState,
    chat_id: Uuid,
    content: &str,
    is_system: bool,
    sent_to_gateway: bool,
    gateway_message_id: Option<&str>,
) -> Result<Message> {
    let kind = MessageKind::classify(is_system, sent_to_gateway, gateway_message_id.is_some());
    let message = message_repo::insert_message(
        &state.db,
        message_repo::NewMessage {
            id: Uuid::new_v4(),
            chat_id,
            content,
            is_system,
            is_markdown: is_system && is_markdown(content),
            sent_to_gateway,
            gateway_message_id,
            kind,
        },
    )
    .await?;

    state
        .broker
        .broadcast(chat_id, &ServerEvent::NewMessage(MessagePayload::from(&message)))
        .await;

    Ok(message)
}

/// Handles one incoming user message: persist and broadcast it, let the
/// responder decide the routing, relay to the gateway when asked, and
/// reply to the user when asked. Returns the last message created.
pub async fn post_message(
    state: &AppState,
    user: &User,
    chat_id: Uuid,
    system_prompt: &str,
    question: &str,
) -> Result<Message> {
    let chat = get_owned_chat(state, user.id, chat_id).await?;

    let user_message =
        persist_and_broadcast(state, chat.id, question, false, false, None).await?;

    // A closed chat still records what the user said but stays silent.
    if chat.status == ChatStatus::Closed {
        tracing::info!(chat_id = %chat.id, "chat is closed; skipping reply");
        return Ok(user_message);
    }

    let messages = message_repo::list_by_chat(&state.db, &chat.id).await?;
    let history = to_history(&messages);

    let mut decision = state
        .responder
        .route(RouteRequest {
            system_prompt,
            question,
            history: &history,
            relay_active: chat.relay_active(),
            gateway_available: state.gateway.is_configured(),
        })
        .await;

    if let Some(outbound) = decision.forward_to_gateway.take() {
        if chat.gateway_active {
            ensure_gateway_session(state, &chat).await?;
            match gateway_address(&user.email, chat.id) {
                Some(to_address) => {
                    match state.gateway.send_message(&to_address, &outbound).await {
                        Ok(gateway_message_id) => {
                            persist_and_broadcast(
                                state,
                                chat.id,
                                &outbound,
                                true,
                                true,
                                gateway_message_id.as_deref(),
                            )
                            .await?;
                        }
                        Err(e) => {
                            // Relay failure never fails the user request;
                            // fall back to answering the user directly.
                            tracing::error!(chat_id = %chat.id, error = %e, "gateway send failed");
                            if decision.reply_to_user.is_none() {
                                decision.reply_to_user = Some(
                                    "I couldn't reach a live agent just now. Your message \
                                     has been recorded; please try again in a moment."
                                        .to_string(),
                                );
                            }
                        }
                    }
                }
                None => {
                    tracing::warn!(chat_id = %chat.id, "cannot derive gateway address from email");
                }
            }
        } else {
            tracing::debug!(chat_id = %chat.id, "gateway relay inactive for chat");
        }
    }

    if let Some(reply) = decision.reply_to_user {
        let system_message =
            persist_and_broadcast(state, chat.id, &reply, true, false, None).await?;
        return Ok(system_message);
    }

    Ok(user_message)
}

/// Records a message that arrived from the gateway (webhook direction
/// `Inbound`), matched to its chat by gateway session id, and fans it out
/// to the chat's room.
pub async fn record_gateway_message(
    state: &AppState,
    gateway_session_id: &str,
    gateway_message_id: &str,
    text: &str,
) -> Result<Message> {
    let chat = chat_repo::find_by_gateway_session(&state.db, gateway_session_id)
        .await?
        .ok_or(AppError::NotFound)?;

    let message = persist_and_broadcast(
        state,
        chat.id,
        text,
        true,
        true,
        Some(gateway_message_id),
    )
    .await?;

    tracing::info!(chat_id = %chat.id, gateway_message_id, "gateway message recorded");
    Ok(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn gateway_address_tags_local_part_with_chat_id() {
        let chat_id = Uuid::new_v4();
        let address = gateway_address("ada@example.com", chat_id).unwrap();
        assert_eq!(address, format!("ada+{chat_id}@example.com"));
    }

    #[test]
    fn gateway_address_rejects_invalid_emails() {
        let chat_id = Uuid::new_v4();
        assert!(gateway_address("no-at-sign", chat_id).is_none());
        assert!(gateway_address("@example.com", chat_id).is_none());
        assert!(gateway_address("ada@", chat_id).is_none());
    }

    #[test]
    fn history_roles_follow_the_system_flag() {
        let base = Message {
            id: Uuid::new_v4(),
            chat_id: Uuid::new_v4(),
            content: "hi".to_string(),
            is_system: false,
            is_markdown: false,
            sent_to_gateway: false,
            gateway_message_id: None,
            kind: MessageKind::User,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let system = Message {
            is_system: true,
            kind: MessageKind::System,
            content: "hello, how can I help?".to_string(),
            ..base.clone()
        };
        let history = to_history(&[base, system]);
        assert_eq!(history[0].role, Role::User);
        assert_eq!(history[1].role, Role::Assistant);
    }
}
