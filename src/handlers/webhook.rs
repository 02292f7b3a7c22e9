use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;

use crate::{
    error::{AppError, Result},
    services::chat as chat_service,
    state::AppState,
};

/// One party of a gateway conversation.
#[derive(Deserialize, Debug, Default)]
pub struct GatewayParty {
    pub id: Option<String>,
    pub nickname: Option<String>,
}

/// The channel block of an open-messaging webhook payload.
#[derive(Deserialize, Debug, Default)]
pub struct GatewayChannel {
    #[serde(default)]
    pub to: GatewayParty,
    #[serde(default)]
    pub from: GatewayParty,
    pub time: Option<String>,
}

/// The open-messaging webhook payload posted by the gateway.
#[derive(Deserialize, Debug)]
pub struct GatewayWebhookMessage {
    pub id: String,
    #[serde(default)]
    pub channel: GatewayChannel,
    pub direction: String,
    #[serde(default)]
    pub text: String,
    #[serde(default, rename = "type")]
    pub message_type: Option<String>,
}

/// Handles inbound webhook messages from the gateway. The recipient id
/// identifies the gateway session the chat was bridged under; delivery
/// receipts and other non-inbound notifications are acknowledged and
/// dropped.
#[axum::debug_handler]
pub async fn handle_webhook(
    State(state): State<AppState>,
    Json(payload): Json<GatewayWebhookMessage>,
) -> Result<Response> {
    if payload.direction != "Inbound" {
        tracing::debug!(direction = %payload.direction, "ignoring non-inbound webhook");
        return Ok((StatusCode::OK, r#"{"message":"ignored"}"#).into_response());
    }

    let gateway_session_id = payload
        .channel
        .to
        .id
        .as_deref()
        .filter(|id| !id.is_empty())
        .ok_or_else(|| {
            AppError::Validation("Recipient ID not found in message".to_string())
        })?;

    let message = chat_service::record_gateway_message(
        &state,
        gateway_session_id,
        &payload.id,
        &payload.text,
    )
    .await?;

    let body = sonic_rs::to_string(&sonic_rs::json!({
        "id": message.id.to_string(),
        "text": message.content,
        "type": payload.message_type.as_deref().unwrap_or("Text"),
        "timestamp": payload.channel.time,
        "sender": {
            "id": payload.channel.from.id,
            "name": payload.channel.from.nickname,
        }
    }))
    .unwrap_or_else(|_| r#"{"message":"received"}"#.to_string());

    Ok((StatusCode::OK, body).into_response())
}
