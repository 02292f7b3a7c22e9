use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::message::{Message, MessageKind};

/// A request-style event sent by a client over the WebSocket.
#[derive(Debug, Deserialize, PartialEq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ClientEvent {
    /// Subscribe to a chat's room.
    Join {
        #[serde(rename = "chatId")]
        chat_id: Uuid,
    },
    /// Unsubscribe from a chat's room.
    Leave {
        #[serde(rename = "chatId")]
        chat_id: Uuid,
    },
}

/// An event pushed from the server to subscribed clients.
#[derive(Debug, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ServerEvent {
    /// A newly persisted message, broadcast to the chat's room.
    NewMessage(MessagePayload),
    /// Acknowledgment of a client request event.
    Ack(AckPayload),
}

/// The wire shape of a broadcast message. Field names are camelCase to
/// match what the browser client renders.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePayload {
    pub id: Uuid,
    pub chat_id: Uuid,
    pub content: String,
    pub is_system: bool,
    pub is_markdown: bool,
    pub sent_to_gateway: bool,
    pub gateway_message_id: Option<String>,
    pub kind: MessageKind,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Message> for MessagePayload {
    fn from(message: &Message) -> Self {
        Self {
            id: message.id,
            chat_id: message.chat_id,
            content: message.content.clone(),
            is_system: message.is_system,
            is_markdown: message.is_markdown,
            sent_to_gateway: message.sent_to_gateway,
            gateway_message_id: message.gateway_message_id.clone(),
            kind: message.kind,
            created_at: message.created_at,
            updated_at: message.updated_at,
        }
    }
}

/// Acknowledgment body for `join`/`leave` requests.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AckPayload {
    /// The request event being acknowledged.
    pub request: &'static str,
    /// `"success"` or `"error"`.
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chat_id: Option<Uuid>,
}

impl AckPayload {
    pub fn success(request: &'static str, chat_id: Uuid) -> Self {
        Self {
            request,
            status: "success",
            message: None,
            chat_id: Some(chat_id),
        }
    }

    pub fn error(request: &'static str, message: impl Into<String>) -> Self {
        Self {
            request,
            status: "error",
            message: Some(message.into()),
            chat_id: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn parses_join_and_leave() {
        let chat_id = Uuid::new_v4();
        let join: ClientEvent =
            sonic_rs::from_str(&format!(r#"{{"event":"join","chatId":"{chat_id}"}}"#)).unwrap();
        assert_eq!(join, ClientEvent::Join { chat_id });

        let leave: ClientEvent =
            sonic_rs::from_str(&format!(r#"{{"event":"leave","chatId":"{chat_id}"}}"#)).unwrap();
        assert_eq!(leave, ClientEvent::Leave { chat_id });
    }

    #[test]
    fn rejects_unknown_events() {
        let parsed: Result<ClientEvent, _> =
            sonic_rs::from_str(r#"{"event":"subscribe","chatId":"not-a-chat"}"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn new_message_uses_camel_case_field_names() {
        let message = Message {
            id: Uuid::new_v4(),
            chat_id: Uuid::new_v4(),
            content: "hello".to_string(),
            is_system: false,
            is_markdown: false,
            sent_to_gateway: false,
            gateway_message_id: None,
            kind: MessageKind::User,
            created_at: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
            updated_at: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
        };
        let json = sonic_rs::to_string(&ServerEvent::NewMessage((&message).into())).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["event"], "new_message");
        assert_eq!(value["chatId"], message.chat_id.to_string());
        assert_eq!(value["content"], "hello");
        assert_eq!(value["isSystem"], false);
        assert_eq!(value["sentToGateway"], false);
        assert_eq!(value["kind"], "user");
        assert!(value["gatewayMessageId"].is_null());
    }

    #[test]
    fn ack_omits_empty_fields() {
        let chat_id = Uuid::new_v4();
        let ok = sonic_rs::to_string(&ServerEvent::Ack(AckPayload::success("join", chat_id))).unwrap();
        let value: serde_json::Value = serde_json::from_str(&ok).unwrap();
        assert_eq!(value["event"], "ack");
        assert_eq!(value["status"], "success");
        assert_eq!(value["chatId"], chat_id.to_string());
        assert!(value.get("message").is_none());

        let err = sonic_rs::to_string(&ServerEvent::Ack(AckPayload::error("join", "denied"))).unwrap();
        let value: serde_json::Value = serde_json::from_str(&err).unwrap();
        assert_eq!(value["status"], "error");
        assert_eq!(value["message"], "denied");
    }
}
