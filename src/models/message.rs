use chrono::{DateTime, Utc};
use postgres_types::{FromSql, ToSql};
use serde::Serialize;
use uuid::Uuid;

/// The relay classification assigned to a message at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSql, FromSql)]
#[postgres(name = "message_kind")]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// Authored by the end user.
    #[postgres(name = "user")]
    User,
    /// A system message shown only to the user.
    #[postgres(name = "system")]
    System,
    /// A locally generated system message forwarded to the gateway.
    #[postgres(name = "system_to_gateway")]
    SystemToGateway,
    /// A message that carries a gateway-assigned identifier.
    #[postgres(name = "gateway")]
    Gateway,
}

impl MessageKind {
    /// Derives the relay classification from the three flags known at
    /// message creation. Total over all eight combinations; the first
    /// matching row wins:
    ///
    /// | is_system | sent_to_gateway | has_gateway_message_id | kind |
    /// |---|---|---|---|
    /// | true | true | true | `Gateway` |
    /// | true | true | false | `SystemToGateway` |
    /// | true | false | — | `System` |
    /// | false | — | — | `User` |
    ///
    /// The result is persisted once and never recomputed, so this table
    /// must stay stable to keep historical rows reproducible.
    pub fn classify(
        is_system: bool,
        sent_to_gateway: bool,
        has_gateway_message_id: bool,
    ) -> Self {
        match (is_system, sent_to_gateway, has_gateway_message_id) {
            (true, true, true) => MessageKind::Gateway,
            (true, true, false) => MessageKind::SystemToGateway,
            (true, false, _) => MessageKind::System,
            (false, _, _) => MessageKind::User,
        }
    }

    /// The wire name used in JSON payloads and the database enum.
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::User => "user",
            MessageKind::System => "system",
            MessageKind::SystemToGateway => "system_to_gateway",
            MessageKind::Gateway => "gateway",
        }
    }
}

/// Represents a single message inside a chat. Immutable after creation.
#[derive(Debug, Clone, Serialize)]
pub struct Message {
    /// The unique identifier for the message.
    pub id: Uuid,
    /// The ID of the chat this message belongs to.
    pub chat_id: Uuid,
    /// The message body, optionally Markdown.
    pub content: String,
    /// Whether the message was system-authored rather than user-authored.
    pub is_system: bool,
    /// Whether the body was detected as Markdown at creation.
    pub is_markdown: bool,
    /// Whether the message was sent to the external gateway.
    pub sent_to_gateway: bool,
    /// The gateway-assigned message identifier, if any.
    pub gateway_message_id: Option<String>,
    /// The relay classification, set once at creation.
    pub kind: MessageKind,
    /// The timestamp when the message was created.
    pub created_at: DateTime<Utc>,
    /// The timestamp when the message was last updated.
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_covers_all_eight_combinations() {
        use MessageKind::*;
        let table = [
            ((true, true, true), Gateway),
            ((true, true, false), SystemToGateway),
            ((true, false, true), System),
            ((true, false, false), System),
            ((false, true, true), User),
            ((false, true, false), User),
            ((false, false, true), User),
            ((false, false, false), User),
        ];
        for ((is_system, sent, has_id), expected) in table {
            assert_eq!(
                MessageKind::classify(is_system, sent, has_id),
                expected,
                "({is_system}, {sent}, {has_id})"
            );
        }
    }

    #[test]
    fn non_system_messages_are_always_user_authored() {
        for sent in [false, true] {
            for has_id in [false, true] {
                assert_eq!(
                    MessageKind::classify(false, sent, has_id),
                    MessageKind::User
                );
            }
        }
    }

    #[test]
    fn wire_names_match_database_enum() {
        assert_eq!(MessageKind::User.as_str(), "user");
        assert_eq!(MessageKind::System.as_str(), "system");
        assert_eq!(MessageKind::SystemToGateway.as_str(), "system_to_gateway");
        assert_eq!(MessageKind::Gateway.as_str(), "gateway");
    }
}
