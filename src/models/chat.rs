use chrono::{DateTime, Utc};
use postgres_types::{FromSql, ToSql};
use serde::Serialize;
use uuid::Uuid;

/// The lifecycle state of a chat. Transitions are one-directional:
/// a CLOSED chat is never reopened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSql, FromSql)]
#[postgres(name = "chat_status")]
pub enum ChatStatus {
    #[postgres(name = "OPEN")]
    #[serde(rename = "OPEN")]
    Open,
    #[postgres(name = "CLOSED")]
    #[serde(rename = "CLOSED")]
    Closed,
}

/// Represents a support chat owned by a single user.
#[derive(Debug, Clone, Serialize)]
pub struct Chat {
    /// The unique identifier for the chat.
    pub id: Uuid,
    /// An optional display title.
    pub title: Option<String>,
    /// The lifecycle state.
    pub status: ChatStatus,
    /// The ID of the owning user.
    pub user_id: Uuid,
    /// The external gateway conversation this chat is bridged to, if any.
    pub gateway_session_id: Option<String>,
    /// Whether gateway relay is active for this chat.
    pub gateway_active: bool,
    /// The timestamp when the chat was created.
    pub created_at: DateTime<Utc>,
    /// The timestamp when the chat was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Chat {
    /// Whether messages in this chat should be relayed to the gateway.
    pub fn relay_active(&self) -> bool {
        self.gateway_active && self.gateway_session_id.is_some()
    }
}
