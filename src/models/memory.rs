use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// A durable note attached to a chat, independent of its messages.
#[derive(Debug, Clone, Serialize)]
pub struct Memory {
    /// The unique identifier for the memory.
    pub id: Uuid,
    /// The ID of the chat this memory belongs to.
    pub chat_id: Uuid,
    /// The free-text content.
    pub content: String,
    /// The timestamp when the memory was created.
    pub created_at: DateTime<Utc>,
    /// The timestamp when the memory was last updated.
    pub updated_at: DateTime<Utc>,
}
