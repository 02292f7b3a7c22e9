use deadpool_postgres::Pool;
use tokio_postgres::Row;
use uuid::Uuid;
use crate::{
    error::Result,
    models::message::{Message, MessageKind},
};

/// The column values for a message about to be inserted. The `kind` must be
/// the classification of the three flags, computed once by the caller.
pub struct NewMessage<'a> {
    pub id: Uuid,
    pub chat_id: Uuid,
    pub content: &'a str,
    pub is_system: bool,
    pub is_markdown: bool,
    pub sent_to_gateway: bool,
    pub gateway_message_id: Option<&'a str>,
    pub kind: MessageKind,
}

/// A helper function to map a `tokio_postgres::Row` to a `Message`.
fn row_to_message(row: &Row) -> Result<Message> {
    Ok(Message {
        id: row.try_get("id")?,
        chat_id: row.try_get("chat_id")?,
        content: row.try_get("content")?,
        is_system: row.try_get("is_system")?,
        is_markdown: row.try_get("is_markdown")?,
        sent_to_gateway: row.try_get("sent_to_gateway")?,
        gateway_message_id: row.try_get("gateway_message_id")?,
        kind: row.try_get("kind")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

/// Inserts a new message. Messages are immutable after this point.
pub async fn insert_message(pool: &Pool, new: NewMessage<'_>) -> Result<Message> {
    let client = pool.get().await?;
    let row = client
        .query_one(
            r#"
            INSERT INTO messages
                (id, chat_id, content, is_system, is_markdown,
                 sent_to_gateway, gateway_message_id, kind)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
            &[
                &new.id,
                &new.chat_id,
                &new.content,
                &new.is_system,
                &new.is_markdown,
                &new.sent_to_gateway,
                &new.gateway_message_id,
                &new.kind,
            ],
        )
        .await?;
    row_to_message(&row)
}

/// Lists a chat's messages ordered by creation time, oldest first.
pub async fn list_by_chat(pool: &Pool, chat_id: &Uuid) -> Result<Vec<Message>> {
    let client = pool.get().await?;
    let rows = client
        .query(
            r#"
            SELECT *
            FROM messages
            WHERE chat_id = $1
            ORDER BY created_at ASC
            "#,
            &[chat_id],
        )
        .await?;
    rows.iter().map(row_to_message).collect()
}

/// Fetches the most recent message in a chat, if any.
pub async fn latest_by_chat(pool: &Pool, chat_id: &Uuid) -> Result<Option<Message>> {
    let client = pool.get().await?;
    let row = client
        .query_opt(
            r#"
            SELECT *
            FROM messages
            WHERE chat_id = $1
            ORDER BY created_at DESC
            LIMIT 1
            "#,
            &[chat_id],
        )
        .await?;
    row.map(|r| row_to_message(&r)).transpose()
}
