use deadpool_postgres::Pool;
use tokio_postgres::Row;
use uuid::Uuid;
use crate::{
    error::Result,
    models::chat::Chat,
};

/// A helper function to map a `tokio_postgres::Row` to a `Chat`.
fn row_to_chat(row: &Row) -> Result<Chat> {
    Ok(Chat {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        status: row.try_get("status")?,
        user_id: row.try_get("user_id")?,
        gateway_session_id: row.try_get("gateway_session_id")?,
        gateway_active: row.try_get("gateway_active")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

/// Creates a new chat for a user.
pub async fn create_chat(
    pool: &Pool,
    id: Uuid,
    user_id: Uuid,
    title: Option<&str>,
) -> Result<Chat> {
    let client = pool.get().await?;
    let row = client
        .query_one(
            r#"
            INSERT INTO chats (id, user_id, title)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
            &[&id, &user_id, &title],
        )
        .await?;
    row_to_chat(&row)
}

/// Finds a chat by its ID.
pub async fn find_by_id(pool: &Pool, chat_id: &Uuid) -> Result<Option<Chat>> {
    let client = pool.get().await?;
    let row = client
        .query_opt(
            r#"
            SELECT *
            FROM chats
            WHERE id = $1
            "#,
            &[chat_id],
        )
        .await?;
    row.map(|r| row_to_chat(&r)).transpose()
}

/// Lists a user's chats, newest first.
pub async fn list_by_user(pool: &Pool, user_id: &Uuid) -> Result<Vec<Chat>> {
    let client = pool.get().await?;
    let rows = client
        .query(
            r#"
            SELECT *
            FROM chats
            WHERE user_id = $1
            ORDER BY created_at DESC
            "#,
            &[user_id],
        )
        .await?;
    rows.iter().map(row_to_chat).collect()
}

/// Finds the chat bridged to a gateway conversation, if any.
pub async fn find_by_gateway_session(
    pool: &Pool,
    gateway_session_id: &str,
) -> Result<Option<Chat>> {
    let client = pool.get().await?;
    let row = client
        .query_opt(
            r#"
            SELECT *
            FROM chats
            WHERE gateway_session_id = $1
            "#,
            &[&gateway_session_id],
        )
        .await?;
    row.map(|r| row_to_chat(&r)).transpose()
}

/// Records the gateway conversation id assigned to a chat.
pub async fn set_gateway_session(
    pool: &Pool,
    chat_id: &Uuid,
    gateway_session_id: &str,
) -> Result<()> {
    let client = pool.get().await?;
    client
        .execute(
            r#"
            UPDATE chats
            SET gateway_session_id = $1, gateway_active = true, updated_at = now()
            WHERE id = $2
            "#,
            &[&gateway_session_id, chat_id],
        )
        .await?;
    Ok(())
}
