use deadpool_postgres::Pool;
use tokio_postgres::Row;
use uuid::Uuid;
use crate::{
    error::Result,
    models::memory::Memory,
};

/// A helper function to map a `tokio_postgres::Row` to a `Memory`.
fn row_to_memory(row: &Row) -> Result<Memory> {
    Ok(Memory {
        id: row.try_get("id")?,
        chat_id: row.try_get("chat_id")?,
        content: row.try_get("content")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

/// Creates a new memory attached to a chat.
pub async fn create_memory(
    pool: &Pool,
    id: Uuid,
    chat_id: Uuid,
    content: &str,
) -> Result<Memory> {
    let client = pool.get().await?;
    let row = client
        .query_one(
            r#"
            INSERT INTO memories (id, chat_id, content)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
            &[&id, &chat_id, &content],
        )
        .await?;
    row_to_memory(&row)
}

/// Lists a chat's memories ordered by creation time, oldest first.
pub async fn list_by_chat(pool: &Pool, chat_id: &Uuid) -> Result<Vec<Memory>> {
    let client = pool.get().await?;
    let rows = client
        .query(
            r#"
            SELECT *
            FROM memories
            WHERE chat_id = $1
            ORDER BY created_at ASC
            "#,
            &[chat_id],
        )
        .await?;
    rows.iter().map(row_to_memory).collect()
}

/// Deletes a memory scoped to its chat. Returns whether a row was removed.
pub async fn delete_memory(pool: &Pool, memory_id: &Uuid, chat_id: &Uuid) -> Result<bool> {
    let client = pool.get().await?;
    let deleted = client
        .execute(
            r#"
            DELETE FROM memories
            WHERE id = $1 AND chat_id = $2
            "#,
            &[memory_id, chat_id],
        )
        .await?;
    Ok(deleted > 0)
}
