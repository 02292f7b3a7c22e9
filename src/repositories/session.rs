use chrono::{DateTime, Utc};
use deadpool_postgres::Pool;
use tokio_postgres::Row;
use uuid::Uuid;
use crate::{
    error::Result,
    models::session::Session,
};

/// A helper function to map a `tokio_postgres::Row` to a `Session`.
fn row_to_session(row: &Row) -> Result<Session> {
    Ok(Session {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        session_token: row.try_get("session_token")?,
        device_id: row.try_get("device_id")?,
        expires: row.try_get("expires")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

/// Creates a new session row for a freshly issued token.
pub async fn create_session(
    pool: &Pool,
    id: Uuid,
    user_id: Uuid,
    session_token: &str,
    device_id: Option<&str>,
    expires: DateTime<Utc>,
) -> Result<Session> {
    let client = pool.get().await?;
    let row = client
        .query_one(
            r#"
            INSERT INTO sessions (id, user_id, session_token, device_id, expires)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
            &[&id, &user_id, &session_token, &device_id, &expires],
        )
        .await?;
    row_to_session(&row)
}

/// Finds a session by its bearer token.
pub async fn find_by_token(pool: &Pool, session_token: &str) -> Result<Option<Session>> {
    let client = pool.get().await?;
    let row = client
        .query_opt(
            r#"
            SELECT *
            FROM sessions
            WHERE session_token = $1
            "#,
            &[&session_token],
        )
        .await?;
    row.map(|r| row_to_session(&r)).transpose()
}

/// Deletes a session by its ID. Used for lazy cleanup of expired sessions.
pub async fn delete_by_id(pool: &Pool, session_id: &Uuid) -> Result<()> {
    let client = pool.get().await?;
    client
        .execute(
            r#"
            DELETE FROM sessions
            WHERE id = $1
            "#,
            &[session_id],
        )
        .await?;
    Ok(())
}

/// Deletes every session past its expiry. Run periodically so tokens that
/// never reconnect do not accumulate.
pub async fn delete_expired(pool: &Pool) -> Result<u64> {
    let client = pool.get().await?;
    let deleted = client
        .execute(
            r#"
            DELETE FROM sessions
            WHERE expires < now()
            "#,
            &[],
        )
        .await?;
    Ok(deleted)
}

/// Deletes every session bound to a device. Returns the number of rows
/// removed so the caller can distinguish sign-out from an unknown device.
pub async fn delete_by_device(pool: &Pool, device_id: &str) -> Result<u64> {
    let client = pool.get().await?;
    let deleted = client
        .execute(
            r#"
            DELETE FROM sessions
            WHERE device_id = $1
            "#,
            &[&device_id],
        )
        .await?;
    Ok(deleted)
}
