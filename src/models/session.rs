use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Represents a login session, one per signed-in device.
#[derive(Debug, Clone)]
pub struct Session {
    /// The unique identifier for the session.
    pub id: Uuid,
    /// The ID of the user this session belongs to.
    pub user_id: Uuid,
    /// The opaque bearer token presented on every request.
    pub session_token: String,
    /// The client-generated device identifier, used for targeted sign-out.
    pub device_id: Option<String>,
    /// The timestamp when the session expires.
    pub expires: DateTime<Utc>,
    /// The timestamp when the session was created.
    pub created_at: DateTime<Utc>,
    /// The timestamp when the session was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Session {
    /// Whether the session has passed its expiry time.
    pub fn is_expired(&self) -> bool {
        self.expires < Utc::now()
    }
}
