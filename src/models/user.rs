use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Represents a user account.
#[derive(Clone, Debug)]
pub struct User {
    /// The unique identifier for the user.
    pub id: Uuid,
    /// The user's display name.
    pub name: String,
    /// The user's email address.
    pub email: String,
    /// When the email address was verified, if ever.
    pub email_verified: Option<DateTime<Utc>>,
    /// The user's hashed password.
    pub password: String,
    /// An optional avatar URL.
    pub image: Option<String>,
    /// The timestamp when the user was created.
    pub created_at: DateTime<Utc>,
    /// The timestamp when the user was last updated.
    pub updated_at: DateTime<Utc>,
}
