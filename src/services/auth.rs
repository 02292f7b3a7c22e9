use crate::error::{AppError, Result};
use crate::models::session::Session;
use crate::models::user::User;
use crate::repositories::session as session_repo;
use crate::repositories::user as user_repo;
use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2, ParamsBuilder,
};
use chrono::{Duration, Utc};
use deadpool_postgres::Pool;
use rand::{rngs::OsRng, RngCore};
use uuid::Uuid;
use zeroize::Zeroize;

/// The memory cost for Argon2 in MB.
const ARGON2_MEMORY_MB: u32 = 19;
/// The number of iterations for Argon2.
const ARGON2_ITERATIONS: u32 = 3;
/// The parallelism factor for Argon2.
const ARGON2_PARALLELISM: u32 = 6;

/// The byte length of a session token before hex encoding.
const SESSION_TOKEN_BYTES: usize = 32;

/// Hashes a password using Argon2id.
fn hash_password(password: &str) -> Result<String> {
    let mut password_bytes = password.as_bytes().to_vec();

    let mut salt_bytes = [0u8; 16];
    OsRng
        .try_fill_bytes(&mut salt_bytes)
        .map_err(|e| AppError::Internal(format!("Failed to generate salt: {}", e)))?;

    let salt = SaltString::encode_b64(&salt_bytes)
        .map_err(|e| AppError::Internal(format!("Salt encoding error: {}", e)))?;

    let argon2 = Argon2::new(
        argon2::Algorithm::Argon2id,
        argon2::Version::V0x13,
        ParamsBuilder::new()
            .m_cost(ARGON2_MEMORY_MB * 1024)
            .t_cost(ARGON2_ITERATIONS)
            .p_cost(ARGON2_PARALLELISM)
            .build()
            .map_err(|e| AppError::Internal(format!("Argon2 params: {}", e)))?,
    );

    let password_hash = argon2
        .hash_password(&password_bytes, &salt)
        .map_err(|e| AppError::Internal(format!("Argon2 hash error: {}", e)))?
        .to_string();

    password_bytes.zeroize();
    tracing::debug!("Password hashed successfully with Argon2");
    Ok(password_hash)
}

/// Verifies a password against a hash.
fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let mut password_bytes = password.as_bytes().to_vec();
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| AppError::Internal(format!("Hash parse error: {}", e)))?;
    let argon2 = Argon2::default();
    let result = argon2.verify_password(&password_bytes, &parsed_hash).is_ok();

    password_bytes.zeroize();
    Ok(result)
}

/// Computes a fresh session's expiry timestamp.
fn session_expiry(session_duration_days: i64) -> chrono::DateTime<Utc> {
    Utc::now() + Duration::days(session_duration_days)
}

/// Generates an opaque session token: 32 random bytes, hex-encoded.
fn generate_session_token() -> Result<String> {
    let mut bytes = [0u8; SESSION_TOKEN_BYTES];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| AppError::Internal(format!("Failed to generate token: {}", e)))?;
    Ok(hex::encode(bytes))
}

/// Creates a new user account.
pub async fn signup(pool: &Pool, name: &str, email: &str, password: &str) -> Result<User> {
    tracing::debug!(email, "creating user");
    let password_hash = hash_password(password)?;

    let user = user_repo::create_user(pool, Uuid::new_v4(), name, email, &password_hash).await?;

    tracing::info!(user_id = %user.id, "user created");
    Ok(user)
}

/// Authenticates credentials and issues a fresh session.
///
/// A login from a device that already holds a session replaces that
/// device's sessions instead of conflicting with them, so re-login from
/// the same browser installation always succeeds.
pub async fn login(
    pool: &Pool,
    session_duration_days: i64,
    email: &str,
    password: &str,
    device_id: Option<&str>,
) -> Result<(User, Session)> {
    let user = user_repo::find_by_email(pool, email)
        .await?
        .ok_or_else(|| AppError::Authentication("Invalid email or password".to_string()))?;

    if !verify_password(password, &user.password)? {
        return Err(AppError::Authentication(
            "Invalid email or password".to_string(),
        ));
    }

    if let Some(device_id) = device_id {
        let replaced = session_repo::delete_by_device(pool, device_id).await?;
        if replaced > 0 {
            tracing::debug!(device_id, replaced, "replaced existing device sessions");
        }
    }

    let token = generate_session_token()?;
    let expires = session_expiry(session_duration_days);
    let session =
        session_repo::create_session(pool, Uuid::new_v4(), user.id, &token, device_id, expires)
            .await?;

    tracing::info!(user_id = %user.id, "user logged in");
    Ok((user, session))
}

/// Deletes every session bound to a device. Returns how many were removed.
pub async fn sign_out_device(pool: &Pool, device_id: &str) -> Result<u64> {
    let deleted = session_repo::delete_by_device(pool, device_id).await?;
    tracing::info!(device_id, deleted, "device signed out");
    Ok(deleted)
}

/// Resolves a bearer token to its user and session. Expired sessions are
/// deleted on sight and reported as an authentication failure.
pub async fn resolve_session(pool: &Pool, token: &str) -> Result<(User, Session)> {
    let session = session_repo::find_by_token(pool, token)
        .await?
        .ok_or_else(|| {
            AppError::Authentication("Invalid or missing credentials".to_string())
        })?;

    if session.is_expired() {
        session_repo::delete_by_id(pool, &session.id).await?;
        return Err(AppError::Authentication("Session has expired".to_string()));
    }

    let user = user_repo::find_by_id(pool, &session.user_id)
        .await?
        .ok_or_else(|| {
            AppError::Authentication("Invalid or missing credentials".to_string())
        })?;

    Ok((user, session))
}
