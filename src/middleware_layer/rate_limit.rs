use axum::{
    body::Body,
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use sonic_rs::JsonValueTrait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use crate::{error::AppError, state::AppState};

/// Failed attempts per email before login is locked.
const MAX_FAILED_ATTEMPTS: u32 = 5;
/// How long a lockout window lasts.
const LOCKOUT_WINDOW: Duration = Duration::from_secs(15 * 60);

struct AttemptWindow {
    count: u32,
    window_start: Instant,
}

/// In-process failed-login accounting, keyed by email. A successful login
/// clears the caller's window; too many failures lock the email out until
/// the window expires.
#[derive(Clone)]
pub struct LoginThrottle {
    attempts: Arc<Mutex<HashMap<String, AttemptWindow>>>,
}

impl LoginThrottle {
    pub fn new() -> Self {
        Self {
            attempts: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Whether the email is currently locked out. Expired windows are
    /// pruned as a side effect.
    pub async fn is_locked(&self, email: &str) -> bool {
        let mut attempts = self.attempts.lock().await;
        let expired = attempts
            .get(email)
            .is_some_and(|window| window.window_start.elapsed() >= LOCKOUT_WINDOW);
        if expired {
            attempts.remove(email);
            return false;
        }
        attempts
            .get(email)
            .is_some_and(|window| window.count >= MAX_FAILED_ATTEMPTS)
    }

    /// Records one failed attempt for the email.
    pub async fn record_failure(&self, email: &str) {
        let mut attempts = self.attempts.lock().await;
        let window = attempts.entry(email.to_string()).or_insert(AttemptWindow {
            count: 0,
            window_start: Instant::now(),
        });
        if window.window_start.elapsed() >= LOCKOUT_WINDOW {
            window.count = 0;
            window.window_start = Instant::now();
        }
        window.count += 1;
    }

    /// Clears the email's window after a successful login.
    pub async fn clear(&self, email: &str) {
        self.attempts.lock().await.remove(email);
    }
}

impl Default for LoginThrottle {
    fn default() -> Self {
        Self::new()
    }
}

/// Peeks the login payload for the email the attempt is charged to.
fn extract_email_from_body(body_bytes: &[u8]) -> Option<String> {
    sonic_rs::from_slice::<sonic_rs::Value>(body_bytes)
        .ok()
        .and_then(|json| json.get("email").and_then(|v| v.as_str().map(str::to_string)))
}

/// A middleware that rate limits login attempts per email.
///
/// Failed attempts (4xx responses) count against the email's window;
/// a successful login clears it.
pub async fn rate_limit_login(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let (parts, body) = req.into_parts();
    let body_bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .unwrap_or_default();

    let email = extract_email_from_body(&body_bytes)
        .unwrap_or_else(|| "unknown".to_string());

    if state.login_throttle.is_locked(&email).await {
        tracing::warn!(%email, "login locked out");
        return AppError::Authentication(
            "Too many failed login attempts. Try again later".to_string(),
        )
        .into_response();
    }

    let new_req = Request::from_parts(parts, Body::from(body_bytes));
    let response = next.run(new_req).await;

    if response.status().is_client_error() {
        state.login_throttle.record_failure(&email).await;
    } else if response.status().is_success() {
        state.login_throttle.clear(&email).await;
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn locks_after_max_failures_and_clears_on_success() {
        let throttle = LoginThrottle::new();
        for _ in 0..MAX_FAILED_ATTEMPTS {
            assert!(!throttle.is_locked("a@example.com").await);
            throttle.record_failure("a@example.com").await;
        }
        assert!(throttle.is_locked("a@example.com").await);

        throttle.clear("a@example.com").await;
        assert!(!throttle.is_locked("a@example.com").await);
    }

    #[tokio::test]
    async fn emails_are_throttled_independently() {
        let throttle = LoginThrottle::new();
        for _ in 0..MAX_FAILED_ATTEMPTS {
            throttle.record_failure("a@example.com").await;
        }
        assert!(throttle.is_locked("a@example.com").await);
        assert!(!throttle.is_locked("b@example.com").await);
    }

    #[test]
    fn email_is_read_from_login_payload() {
        let body = br#"{"email":"ada@example.com","password":"secret"}"#;
        assert_eq!(
            extract_email_from_body(body).as_deref(),
            Some("ada@example.com")
        );
        assert!(extract_email_from_body(b"not json").is_none());
    }
}
