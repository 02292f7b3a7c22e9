use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};

use crate::{
    error::{AppError, Result},
    models::session::Session,
    models::user::User,
    services::auth as auth_service,
    state::AppState,
};

/// The authenticated caller, inserted into request extensions by
/// [`require_auth`] and consumed by handlers via `Extension<CurrentUser>`.
#[derive(Clone)]
pub struct CurrentUser {
    pub user: User,
    pub session: Session,
}

/// Extracts the bearer token from the `Authorization` header.
fn extract_bearer_token(request: &Request<Body>) -> Option<String> {
    request
        .headers()
        .get(http::header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::to_string)
}

/// A middleware that requires a valid, unexpired session token.
///
/// Expired sessions presented here are deleted on the spot, so the store
/// cleans itself lazily as stale clients reconnect.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response> {
    let token = extract_bearer_token(&request).ok_or_else(|| {
        tracing::debug!("missing bearer token");
        AppError::Authentication("Invalid or missing credentials".to_string())
    })?;

    let (user, session) = auth_service::resolve_session(&state.db, &token).await?;

    tracing::debug!(user_id = %user.id, "request authenticated");
    request.extensions_mut().insert(CurrentUser { user, session });

    Ok(next.run(request).await)
}
