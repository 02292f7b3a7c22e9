use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::{AppError, Result},
    services::auth as auth_service,
    state::AppState,
    validation::auth::*,
};

/// The request payload for signup.
#[derive(Deserialize, Debug)]
pub struct SignupRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

/// The request payload for login.
#[derive(Deserialize, Debug)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    pub device_id: Option<String>,
}

#[derive(Serialize)]
pub struct UserSummary {
    pub id: Uuid,
    pub email: String,
}

/// The response payload for signup.
#[derive(Serialize)]
pub struct SignupResponse {
    pub user: UserSummary,
}

#[derive(Serialize)]
pub struct LoginUser {
    pub id: Uuid,
    pub email: String,
    pub name: String,
}

/// The response payload for login.
#[derive(Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub expires: DateTime<Utc>,
    pub user: LoginUser,
}

/// Handles user signup.
#[axum::debug_handler]
pub async fn signup(
    State(state): State<AppState>,
    Json(payload): Json<SignupRequest>,
) -> Result<impl IntoResponse> {
    validate_name(&payload.name)?;
    validate_email(&payload.email)?;
    validate_password(&payload.password)?;

    let user = auth_service::signup(&state.db, &payload.name, &payload.email, &payload.password)
        .await?;

    let response = SignupResponse {
        user: UserSummary {
            id: user.id,
            email: user.email,
        },
    };

    Ok((StatusCode::CREATED, Json(response)).into_response())
}

/// Handles login, issuing a 30-day bearer token bound to the device.
#[axum::debug_handler]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Response> {
    validate_email(&payload.email)?;

    let (user, session) = auth_service::login(
        &state.db,
        state.config.session_duration_days,
        &payload.email,
        &payload.password,
        payload.device_id.as_deref(),
    )
    .await?;

    let response = LoginResponse {
        token: session.session_token,
        expires: session.expires,
        user: LoginUser {
            id: user.id,
            email: user.email,
            name: user.name,
        },
    };

    Ok((StatusCode::OK, Json(response)).into_response())
}

/// The query parameters for device sign-out.
#[derive(Deserialize)]
pub struct DeviceQuery {
    #[serde(rename = "deviceId")]
    pub device_id: Option<String>,
}

/// Deletes all sessions for a device.
#[axum::debug_handler]
pub async fn sign_out_device(
    State(state): State<AppState>,
    Query(query): Query<DeviceQuery>,
) -> Result<Response> {
    let device_id = query
        .device_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| {
            AppError::Validation("deviceId query parameter is required".to_string())
        })?;

    let deleted = auth_service::sign_out_device(&state.db, &device_id).await?;
    if deleted == 0 {
        return Err(AppError::NotFound);
    }

    Ok((
        StatusCode::OK,
        r#"{"message":"Device signed out successfully"}"#,
    )
        .into_response())
}
