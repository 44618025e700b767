//! HTTP handlers for `/api/auth/*`.

use axum::{
    extract::State,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::service::{AccountDto, IssuedSession, Registration};
use crate::core::shared::api_error::{ApiError, ApiJson};
use crate::core::shared::state::AppState;
use crate::core::urls::ApiUrls;
use crate::security::auth_api::utils::{clear_session_cookie, session_cookie};
use crate::security::auth_api::AuthenticatedUser;
use crate::security::password::{MAX_PASSWORD_LEN, MIN_PASSWORD_LEN};
use crate::security::validation::Validator;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RecoveryRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct CallbackRequest {
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePasswordRequest {
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub user: AccountDto,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user: AccountDto,
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    fn new(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            message: message.into(),
        })
    }
}

const RECOVERY_MESSAGE: &str =
    "If the email address exists, a password reset link has been sent";

fn optional_name(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn session_response(state: &AppState, session: IssuedSession) -> Response {
    let max_age = state.auth.session_ttl().num_seconds();
    let mut headers = HeaderMap::new();
    if let Ok(cookie) = HeaderValue::from_str(&session_cookie(
        &state.auth_config,
        &session.access_token,
        max_age,
    )) {
        headers.insert(header::SET_COOKIE, cookie);
    }

    let body = LoginResponse {
        user: session.account,
        access_token: session.access_token,
        expires_at: session.expires_at,
    };
    (StatusCode::OK, headers, Json(body)).into_response()
}

pub async fn handle_register(
    State(state): State<Arc<AppState>>,
    ApiJson(payload): ApiJson<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    Validator::new()
        .email(payload.email.trim())
        .length(
            &payload.password,
            "password",
            Some(MIN_PASSWORD_LEN),
            Some(MAX_PASSWORD_LEN),
        )
        .validate()?;

    let account = state
        .auth
        .register(Registration {
            email: payload.email,
            password: payload.password,
            first_name: optional_name(payload.first_name),
            last_name: optional_name(payload.last_name),
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            user: account,
            message: "Registration successful".to_string(),
        }),
    ))
}

pub async fn handle_login(
    State(state): State<Arc<AppState>>,
    ApiJson(payload): ApiJson<LoginRequest>,
) -> Result<Response, ApiError> {
    Validator::new()
        .email(payload.email.trim())
        .length(&payload.password, "password", Some(1), Some(MAX_PASSWORD_LEN))
        .validate()?;

    let session = state.auth.login(&payload.email, &payload.password).await?;
    Ok(session_response(&state, session))
}

pub async fn handle_logout(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
) -> Result<impl IntoResponse, ApiError> {
    state.auth.logout(&user).await?;

    let mut headers = HeaderMap::new();
    if let Ok(cookie) = HeaderValue::from_str(&clear_session_cookie(&state.auth_config)) {
        headers.insert(header::SET_COOKIE, cookie);
    }
    Ok((headers, MessageResponse::new("Logged out")))
}

pub async fn handle_password_recovery(
    State(state): State<Arc<AppState>>,
    ApiJson(payload): ApiJson<RecoveryRequest>,
) -> Result<impl IntoResponse, ApiError> {
    Validator::new().email(payload.email.trim()).validate()?;

    state.auth.request_recovery(&payload.email).await?;
    Ok(MessageResponse::new(RECOVERY_MESSAGE))
}

pub async fn handle_callback(
    State(state): State<Arc<AppState>>,
    ApiJson(payload): ApiJson<CallbackRequest>,
) -> Result<Response, ApiError> {
    Validator::new()
        .length(payload.code.trim(), "code", Some(1), Some(256))
        .validate()?;

    let session = state.auth.exchange_recovery_code(&payload.code).await?;
    Ok(session_response(&state, session))
}

pub async fn handle_update_password(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    ApiJson(payload): ApiJson<UpdatePasswordRequest>,
) -> Result<impl IntoResponse, ApiError> {
    Validator::new()
        .length(
            &payload.password,
            "password",
            Some(MIN_PASSWORD_LEN),
            Some(MAX_PASSWORD_LEN),
        )
        .validate()?;

    state.auth.update_password(&user, payload.password).await?;
    Ok(MessageResponse::new("Password updated successfully"))
}

pub fn configure_auth_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(ApiUrls::AUTH_REGISTER, post(handle_register))
        .route(ApiUrls::AUTH_LOGIN, post(handle_login))
        .route(ApiUrls::AUTH_LOGOUT, post(handle_logout))
        .route(ApiUrls::AUTH_PASSWORD_RECOVERY, post(handle_password_recovery))
        .route(ApiUrls::AUTH_CALLBACK, post(handle_callback))
        .route(ApiUrls::AUTH_UPDATE_PASSWORD, post(handle_update_password))
}
