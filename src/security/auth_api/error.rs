use axum::response::{IntoResponse, Response};

use crate::core::shared::api_error::ApiError;
use crate::store::StoreError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    MissingToken,
    InvalidToken,
    ExpiredToken,
    SessionExpired,
    UserNotFound,
    InsufficientRole,
    InvalidCredentials,
    RegistrationFailed,
    InvalidRecoveryCode,
    InternalError(String),
}

impl AuthError {
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::MissingToken => "missing_token",
            Self::InvalidToken => "invalid_token",
            Self::ExpiredToken => "expired_token",
            Self::SessionExpired => "session_expired",
            Self::UserNotFound => "user_not_found",
            Self::InsufficientRole => "insufficient_role",
            Self::InvalidCredentials => "invalid_credentials",
            Self::RegistrationFailed => "registration_failed",
            Self::InvalidRecoveryCode => "invalid_recovery_code",
            Self::InternalError(_) => "internal_error",
        }
    }

    pub fn message(&self) -> String {
        match self {
            Self::MissingToken => "Authentication required".to_string(),
            Self::InvalidToken => "Invalid authentication token".to_string(),
            Self::ExpiredToken => "Authentication token has expired".to_string(),
            Self::SessionExpired => "Your session has expired".to_string(),
            Self::UserNotFound => "User not found".to_string(),
            Self::InsufficientRole => "Insufficient role".to_string(),
            Self::InvalidCredentials => "Invalid email or password".to_string(),
            Self::RegistrationFailed => "Registration failed. Please try again.".to_string(),
            Self::InvalidRecoveryCode => "Invalid or expired recovery code".to_string(),
            Self::InternalError(_) => "An internal error occurred".to_string(),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(error: AuthError) -> Self {
        match error {
            AuthError::InsufficientRole => ApiError::Forbidden(error.message()),
            AuthError::RegistrationFailed | AuthError::InvalidRecoveryCode => {
                ApiError::BadRequest(error.message())
            }
            AuthError::InternalError(detail) => ApiError::Internal(detail),
            other => ApiError::Unauthorized(other.message()),
        }
    }
}

impl From<StoreError> for AuthError {
    fn from(error: StoreError) -> Self {
        Self::InternalError(error.to_string())
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        ApiError::from(self).into_response()
    }
}
