//! HTTP-facing error type and the JSON/query extractors that reject into it.

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        FromRequest, FromRequestParts,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use uuid::Uuid;

use crate::security::error_sanitizer::{ApiErrorDetail, FieldError, SafeErrorResponse};
use crate::security::validation::{ValidationError, ValidationResult};
use crate::store::StoreError;

pub const VALIDATION_FAILED: &str = "Validation failed";

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{message}")]
    Validation {
        message: String,
        details: Vec<FieldError>,
    },
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    ServiceUnavailable(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation { .. } | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "validation_error",
            Self::BadRequest(_) => "bad_request",
            Self::Unauthorized(_) => "unauthorized",
            Self::Forbidden(_) => "forbidden",
            Self::NotFound(_) => "not_found",
            Self::Conflict(_) => "conflict",
            Self::ServiceUnavailable(_) => "service_unavailable",
            Self::Internal(_) => "internal_error",
        }
    }

    /// Client-visible message. Internal details never leave the process.
    pub fn message(&self) -> String {
        match self {
            Self::Internal(_) => "An internal error occurred".to_string(),
            other => other.to_string(),
        }
    }

    pub fn internal(err: impl std::fmt::Display) -> Self {
        Self::Internal(err.to_string())
    }

    pub fn access_denied() -> Self {
        Self::Forbidden("Access denied".to_string())
    }

    pub fn invalid_id(what: &str) -> Self {
        Self::BadRequest(format!("Invalid {what} ID"))
    }

    pub fn validation(details: Vec<FieldError>) -> Self {
        Self::Validation {
            message: VALIDATION_FAILED.to_string(),
            details,
        }
    }
}

impl From<ValidationResult> for ApiError {
    fn from(result: ValidationResult) -> Self {
        Self::validation(result.to_field_errors())
    }
}

impl From<ValidationError> for ApiError {
    fn from(error: ValidationError) -> Self {
        Self::validation(vec![error.to_field_error()])
    }
}

impl From<StoreError> for ApiError {
    fn from(error: StoreError) -> Self {
        Self::Internal(error.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let detail = self.to_string();
        let mut body = SafeErrorResponse::new(self.error_code(), self.message());
        if let Self::Validation { details, .. } = self {
            body = body.with_details(details);
        }

        let mut response = body.into_response();
        response.extensions_mut().insert(ApiErrorDetail(detail));
        response
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        match rejection {
            JsonRejection::MissingJsonContentType(_) => {
                Self::BadRequest("Content-Type must be application/json".to_string())
            }
            JsonRejection::JsonSyntaxError(_) => {
                Self::BadRequest("Invalid JSON in request body".to_string())
            }
            JsonRejection::JsonDataError(err) => {
                Self::validation(vec![FieldError::new("body", err.body_text())])
            }
            other => Self::BadRequest(other.body_text()),
        }
    }
}

impl From<QueryRejection> for ApiError {
    fn from(_: QueryRejection) -> Self {
        Self::BadRequest("Invalid query parameters".to_string())
    }
}

/// `axum::Json` whose rejection renders through [`ApiError`].
#[derive(Debug, Clone, Copy, Default, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// `axum::extract::Query` whose rejection renders through [`ApiError`].
#[derive(Debug, Clone, Copy, Default, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct ApiQuery<T>(pub T);

/// Parses a path segment as an id, answering 400 "Invalid {what} ID" otherwise.
pub fn parse_path_id(raw: &str, what: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::invalid_id(what))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_and_code_mapping() {
        let cases = [
            (ApiError::validation(vec![]), StatusCode::BAD_REQUEST, "validation_error"),
            (ApiError::BadRequest("x".into()), StatusCode::BAD_REQUEST, "bad_request"),
            (ApiError::Unauthorized("x".into()), StatusCode::UNAUTHORIZED, "unauthorized"),
            (ApiError::access_denied(), StatusCode::FORBIDDEN, "forbidden"),
            (ApiError::NotFound("x".into()), StatusCode::NOT_FOUND, "not_found"),
            (ApiError::Conflict("x".into()), StatusCode::CONFLICT, "conflict"),
            (ApiError::internal("boom"), StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        ];
        for (error, status, code) in cases {
            assert_eq!(error.status_code(), status);
            assert_eq!(error.error_code(), code);
        }
    }

    #[test]
    fn test_internal_message_is_generic() {
        let error = ApiError::internal("connection refused on 10.0.0.3");
        assert_eq!(error.message(), "An internal error occurred");
        assert!(error.to_string().contains("10.0.0.3"));
    }

    #[test]
    fn test_response_carries_detail_extension() {
        let response = ApiError::Conflict("Milestone exists".into()).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        let detail = response.extensions().get::<ApiErrorDetail>().unwrap();
        assert_eq!(detail.0, "Milestone exists");
    }

    #[test]
    fn test_validation_result_conversion() {
        let mut result = ValidationResult::new();
        result.add_error(ValidationError::Required("title".into()));
        let error: ApiError = result.into();
        match error {
            ApiError::Validation { message, details } => {
                assert_eq!(message, VALIDATION_FAILED);
                assert_eq!(details[0].field, "title");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_parse_path_id() {
        let id = Uuid::new_v4();
        assert_eq!(parse_path_id(&id.to_string(), "project").unwrap(), id);
        let err = parse_path_id("abc", "project").unwrap_err();
        assert_eq!(err.to_string(), "Invalid project ID");
    }
}
