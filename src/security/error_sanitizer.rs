use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::request_id::RequestId;

/// One offending input field in a validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Error body returned by every endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct SafeErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<FieldError>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl SafeErrorResponse {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            details: None,
            request_id: None,
        }
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn with_details(mut self, details: Vec<FieldError>) -> Self {
        if !details.is_empty() {
            self.details = Some(details);
        }
        self
    }

    pub fn internal_error() -> Self {
        Self::new("internal_error", "An internal error occurred")
    }

    pub fn status_code(&self) -> StatusCode {
        match self.error.as_str() {
            "bad_request" | "validation_error" => StatusCode::BAD_REQUEST,
            "unauthorized" => StatusCode::UNAUTHORIZED,
            "forbidden" => StatusCode::FORBIDDEN,
            "not_found" => StatusCode::NOT_FOUND,
            "conflict" => StatusCode::CONFLICT,
            "service_unavailable" => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for SafeErrorResponse {
    fn into_response(self) -> Response {
        (self.status_code(), Json(self)).into_response()
    }
}

/// Internal description of a failed request, carried in response extensions
/// from the handler to [`api_error_logging_middleware`]. Never serialized.
#[derive(Debug, Clone)]
pub struct ApiErrorDetail(pub String);

/// Identity of the caller, attached to responses by the auth middleware so the
/// error log can name the user.
#[derive(Debug, Clone, Copy)]
pub struct CallerId(pub Uuid);

/// Structured record of one failed API call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiErrorLog {
    pub endpoint: String,
    pub status: u16,
    pub detail: String,
    pub correlation_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<Uuid>,
    pub timestamp: String,
}

impl ApiErrorLog {
    pub fn new(
        endpoint: impl Into<String>,
        status: StatusCode,
        detail: impl Into<String>,
        correlation_id: impl Into<String>,
        user_id: Option<Uuid>,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            status: status.as_u16(),
            detail: detail.into(),
            correlation_id: correlation_id.into(),
            user_id,
            timestamp: at.to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }
}

pub fn log_api_error(entry: &ApiErrorLog) {
    let user_id = entry.user_id.map(|id| id.to_string());
    let user_id = user_id.as_deref().unwrap_or("-");

    if entry.status >= 500 {
        error!(
            endpoint = %entry.endpoint,
            status = entry.status,
            detail = %entry.detail,
            correlation_id = %entry.correlation_id,
            user_id = %user_id,
            timestamp = %entry.timestamp,
            "API error"
        );
    } else if entry.status == 401 || entry.status == 403 {
        info!(
            endpoint = %entry.endpoint,
            status = entry.status,
            detail = %entry.detail,
            correlation_id = %entry.correlation_id,
            user_id = %user_id,
            timestamp = %entry.timestamp,
            "API request rejected"
        );
    } else {
        warn!(
            endpoint = %entry.endpoint,
            status = entry.status,
            detail = %entry.detail,
            correlation_id = %entry.correlation_id,
            user_id = %user_id,
            timestamp = %entry.timestamp,
            "API request failed"
        );
    }
}

/// Logs every error response once, and stamps the correlation id onto
/// server-error bodies so clients can report it.
pub async fn api_error_logging_middleware(request: Request<Body>, next: Next) -> Response {
    let endpoint = format!("{} {}", request.method(), request.uri().path());
    let correlation_id = request
        .extensions()
        .get::<RequestId>()
        .map(|r| r.correlation().to_string())
        .unwrap_or_else(|| "unknown".to_string());

    let response = next.run(request).await;
    let status = response.status();

    let Some(detail) = response.extensions().get::<ApiErrorDetail>().cloned() else {
        return response;
    };

    let user_id = response.extensions().get::<CallerId>().map(|c| c.0);
    log_api_error(&ApiErrorLog::new(
        &endpoint,
        status,
        detail.0,
        &correlation_id,
        user_id,
        Utc::now(),
    ));

    if status.is_server_error() {
        let (mut parts, _) = response.into_parts();
        parts.headers.remove(header::CONTENT_LENGTH);
        let body = SafeErrorResponse::internal_error().with_request_id(correlation_id);
        let bytes = serde_json::to_vec(&body).unwrap_or_default();
        return Response::from_parts(parts, Body::from(bytes));
    }

    response
}
