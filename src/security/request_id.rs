use axum::{
    body::Body,
    http::{header::HeaderName, HeaderValue, Request},
    middleware::Next,
    response::Response,
};
use tracing::{info_span, Instrument};
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "x-request-id";
pub const CORRELATION_ID_HEADER: &str = "x-correlation-id";

const MAX_ID_LEN: usize = 128;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestId {
    pub id: String,
    pub correlation_id: Option<String>,
}

impl RequestId {
    pub fn new() -> Self {
        Self::with_id(Uuid::new_v4().to_string())
    }

    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            correlation_id: None,
        }
    }

    pub fn with_correlation(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    /// Id used to tie log lines and error bodies together.
    pub fn correlation(&self) -> &str {
        self.correlation_id.as_deref().unwrap_or(&self.id)
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id)
    }
}

/// Accepts a well-formed inbound `x-request-id` or mints one, forwards
/// `x-correlation-id`, and runs the rest of the stack inside a `request` span.
pub async fn request_id_middleware(mut request: Request<Body>, next: Next) -> Response {
    let request_id = resolve_request_id(&request);
    request.extensions_mut().insert(request_id.clone());

    let span = info_span!(
        "request",
        request_id = %request_id.id,
        correlation_id = ?request_id.correlation_id,
        method = %request.method(),
        path = %request.uri().path(),
    );

    let mut response = next.run(request).instrument(span).await;

    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(&request_id.id) {
        headers.insert(HeaderName::from_static(REQUEST_ID_HEADER), value);
    }
    if let Some(value) = request_id
        .correlation_id
        .as_deref()
        .and_then(|c| HeaderValue::from_str(c).ok())
    {
        headers.insert(HeaderName::from_static(CORRELATION_ID_HEADER), value);
    }

    response
}

fn resolve_request_id(request: &Request<Body>) -> RequestId {
    let header = |name: &str| {
        request
            .headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .filter(|v| is_valid_request_id(v))
            .map(str::to_string)
    };

    let request_id = header(REQUEST_ID_HEADER)
        .map(RequestId::with_id)
        .unwrap_or_default();

    match header(CORRELATION_ID_HEADER) {
        Some(correlation) => request_id.with_correlation(correlation),
        None => request_id,
    }
}

fn is_valid_request_id(id: &str) -> bool {
    if id.is_empty() || id.len() > MAX_ID_LEN {
        return false;
    }

    id.chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_id_new_is_uuid() {
        let id = RequestId::new();
        assert!(Uuid::parse_str(&id.id).is_ok());
        assert!(id.correlation_id.is_none());
        assert_ne!(RequestId::new().id, id.id);
    }

    #[test]
    fn test_correlation_falls_back_to_id() {
        let id = RequestId::with_id("req-1");
        assert_eq!(id.correlation(), "req-1");
        let id = id.with_correlation("corr-9");
        assert_eq!(id.correlation(), "corr-9");
        assert_eq!(id.to_string(), "req-1");
    }

    #[test]
    fn test_is_valid_request_id() {
        assert!(is_valid_request_id("abc-123"));
        assert!(is_valid_request_id("test_id.v1"));
        assert!(is_valid_request_id("12345678-1234-1234-1234-123456789012"));

        assert!(!is_valid_request_id(""));
        assert!(!is_valid_request_id("id with space"));
        assert!(!is_valid_request_id("id<script>"));
        assert!(!is_valid_request_id(&"a".repeat(200)));
    }

    #[test]
    fn test_resolve_keeps_valid_inbound_ids() {
        let request = Request::builder()
            .header(REQUEST_ID_HEADER, "client-42")
            .header(CORRELATION_ID_HEADER, "trace-7")
            .body(Body::empty())
            .unwrap();
        let id = resolve_request_id(&request);
        assert_eq!(id.id, "client-42");
        assert_eq!(id.correlation_id.as_deref(), Some("trace-7"));
    }

    #[test]
    fn test_resolve_replaces_malformed_inbound_id() {
        let request = Request::builder()
            .header(REQUEST_ID_HEADER, "bad id!")
            .body(Body::empty())
            .unwrap();
        let id = resolve_request_id(&request);
        assert_ne!(id.id, "bad id!");
        assert!(Uuid::parse_str(&id.id).is_ok());
    }
}
