use axum::http::{header, HeaderName, HeaderValue, Method};
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use super::request_id::REQUEST_ID_HEADER;

#[derive(Debug, Clone)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
    pub allowed_methods: Vec<Method>,
    pub allowed_headers: Vec<HeaderName>,
    pub exposed_headers: Vec<HeaderName>,
    pub max_age_secs: u64,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec![],
            allowed_methods: vec![
                Method::GET,
                Method::POST,
                Method::PATCH,
                Method::DELETE,
                Method::OPTIONS,
            ],
            allowed_headers: vec![
                header::CONTENT_TYPE,
                header::AUTHORIZATION,
                HeaderName::from_static(REQUEST_ID_HEADER),
            ],
            exposed_headers: vec![HeaderName::from_static(REQUEST_ID_HEADER), header::LOCATION],
            max_age_secs: 3600,
        }
    }
}

impl CorsConfig {
    pub fn with_origins(origins: &[String]) -> Self {
        Self {
            allowed_origins: origins
                .iter()
                .map(|o| o.trim().to_string())
                .filter(|o| !o.is_empty())
                .collect(),
            ..Self::default()
        }
    }

    /// Explicit origins get credentialed CORS; none configured means any
    /// origin, without cookies.
    pub fn build(self) -> CorsLayer {
        let cors = CorsLayer::new()
            .allow_methods(self.allowed_methods)
            .allow_headers(self.allowed_headers)
            .expose_headers(self.exposed_headers)
            .max_age(std::time::Duration::from_secs(self.max_age_secs));

        let origins: Vec<HeaderValue> = self
            .allowed_origins
            .iter()
            .filter_map(|o| match o.parse() {
                Ok(value) => Some(value),
                Err(_) => {
                    warn!("Ignoring invalid CORS origin {o}");
                    None
                }
            })
            .collect();

        if origins.is_empty() {
            cors.allow_origin(Any)
        } else {
            info!("CORS configured with {} allowed origins", origins.len());
            cors.allow_origin(origins).allow_credentials(true)
        }
    }
}

pub fn create_cors_layer(origins: &[String]) -> CorsLayer {
    CorsConfig::with_origins(origins).build()
}
