use axum::body::Body;
use axum::http::{header, Request};

use super::config::AuthConfig;

pub fn extract_session_from_cookies(request: &Request<Body>, cookie_name: &str) -> Option<String> {
    request
        .headers()
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(|cookies| {
            cookies.split(';').find_map(|cookie| {
                let (name, value) = cookie.trim().split_once('=')?;

                if name == cookie_name && !value.is_empty() {
                    Some(value.to_string())
                } else {
                    None
                }
            })
        })
}

pub fn extract_bearer_token(request: &Request<Body>, config: &AuthConfig) -> Option<String> {
    request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix(config.bearer_prefix.as_str()))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

/// Bearer header wins over the session cookie.
pub fn extract_token(request: &Request<Body>, config: &AuthConfig) -> Option<String> {
    extract_bearer_token(request, config)
        .or_else(|| extract_session_from_cookies(request, &config.session_cookie_name))
}

fn cookie_attributes(config: &AuthConfig, max_age_secs: i64) -> String {
    let secure = if config.secure_cookie { "; Secure" } else { "" };
    format!("Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age_secs}{secure}")
}

pub fn session_cookie(config: &AuthConfig, token: &str, max_age_secs: i64) -> String {
    format!(
        "{}={}; {}",
        config.session_cookie_name,
        token,
        cookie_attributes(config, max_age_secs)
    )
}

pub fn clear_session_cookie(config: &AuthConfig) -> String {
    format!(
        "{}=; {}",
        config.session_cookie_name,
        cookie_attributes(config, 0)
    )
}
