use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::debug;

use super::{error::AuthError, utils::extract_token};
use crate::core::shared::state::AppState;
use crate::security::error_sanitizer::CallerId;

/// Resolves the caller for every non-public path and attaches an
/// `AuthenticatedUser` to the request. Fails closed with 401.
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AuthError> {
    let path = request.uri().path().to_string();

    if state.auth_config.is_public_path(&path) {
        return Ok(next.run(request).await);
    }

    let Some(token) = extract_token(&request, &state.auth_config) else {
        debug!("No credential on {}", path);
        return Err(AuthError::MissingToken);
    };

    let user = state.auth.authenticate(&token).await?;
    let caller = CallerId(user.user_id);
    request.extensions_mut().insert(user);

    let mut response = next.run(request).await;
    response.extensions_mut().insert(caller);
    Ok(response)
}
