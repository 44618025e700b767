//! HTTP server initialization and routing

use axum::{middleware, Router};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::auth::configure_auth_routes;
use crate::core::shared::state::AppState;
use crate::milestones::configure_milestone_routes;
use crate::project::configure_project_routes;
use crate::security::{
    api_error_logging_middleware, auth_middleware, create_cors_layer, request_id_middleware,
};
use crate::tasks::configure_task_routes;
use crate::users::configure_user_routes;

use super::{configure_health_routes, shutdown_signal};

/// Full application router.
///
/// Layers run outermost first: tracing, CORS, request id, api error logging,
/// then authentication. Error responses produced by the auth layer are
/// therefore logged and carry the request id.
pub fn build_router(app_state: Arc<AppState>) -> Router {
    let cors = create_cors_layer(&app_state.config.server.cors_origins);

    Router::new()
        .merge(configure_health_routes())
        .merge(configure_auth_routes())
        .merge(configure_user_routes())
        .merge(configure_project_routes())
        .merge(configure_milestone_routes())
        .merge(configure_task_routes())
        .layer(middleware::from_fn_with_state(
            app_state.clone(),
            auth_middleware,
        ))
        .layer(middleware::from_fn(api_error_logging_middleware))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

pub async fn run_axum_server(app_state: Arc<AppState>) -> std::io::Result<()> {
    let addr = app_state.config.bind_address();
    let app = build_router(app_state);

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            error!("Failed to bind to {}: {} - is another instance running?", addr, e);
            return Err(e);
        }
    };
    info!("HTTP server listening on {}", addr);
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(std::io::Error::other)
}
