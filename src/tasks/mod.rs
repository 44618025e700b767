//! Kanban tasks: board listing, creation, tracked updates and change history.

pub mod history;
pub mod task_api;
pub mod types;

use axum::{routing::get, Router};
use std::sync::Arc;

use crate::core::shared::state::AppState;
use crate::core::urls::ApiUrls;

pub use task_api::{TaskEngine, TaskError};
pub use types::KanbanColumns;

pub fn configure_task_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            ApiUrls::PROJECT_TASKS,
            get(task_api::handle_task_board).post(task_api::handle_task_create),
        )
        .route(
            ApiUrls::TASK_BY_ID,
            get(task_api::handle_task_get).patch(task_api::handle_task_update),
        )
        .route(ApiUrls::TASK_HISTORY, get(task_api::handle_task_history))
}
