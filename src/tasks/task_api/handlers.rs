//! HTTP handlers for task API
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use crate::core::shared::api_error::{parse_path_id, ApiError, ApiJson, ApiQuery};
use crate::core::shared::models::{Task, TaskHistoryEntry};
use crate::core::shared::state::AppState;
use crate::security::auth_api::AuthenticatedUser;
use crate::tasks::types::{CreateTaskRequest, KanbanColumns, TaskListQuery, UpdateTaskRequest};

/// Query is validated before access is checked.
pub async fn handle_task_board(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(raw_id): Path<String>,
    ApiQuery(query): ApiQuery<TaskListQuery>,
) -> Result<Json<KanbanColumns>, ApiError> {
    let project_id = parse_path_id(&raw_id, "project")?;
    let filter = query
        .into_filter()
        .map_err(|_| ApiError::BadRequest("Invalid query parameters".to_string()))?;

    let project = state.task_engine.authorize_project(&user, project_id).await?;
    Ok(Json(state.task_engine.board(&project, filter).await?))
}

pub async fn handle_task_create(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(raw_id): Path<String>,
    body: Result<ApiJson<CreateTaskRequest>, ApiError>,
) -> Result<(StatusCode, Json<Task>), ApiError> {
    let project_id = parse_path_id(&raw_id, "project")?;
    let project = state.task_engine.authorize_project(&user, project_id).await?;

    let ApiJson(payload) = body?;
    let task = payload.into_new_task(project.id)?;

    let created = state.task_engine.create_task(task).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn handle_task_get(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(raw_id): Path<String>,
) -> Result<Json<Task>, ApiError> {
    let task_id = parse_path_id(&raw_id, "task")?;
    Ok(Json(state.task_engine.authorize_task(&user, task_id).await?))
}

pub async fn handle_task_update(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(raw_id): Path<String>,
    body: Result<ApiJson<UpdateTaskRequest>, ApiError>,
) -> Result<Json<Task>, ApiError> {
    let task_id = parse_path_id(&raw_id, "task")?;
    let task = state.task_engine.authorize_task(&user, task_id).await?;

    let ApiJson(payload) = body?;
    let changes = payload.into_changes()?;

    Ok(Json(
        state.task_engine.update_task(&user, &task, &changes).await?,
    ))
}

pub async fn handle_task_history(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(raw_id): Path<String>,
) -> Result<Json<Vec<TaskHistoryEntry>>, ApiError> {
    let task_id = parse_path_id(&raw_id, "task")?;
    let task = state.task_engine.authorize_task(&user, task_id).await?;
    Ok(Json(state.task_engine.history(&task).await?))
}
