use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use super::{CreateMilestoneRequest, UpdateMilestoneRequest};
use crate::core::shared::api_error::{parse_path_id, ApiError, ApiJson};
use crate::core::shared::models::Milestone;
use crate::core::shared::state::AppState;
use crate::security::auth_api::AuthenticatedUser;

pub async fn handle_list_milestones(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(raw_id): Path<String>,
) -> Result<Json<Vec<Milestone>>, ApiError> {
    let project_id = parse_path_id(&raw_id, "project")?;
    Ok(Json(state.milestones.list(&user, project_id).await?))
}

pub async fn handle_create_milestone(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(raw_id): Path<String>,
    body: Result<ApiJson<CreateMilestoneRequest>, ApiError>,
) -> Result<(StatusCode, Json<Milestone>), ApiError> {
    let project_id = parse_path_id(&raw_id, "project")?;
    let project = state.milestones.authorize_create(&user, project_id).await?;

    let ApiJson(payload) = body?;
    let milestone = payload.into_new_milestone(project.id)?;

    let created = state.milestones.create(milestone).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn handle_get_milestone(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(raw_id): Path<String>,
) -> Result<Json<Milestone>, ApiError> {
    let id = parse_path_id(&raw_id, "milestone")?;
    Ok(Json(state.milestones.get(&user, id).await?))
}

pub async fn handle_update_milestone(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(raw_id): Path<String>,
    body: Result<ApiJson<UpdateMilestoneRequest>, ApiError>,
) -> Result<Json<Milestone>, ApiError> {
    let id = parse_path_id(&raw_id, "milestone")?;
    let milestone = state.milestones.authorize_write(&user, id).await?;

    let ApiJson(payload) = body?;
    let changes = payload.into_changes()?;

    Ok(Json(state.milestones.update(&milestone, &changes).await?))
}

pub async fn handle_delete_milestone(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(raw_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_path_id(&raw_id, "milestone")?;
    state.milestones.delete(&user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
