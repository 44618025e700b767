use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use super::service::normalize_project_name;
use super::{AddMemberRequest, CreateProjectRequest, ProjectDto};
use crate::core::shared::api_error::{parse_path_id, ApiError, ApiJson};
use crate::core::shared::models::{MemberProfile, ProjectMember};
use crate::core::shared::state::AppState;
use crate::core::urls::ApiUrls;
use crate::security::auth_api::AuthenticatedUser;
use crate::security::validation::{parse_uuid, ValidationError};

fn parse_member_path(raw_project: &str, raw_user: &str) -> Result<(Uuid, Uuid), ApiError> {
    match (Uuid::parse_str(raw_project), Uuid::parse_str(raw_user)) {
        (Ok(project_id), Ok(user_id)) => Ok((project_id, user_id)),
        _ => Err(ApiError::BadRequest("Invalid project or user ID".to_string())),
    }
}

pub async fn handle_create_project(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    ApiJson(payload): ApiJson<CreateProjectRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let name = payload
        .name
        .ok_or_else(|| ValidationError::Required("name".to_string()))?;
    let name = normalize_project_name(&name)?;

    let project = state.projects.create(&user, name).await?;

    let mut headers = HeaderMap::new();
    if let Ok(location) = HeaderValue::from_str(&ApiUrls::project_location(project.id)) {
        headers.insert(header::LOCATION, location);
    }
    Ok((StatusCode::CREATED, headers, Json(ProjectDto::from(project))))
}

pub async fn handle_list_projects(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
) -> Result<Json<Vec<ProjectDto>>, ApiError> {
    let projects = state.projects.list_for_member(user.user_id).await?;
    Ok(Json(projects.into_iter().map(ProjectDto::from).collect()))
}

pub async fn handle_get_project(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(raw_id): Path<String>,
) -> Result<Json<ProjectDto>, ApiError> {
    let project_id = parse_path_id(&raw_id, "project")?;
    let project = state.projects.get(&user, project_id).await?;
    Ok(Json(project.into()))
}

pub async fn handle_list_members(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(raw_id): Path<String>,
) -> Result<Json<Vec<MemberProfile>>, ApiError> {
    let project_id = parse_path_id(&raw_id, "project")?;
    Ok(Json(state.members.list(&user, project_id).await?))
}

pub async fn handle_add_member(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path(raw_id): Path<String>,
    body: Result<ApiJson<AddMemberRequest>, ApiError>,
) -> Result<(StatusCode, Json<ProjectMember>), ApiError> {
    let project_id = parse_path_id(&raw_id, "project")?;
    let project = state.members.authorize_manage(&user, project_id).await?;

    let ApiJson(payload) = body?;
    let raw_user = payload
        .user_id
        .ok_or_else(|| ValidationError::Required("user_id".to_string()))?;
    let member_id = parse_uuid(&raw_user, "user_id")?;

    let member = state.members.add(&project, member_id).await?;
    Ok((StatusCode::CREATED, Json(member)))
}

pub async fn handle_remove_member(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Path((raw_project, raw_user)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    let (project_id, member_id) = parse_member_path(&raw_project, &raw_user)?;
    state.members.remove(&user, project_id, member_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
