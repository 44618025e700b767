//! Projects and their membership.

use axum::{
    routing::{delete, get},
    Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::core::shared::models::Project;
use crate::core::shared::state::AppState;
use crate::core::urls::ApiUrls;

pub mod handlers;
pub mod members;
pub mod service;

pub use members::{MemberError, MemberService};
pub use service::{normalize_project_name, ProjectError, ProjectService};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectDto {
    pub id: Uuid,
    pub name: String,
    pub owner_id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl From<Project> for ProjectDto {
    fn from(project: Project) -> Self {
        Self {
            id: project.id,
            name: project.name,
            owner_id: project.owner_id,
            created_at: project.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateProjectRequest {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AddMemberRequest {
    #[serde(default)]
    pub user_id: Option<String>,
}

pub fn configure_project_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            ApiUrls::PROJECTS,
            get(handlers::handle_list_projects).post(handlers::handle_create_project),
        )
        .route(ApiUrls::PROJECT_BY_ID, get(handlers::handle_get_project))
        .route(
            ApiUrls::PROJECT_MEMBERS,
            get(handlers::handle_list_members).post(handlers::handle_add_member),
        )
        .route(ApiUrls::PROJECT_MEMBER, delete(handlers::handle_remove_member))
}
