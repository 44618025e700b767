use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

use crate::core::shared::api_error::ApiError;
use crate::core::shared::models::{NewProject, Project, Role};
use crate::security::auth_api::AuthenticatedUser;
use crate::security::validation::{collapse_whitespace, validate_length, ValidationError};
use crate::security::{AccessError, AccessGate};
use crate::store::{Store, StoreError};

pub const MIN_PROJECT_NAME_LEN: usize = 3;
pub const MAX_PROJECT_NAME_LEN: usize = 120;

const PROJECT_CREATORS: [Role; 2] = [Role::ProjectManager, Role::Administrator];

/// Length is checked on the trimmed input; whitespace runs are collapsed afterwards.
pub fn normalize_project_name(raw: &str) -> Result<String, ValidationError> {
    let trimmed = raw.trim();
    validate_length(
        trimmed,
        "name",
        Some(MIN_PROJECT_NAME_LEN),
        Some(MAX_PROJECT_NAME_LEN),
    )?;
    Ok(collapse_whitespace(trimmed))
}

#[derive(Debug, thiserror::Error)]
pub enum ProjectError {
    #[error(transparent)]
    Access(#[from] AccessError),
    #[error("Failed to create project: {0}")]
    CreateFailed(#[source] StoreError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<ProjectError> for ApiError {
    fn from(error: ProjectError) -> Self {
        match error {
            ProjectError::Access(e) => e.into(),
            ProjectError::CreateFailed(_) => ApiError::Internal(error.to_string()),
            ProjectError::Store(e) => e.into(),
        }
    }
}

#[derive(Clone)]
pub struct ProjectService {
    store: Arc<dyn Store>,
    access: AccessGate,
}

impl ProjectService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            access: AccessGate::new(store.clone()),
            store,
        }
    }

    /// Creates the project with the caller as owner and first member.
    /// `name` must already be normalized.
    pub async fn create(
        &self,
        caller: &AuthenticatedUser,
        name: String,
    ) -> Result<Project, ProjectError> {
        let owner = self
            .access
            .require_role_any(caller.user_id, &PROJECT_CREATORS)
            .await?;

        let project = self
            .store
            .create_project_with_owner(NewProject {
                name,
                owner_id: owner.id,
            })
            .await
            .map_err(|e| {
                error!(user_id = %owner.id, error = %e, "Project creation failed");
                ProjectError::CreateFailed(e)
            })?;

        info!(project_id = %project.id, owner_id = %owner.id, "Project created");
        Ok(project)
    }

    pub async fn get(
        &self,
        caller: &AuthenticatedUser,
        project_id: Uuid,
    ) -> Result<Project, ProjectError> {
        Ok(self.access.member_project(caller, project_id).await?)
    }

    /// Projects the caller belongs to, newest first.
    pub async fn list_for_member(&self, user_id: Uuid) -> Result<Vec<Project>, ProjectError> {
        Ok(self.store.list_projects_for_member(user_id).await?)
    }

    pub async fn is_member(&self, project_id: Uuid, user_id: Uuid) -> Result<bool, ProjectError> {
        Ok(self.access.is_member(project_id, user_id).await?)
    }
}
