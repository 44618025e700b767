//! Per-project read/write gate.
//!
//! Read access to anything scoped to a project requires membership. Write
//! access to milestones and members requires the administrator role, or the
//! project_manager role together with membership.
//!
//! Project-scoped lookups check access before existence, so a non-member
//! cannot probe which project ids exist.

use std::sync::Arc;
use uuid::Uuid;

use super::auth_api::{AuthenticatedUser, Role};
use crate::core::shared::api_error::ApiError;
use crate::core::shared::models::{Project, User};
use crate::store::{Store, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum AccessError {
    #[error("Access denied")]
    Denied,
    #[error("Project not found")]
    ProjectNotFound,
    #[error("User not found")]
    UnknownUser,
    #[error("Insufficient role")]
    InsufficientRole,
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<AccessError> for ApiError {
    fn from(error: AccessError) -> Self {
        match error {
            AccessError::Denied => ApiError::access_denied(),
            AccessError::ProjectNotFound => ApiError::NotFound(error.to_string()),
            AccessError::UnknownUser | AccessError::InsufficientRole => {
                ApiError::Forbidden(error.to_string())
            }
            AccessError::Store(e) => ApiError::Internal(e.to_string()),
        }
    }
}

#[derive(Clone)]
pub struct AccessGate {
    store: Arc<dyn Store>,
}

impl AccessGate {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn is_member(&self, project_id: Uuid, user_id: Uuid) -> Result<bool, StoreError> {
        self.store.is_member(project_id, user_id).await
    }

    pub async fn is_project_manager(
        &self,
        user: &AuthenticatedUser,
        project_id: Uuid,
    ) -> Result<bool, StoreError> {
        match user.role {
            Role::Administrator => Ok(true),
            Role::ProjectManager => self.is_member(project_id, user.user_id).await,
            Role::TeamMember => Ok(false),
        }
    }

    pub async fn require_member(
        &self,
        user: &AuthenticatedUser,
        project_id: Uuid,
    ) -> Result<(), AccessError> {
        if self.is_member(project_id, user.user_id).await? {
            Ok(())
        } else {
            Err(AccessError::Denied)
        }
    }

    pub async fn require_manager(
        &self,
        user: &AuthenticatedUser,
        project_id: Uuid,
    ) -> Result<(), AccessError> {
        if self.is_project_manager(user, project_id).await? {
            Ok(())
        } else {
            Err(AccessError::Denied)
        }
    }

    /// Role check against the stored user row, not the session snapshot.
    pub async fn require_role_any(&self, user_id: Uuid, roles: &[Role]) -> Result<User, AccessError> {
        let user = self
            .store
            .get_user(user_id)
            .await?
            .ok_or(AccessError::UnknownUser)?;

        if roles.contains(&user.role) {
            Ok(user)
        } else {
            Err(AccessError::InsufficientRole)
        }
    }

    /// Read access to a project: membership, then existence.
    pub async fn member_project(
        &self,
        user: &AuthenticatedUser,
        project_id: Uuid,
    ) -> Result<Project, AccessError> {
        self.require_member(user, project_id).await?;
        self.existing_project(project_id).await
    }

    /// Write access to a project's milestones and members.
    pub async fn managed_project(
        &self,
        user: &AuthenticatedUser,
        project_id: Uuid,
    ) -> Result<Project, AccessError> {
        self.require_manager(user, project_id).await?;
        self.existing_project(project_id).await
    }

    async fn existing_project(&self, project_id: Uuid) -> Result<Project, AccessError> {
        self.store
            .get_project(project_id)
            .await?
            .ok_or(AccessError::ProjectNotFound)
    }
}
