use axum::{extract::FromRequestParts, http::request::Parts};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

use super::error::AuthError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Permission {
    ReadProjects,
    WriteTasks,
    CreateProjects,
    ManageProjects,
    ManageUsers,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Administrator,
    ProjectManager,
    #[default]
    TeamMember,
}

impl Role {
    pub fn permissions(&self) -> HashSet<Permission> {
        match self {
            Self::TeamMember => {
                let mut perms = HashSet::new();
                perms.insert(Permission::ReadProjects);
                perms.insert(Permission::WriteTasks);
                perms
            }
            Self::ProjectManager => {
                let mut perms = Self::TeamMember.permissions();
                perms.insert(Permission::CreateProjects);
                perms.insert(Permission::ManageProjects);
                perms
            }
            Self::Administrator => {
                let mut perms = Self::ProjectManager.permissions();
                perms.insert(Permission::ManageUsers);
                perms
            }
        }
    }

    pub fn has_permission(&self, permission: &Permission) -> bool {
        self.permissions().contains(permission)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Administrator => "administrator",
            Self::ProjectManager => "project_manager",
            Self::TeamMember => "team_member",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownRole(pub String);

impl std::fmt::Display for UnknownRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown role '{}'", self.0)
    }
}

impl std::error::Error for UnknownRole {}

impl std::str::FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "administrator" => Ok(Self::Administrator),
            "project_manager" => Ok(Self::ProjectManager),
            "team_member" => Ok(Self::TeamMember),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

/// Caller resolved from a live session. Handlers take it as an extractor;
/// extraction fails with 401 when the auth middleware did not attach one.
#[derive(Debug, Clone, Serialize)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
    pub role: Role,
    pub session_id: Option<Uuid>,
}

impl AuthenticatedUser {
    pub fn new(user_id: Uuid, role: Role) -> Self {
        Self {
            user_id,
            role,
            session_id: None,
        }
    }

    pub fn with_session(mut self, session_id: Uuid) -> Self {
        self.session_id = Some(session_id);
        self
    }

    pub fn has_permission(&self, permission: &Permission) -> bool {
        self.role.has_permission(permission)
    }

    pub fn require_permission(&self, permission: Permission) -> Result<(), AuthError> {
        if self.has_permission(&permission) {
            Ok(())
        } else {
            Err(AuthError::InsufficientRole)
        }
    }
}

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or(AuthError::MissingToken)
    }
}
