//! User directory and administrator role management.

use axum::{
    extract::{Path, State},
    routing::{get, patch},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::core::shared::api_error::{parse_path_id, ApiError, ApiJson};
use crate::core::shared::models::{Role, User};
use crate::core::shared::state::AppState;
use crate::core::urls::ApiUrls;
use crate::security::auth_api::{AuthenticatedUser, Permission};
use crate::security::validation::ValidationError;
use crate::store::StoreError;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserDto {
    pub id: Uuid,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub avatar_url: Option<String>,
    pub role: Role,
}

impl From<User> for UserDto {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            first_name: user.first_name,
            last_name: user.last_name,
            avatar_url: user.avatar_url,
            role: user.role,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateRoleRequest {
    pub role: String,
}

#[derive(Debug, thiserror::Error)]
pub enum UserError {
    #[error("User not found")]
    NotFound,
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<UserError> for ApiError {
    fn from(error: UserError) -> Self {
        match error {
            UserError::NotFound => ApiError::NotFound(error.to_string()),
            UserError::Store(e) => e.into(),
        }
    }
}

pub async fn handle_list_users(
    State(state): State<Arc<AppState>>,
    _user: AuthenticatedUser,
) -> Result<Json<Vec<UserDto>>, ApiError> {
    let users = state.store.list_users().await?;
    Ok(Json(users.into_iter().map(UserDto::from).collect()))
}

pub async fn handle_update_role(
    State(state): State<Arc<AppState>>,
    caller: AuthenticatedUser,
    Path(raw_id): Path<String>,
    ApiJson(payload): ApiJson<UpdateRoleRequest>,
) -> Result<Json<UserDto>, ApiError> {
    caller.require_permission(Permission::ManageUsers)?;
    let user_id = parse_path_id(&raw_id, "user")?;

    let role: Role = payload.role.parse().map_err(|_| ValidationError::InvalidValue {
        field: "role".to_string(),
        message: "must be one of administrator, project_manager, team_member".to_string(),
    })?;

    let updated = match state.store.update_user_role(user_id, role).await {
        Ok(user) => user,
        Err(StoreError::NotFound) => return Err(UserError::NotFound.into()),
        Err(e) => return Err(UserError::Store(e).into()),
    };

    info!(admin_id = %caller.user_id, %user_id, %role, "User role changed");
    Ok(Json(updated.into()))
}

pub fn configure_user_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(ApiUrls::USERS, get(handle_list_users))
        .route(ApiUrls::USER_ROLE, patch(handle_update_role))
}
