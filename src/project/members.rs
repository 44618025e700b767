use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::core::shared::api_error::ApiError;
use crate::core::shared::models::{MemberProfile, Project, ProjectMember};
use crate::security::auth_api::AuthenticatedUser;
use crate::security::{AccessError, AccessGate};
use crate::store::{Store, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum MemberError {
    #[error(transparent)]
    Access(#[from] AccessError),
    #[error("User not found")]
    UserNotFound,
    #[error("Membership not found")]
    MembershipNotFound,
    #[error("User is already a member of this project")]
    AlreadyMember,
    #[error("Cannot remove the project owner")]
    OwnerRemoval,
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<MemberError> for ApiError {
    fn from(error: MemberError) -> Self {
        match error {
            MemberError::Access(e) => e.into(),
            MemberError::UserNotFound | MemberError::MembershipNotFound => {
                ApiError::NotFound(error.to_string())
            }
            MemberError::AlreadyMember | MemberError::OwnerRemoval => {
                ApiError::Conflict(error.to_string())
            }
            MemberError::Store(e) => e.into(),
        }
    }
}

#[derive(Clone)]
pub struct MemberService {
    store: Arc<dyn Store>,
    access: AccessGate,
}

impl MemberService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            access: AccessGate::new(store.clone()),
            store,
        }
    }

    pub async fn list(
        &self,
        caller: &AuthenticatedUser,
        project_id: Uuid,
    ) -> Result<Vec<MemberProfile>, MemberError> {
        self.access.member_project(caller, project_id).await?;
        Ok(self.store.list_members(project_id).await?)
    }

    /// Manager check then project existence; run before the body is read.
    pub async fn authorize_manage(
        &self,
        caller: &AuthenticatedUser,
        project_id: Uuid,
    ) -> Result<Project, MemberError> {
        Ok(self.access.managed_project(caller, project_id).await?)
    }

    pub async fn add(
        &self,
        project: &Project,
        user_id: Uuid,
    ) -> Result<ProjectMember, MemberError> {
        if self.store.get_user(user_id).await?.is_none() {
            return Err(MemberError::UserNotFound);
        }

        match self.store.add_member(project.id, user_id).await {
            Ok(member) => {
                info!(project_id = %project.id, %user_id, "Member added");
                Ok(member)
            }
            Err(StoreError::UniqueViolation(_)) => Err(MemberError::AlreadyMember),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn remove(
        &self,
        caller: &AuthenticatedUser,
        project_id: Uuid,
        user_id: Uuid,
    ) -> Result<(), MemberError> {
        let project = self.authorize_manage(caller, project_id).await?;

        if self.store.get_user(user_id).await?.is_none() {
            return Err(MemberError::UserNotFound);
        }
        if !self.store.is_member(project_id, user_id).await? {
            return Err(MemberError::MembershipNotFound);
        }
        if project.owner_id == user_id {
            return Err(MemberError::OwnerRemoval);
        }

        self.store.remove_member(project_id, user_id).await?;
        info!(%project_id, %user_id, removed_by = %caller.user_id, "Member removed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::shared::models::{NewProject, Role};
    use crate::store::MemoryStore;

    async fn setup() -> (Arc<MemoryStore>, MemberService, AuthenticatedUser, Project) {
        let store = Arc::new(MemoryStore::new());
        let owner = store.seed_user("Olive", "Owner", Role::ProjectManager).await;
        let project = store
            .create_project_with_owner(NewProject {
                name: "Members".into(),
                owner_id: owner,
            })
            .await
            .unwrap();
        let service = MemberService::new(store.clone());
        (
            store,
            service,
            AuthenticatedUser::new(owner, Role::ProjectManager),
            project,
        )
    }

    #[tokio::test]
    async fn test_add_and_duplicate() {
        let (store, service, owner, project) = setup().await;
        let user = store.seed_user("Tim", "Member", Role::TeamMember).await;

        let project = service.authorize_manage(&owner, project.id).await.unwrap();
        service.add(&project, user).await.unwrap();
        assert!(matches!(
            service.add(&project, user).await,
            Err(MemberError::AlreadyMember)
        ));
        assert!(matches!(
            service.add(&project, Uuid::new_v4()).await,
            Err(MemberError::UserNotFound)
        ));
        assert_eq!(service.list(&owner, project.id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_owner_cannot_be_removed() {
        let (_, service, owner, project) = setup().await;
        assert!(matches!(
            service.remove(&owner, project.id, owner.user_id).await,
            Err(MemberError::OwnerRemoval)
        ));
    }

    #[tokio::test]
    async fn test_remove_non_member() {
        let (store, service, owner, project) = setup().await;
        let stranger = store.seed_user("Sam", "Stranger", Role::TeamMember).await;
        assert!(matches!(
            service.remove(&owner, project.id, stranger).await,
            Err(MemberError::MembershipNotFound)
        ));

        store.add_member(project.id, stranger).await.unwrap();
        service.remove(&owner, project.id, stranger).await.unwrap();
        assert!(!store.is_member(project.id, stranger).await.unwrap());
    }
}
