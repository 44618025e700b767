use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::core::shared::api_error::ApiError;
use crate::core::shared::models::{Milestone, MilestoneChanges, NewMilestone, Project};
use crate::security::auth_api::AuthenticatedUser;
use crate::security::{AccessError, AccessGate};
use crate::store::{Store, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum MilestoneError {
    #[error("Milestone not found")]
    NotFound,
    #[error("Milestone with this name already exists in the project")]
    AlreadyExists,
    #[error(
        "Cannot delete milestone with {0} assigned task(s). Please reassign or delete the tasks first."
    )]
    HasTasks(i64),
    #[error(transparent)]
    Access(#[from] AccessError),
    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for MilestoneError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::NotFound => Self::NotFound,
            e if e.is_unique_violation() => Self::AlreadyExists,
            e => Self::Store(e),
        }
    }
}

impl From<MilestoneError> for ApiError {
    fn from(error: MilestoneError) -> Self {
        match error {
            MilestoneError::NotFound => ApiError::NotFound(error.to_string()),
            MilestoneError::AlreadyExists | MilestoneError::HasTasks(_) => {
                ApiError::Conflict(error.to_string())
            }
            MilestoneError::Access(e) => e.into(),
            MilestoneError::Store(e) => e.into(),
        }
    }
}

#[derive(Clone)]
pub struct MilestoneService {
    store: Arc<dyn Store>,
    access: AccessGate,
}

impl MilestoneService {
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
    ) -> Result<Vec<Milestone>, MilestoneError> {
        self.access.member_project(caller, project_id).await?;
        Ok(self.store.list_milestones(project_id).await?)
    }

    pub async fn authorize_create(
        &self,
        caller: &AuthenticatedUser,
        project_id: Uuid,
    ) -> Result<Project, MilestoneError> {
        Ok(self.access.managed_project(caller, project_id).await?)
    }

    pub async fn create(&self, milestone: NewMilestone) -> Result<Milestone, MilestoneError> {
        let created = self.store.insert_milestone(milestone).await?;
        info!(milestone_id = %created.id, project_id = %created.project_id, "Milestone created");
        Ok(created)
    }

    pub async fn get(
        &self,
        caller: &AuthenticatedUser,
        id: Uuid,
    ) -> Result<Milestone, MilestoneError> {
        let milestone = self.find(id).await?;
        self.access.require_member(caller, milestone.project_id).await?;
        Ok(milestone)
    }

    /// Loads the milestone and checks write access to its project.
    pub async fn authorize_write(
        &self,
        caller: &AuthenticatedUser,
        id: Uuid,
    ) -> Result<Milestone, MilestoneError> {
        let milestone = self.find(id).await?;
        self.access.require_manager(caller, milestone.project_id).await?;
        Ok(milestone)
    }

    pub async fn update(
        &self,
        milestone: &Milestone,
        changes: &MilestoneChanges,
    ) -> Result<Milestone, MilestoneError> {
        Ok(self.store.update_milestone(milestone.id, changes).await?)
    }

    pub async fn delete(&self, caller: &AuthenticatedUser, id: Uuid) -> Result<(), MilestoneError> {
        let milestone = self.authorize_write(caller, id).await?;

        let task_count = self.store.count_tasks_for_milestone(id).await?;
        if task_count > 0 {
            return Err(MilestoneError::HasTasks(task_count));
        }

        self.store.delete_milestone(id).await?;
        info!(milestone_id = %id, project_id = %milestone.project_id, "Milestone deleted");
        Ok(())
    }

    async fn find(&self, id: Uuid) -> Result<Milestone, MilestoneError> {
        self.store
            .get_milestone(id)
            .await?
            .ok_or(MilestoneError::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::shared::models::{NewProject, NewTask, Role};
    use crate::store::MemoryStore;

    struct Fixture {
        store: Arc<MemoryStore>,
        service: MilestoneService,
        manager: AuthenticatedUser,
        project: Project,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let owner = store.seed_user("Pat", "Manager", Role::ProjectManager).await;
        let project = store
            .create_project_with_owner(NewProject {
                name: "Release".into(),
                owner_id: owner,
            })
            .await
            .unwrap();
        Fixture {
            service: MilestoneService::new(store.clone()),
            store,
            manager: AuthenticatedUser::new(owner, Role::ProjectManager),
            project,
        }
    }

    fn named(project_id: Uuid, name: &str) -> NewMilestone {
        NewMilestone {
            project_id,
            name: name.to_string(),
            description: None,
            due_date: None,
        }
    }

    #[tokio::test]
    async fn test_duplicate_name_is_domain_error() {
        let f = fixture().await;
        f.service.create(named(f.project.id, "Beta")).await.unwrap();

        let err = f.service.create(named(f.project.id, "Beta")).await.unwrap_err();
        assert!(matches!(err, MilestoneError::AlreadyExists));
        let api: ApiError = err.into();
        assert_eq!(api.status_code(), axum::http::StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_rename_onto_existing_name_conflicts() {
        let f = fixture().await;
        f.service.create(named(f.project.id, "Alpha")).await.unwrap();
        let beta = f.service.create(named(f.project.id, "Beta")).await.unwrap();

        let changes = MilestoneChanges {
            name: Some("Alpha".into()),
            ..Default::default()
        };
        assert!(matches!(
            f.service.update(&beta, &changes).await,
            Err(MilestoneError::AlreadyExists)
        ));
    }

    #[tokio::test]
    async fn test_delete_guard_counts_tasks() {
        let f = fixture().await;
        let milestone = f.service.create(named(f.project.id, "Beta")).await.unwrap();
        for title in ["one", "two"] {
            f.store
                .insert_task(NewTask {
                    project_id: f.project.id,
                    title: title.into(),
                    milestone_id: Some(milestone.id),
                    ..Default::default()
                })
                .await
                .unwrap();
        }

        let err = f.service.delete(&f.manager, milestone.id).await.unwrap_err();
        assert!(matches!(err, MilestoneError::HasTasks(2)));
        assert_eq!(
            err.to_string(),
            "Cannot delete milestone with 2 assigned task(s). Please reassign or delete the tasks first."
        );
        assert!(f.store.get_milestone(milestone.id).await.unwrap().is_some());

        let empty = f.service.create(named(f.project.id, "Gamma")).await.unwrap();
        f.service.delete(&f.manager, empty.id).await.unwrap();
        assert!(f.store.get_milestone(empty.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_team_member_cannot_write() {
        let f = fixture().await;
        let milestone = f.service.create(named(f.project.id, "Beta")).await.unwrap();
        let member = f.store.seed_user("Tim", "Member", Role::TeamMember).await;
        f.store.add_member(f.project.id, member).await.unwrap();
        let member = AuthenticatedUser::new(member, Role::TeamMember);

        assert!(f.service.get(&member, milestone.id).await.is_ok());
        assert!(matches!(
            f.service.authorize_write(&member, milestone.id).await,
            Err(MilestoneError::Access(AccessError::Denied))
        ));
        assert!(matches!(
            f.service.get(&member, Uuid::new_v4()).await,
            Err(MilestoneError::NotFound)
        ));
    }
}
