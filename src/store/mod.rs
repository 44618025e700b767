//! Persistence seam. Services hold an `Arc<dyn Store>` and never see the
//! backend; `PgStore` is the production implementation and `MemoryStore`
//! backs local runs and the test-suite.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::error;
use uuid::Uuid;

use crate::core::shared::models::{
    Credentials, MemberProfile, Milestone, MilestoneChanges, NewAccount, NewHistoryEntry,
    NewMilestone, NewProject, NewTask, Project, ProjectMember, RecoveryToken, Role, Session, Task,
    TaskCard, TaskChanges, TaskFilter, TaskHistoryEntry, User,
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,
    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),
    #[error("foreign key constraint violated: {0}")]
    ForeignKeyViolation(String),
    /// The owner-membership step of project creation failed; the project row
    /// was rolled back.
    #[error("Failed to add project member: {0}")]
    MemberBootstrap(#[source] Box<StoreError>),
    #[error("connection pool error: {0}")]
    Pool(String),
    #[error("database error: {0}")]
    Database(String),
    #[error("corrupt row: {0}")]
    Corrupt(String),
}

impl StoreError {
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, Self::UniqueViolation(_))
    }
}

/// Display order for a task appended to the "To Do" column.
pub fn next_display_order(current_max: Option<i32>) -> i32 {
    current_max.map_or(1, |max| max.saturating_add(1))
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn ping(&self) -> Result<(), StoreError>;

    // Users and credentials
    async fn get_user(&self, id: Uuid) -> Result<Option<User>, StoreError>;
    async fn list_users(&self) -> Result<Vec<User>, StoreError>;
    async fn update_user_role(&self, id: Uuid, role: Role) -> Result<User, StoreError>;
    async fn create_account(&self, account: NewAccount) -> Result<User, StoreError>;
    async fn find_credentials_by_email(&self, email: &str)
        -> Result<Option<Credentials>, StoreError>;
    async fn find_credentials_by_user(&self, user_id: Uuid)
        -> Result<Option<Credentials>, StoreError>;
    async fn update_password_hash(&self, user_id: Uuid, password_hash: &str)
        -> Result<(), StoreError>;

    // Sessions and recovery tokens
    async fn create_session(
        &self,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> Result<Session, StoreError>;
    async fn get_session(&self, id: Uuid) -> Result<Option<Session>, StoreError>;
    async fn revoke_session(&self, id: Uuid) -> Result<(), StoreError>;
    /// Revokes every live session of the user except `keep`; returns how many.
    async fn revoke_user_sessions(&self, user_id: Uuid, keep: Option<Uuid>)
        -> Result<u64, StoreError>;
    async fn create_recovery_token(&self, token: RecoveryToken) -> Result<(), StoreError>;
    /// Marks an unused, unexpired token as used and returns its user.
    async fn consume_recovery_token(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Uuid>, StoreError>;

    // Projects
    async fn insert_project(&self, project: NewProject) -> Result<Project, StoreError>;
    async fn delete_project(&self, id: Uuid) -> Result<(), StoreError>;
    async fn get_project(&self, id: Uuid) -> Result<Option<Project>, StoreError>;
    async fn list_projects_for_member(&self, user_id: Uuid) -> Result<Vec<Project>, StoreError>;

    /// Inserts the project and its owner's membership as one unit.
    ///
    /// Backends without transactions get this default: when the membership
    /// insert fails the project row is deleted again before the error is
    /// returned as [`StoreError::MemberBootstrap`].
    async fn create_project_with_owner(&self, project: NewProject) -> Result<Project, StoreError> {
        let owner_id = project.owner_id;
        let created = self.insert_project(project).await?;

        if let Err(member_err) = self.add_member(created.id, owner_id).await {
            if let Err(cleanup_err) = self.delete_project(created.id).await {
                error!(
                    project_id = %created.id,
                    error = %cleanup_err,
                    "Compensating project delete failed"
                );
            }
            return Err(StoreError::MemberBootstrap(Box::new(member_err)));
        }

        Ok(created)
    }

    // Members
    async fn add_member(&self, project_id: Uuid, user_id: Uuid)
        -> Result<ProjectMember, StoreError>;
    /// Returns `false` when there was no such membership.
    async fn remove_member(&self, project_id: Uuid, user_id: Uuid) -> Result<bool, StoreError>;
    async fn is_member(&self, project_id: Uuid, user_id: Uuid) -> Result<bool, StoreError>;
    async fn list_members(&self, project_id: Uuid) -> Result<Vec<MemberProfile>, StoreError>;

    // Milestones
    /// Ordered by due date ascending, undated last.
    async fn list_milestones(&self, project_id: Uuid) -> Result<Vec<Milestone>, StoreError>;
    async fn insert_milestone(&self, milestone: NewMilestone) -> Result<Milestone, StoreError>;
    async fn get_milestone(&self, id: Uuid) -> Result<Option<Milestone>, StoreError>;
    async fn update_milestone(
        &self,
        id: Uuid,
        changes: &MilestoneChanges,
    ) -> Result<Milestone, StoreError>;
    async fn delete_milestone(&self, id: Uuid) -> Result<(), StoreError>;
    async fn count_tasks_for_milestone(&self, id: Uuid) -> Result<i64, StoreError>;

    // Tasks
    /// Cards of one project ordered by display order.
    async fn list_task_cards(
        &self,
        project_id: Uuid,
        filter: TaskFilter,
    ) -> Result<Vec<TaskCard>, StoreError>;
    /// Inserts with status "To Do" and the next display order of that column,
    /// computed atomically with the insert.
    async fn insert_task(&self, task: NewTask) -> Result<Task, StoreError>;
    async fn get_task(&self, id: Uuid) -> Result<Option<Task>, StoreError>;
    async fn count_open_subtasks(&self, parent_id: Uuid) -> Result<i64, StoreError>;
    async fn update_task(&self, id: Uuid, changes: &TaskChanges) -> Result<Task, StoreError>;
    async fn insert_history(&self, entries: Vec<NewHistoryEntry>) -> Result<(), StoreError>;
    /// Newest first.
    async fn list_history(&self, task_id: Uuid) -> Result<Vec<TaskHistoryEntry>, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_display_order() {
        assert_eq!(next_display_order(None), 1);
        assert_eq!(next_display_order(Some(0)), 1);
        assert_eq!(next_display_order(Some(7)), 8);
        assert_eq!(next_display_order(Some(i32::MAX)), i32::MAX);
    }

    #[test]
    fn test_member_bootstrap_message() {
        let err = StoreError::MemberBootstrap(Box::new(StoreError::ForeignKeyViolation(
            "project_members_user_id_fkey".into(),
        )));
        assert!(err.to_string().starts_with("Failed to add project member"));
        assert!(!err.is_unique_violation());
    }
}
