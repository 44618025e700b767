//! Task engine - Kanban listing, creation and tracked updates
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

use crate::core::shared::api_error::ApiError;
use crate::core::shared::models::{
    NewTask, Project, Task, TaskChanges, TaskFilter, TaskHistoryEntry, TaskStatus,
};
use crate::security::auth_api::AuthenticatedUser;
use crate::security::{AccessError, AccessGate};
use crate::store::{Store, StoreError};
use crate::tasks::history::diff_tasks;
use crate::tasks::types::KanbanColumns;

#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    #[error("Task not found")]
    NotFound,
    #[error("Cannot mark parent task as Done while subtasks are incomplete")]
    OpenSubtasks,
    #[error("{0}")]
    InvalidReference(String),
    #[error(transparent)]
    Access(#[from] AccessError),
    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for TaskError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::NotFound => Self::NotFound,
            StoreError::ForeignKeyViolation(constraint) => {
                Self::InvalidReference(reference_message(&constraint).to_string())
            }
            e => Self::Store(e),
        }
    }
}

impl From<TaskError> for ApiError {
    fn from(error: TaskError) -> Self {
        match error {
            TaskError::NotFound => ApiError::NotFound(error.to_string()),
            TaskError::OpenSubtasks => ApiError::Conflict(error.to_string()),
            TaskError::InvalidReference(message) => ApiError::BadRequest(message),
            TaskError::Access(e) => e.into(),
            TaskError::Store(e) => e.into(),
        }
    }
}

fn reference_message(constraint: &str) -> &'static str {
    if constraint.contains("assignee") {
        "Assignee not found"
    } else if constraint.contains("milestone") {
        "Milestone not found"
    } else if constraint.contains("parent") {
        "Parent task not found"
    } else {
        "Referenced record not found"
    }
}

#[derive(Clone)]
pub struct TaskEngine {
    store: Arc<dyn Store>,
    access: AccessGate,
}

impl std::fmt::Debug for TaskEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskEngine").finish_non_exhaustive()
    }
}

impl TaskEngine {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            access: AccessGate::new(store.clone()),
            store,
        }
    }

    /// Read access to the project's board.
    pub async fn authorize_project(
        &self,
        caller: &AuthenticatedUser,
        project_id: Uuid,
    ) -> Result<Project, TaskError> {
        Ok(self.access.member_project(caller, project_id).await?)
    }

    pub async fn board(
        &self,
        project: &Project,
        filter: TaskFilter,
    ) -> Result<KanbanColumns, TaskError> {
        let cards = self.store.list_task_cards(project.id, filter).await?;
        Ok(cards.into_iter().collect())
    }

    /// Inserts into "To Do" at the end of the column.
    pub async fn create_task(&self, task: NewTask) -> Result<Task, TaskError> {
        if let Some(milestone_id) = task.milestone_id {
            self.check_milestone(task.project_id, milestone_id).await?;
        }
        if let Some(parent_id) = task.parent_task_id {
            let parent = self
                .store
                .get_task(parent_id)
                .await?
                .ok_or_else(|| TaskError::InvalidReference("Parent task not found".into()))?;
            if parent.project_id != task.project_id {
                return Err(TaskError::InvalidReference(
                    "Parent task must belong to the same project".into(),
                ));
            }
        }

        let created = self.store.insert_task(task).await?;
        info!(
            task_id = %created.id,
            project_id = %created.project_id,
            display_order = created.display_order,
            "Task created"
        );
        Ok(created)
    }

    /// Loads the task and checks membership in its project.
    pub async fn authorize_task(
        &self,
        caller: &AuthenticatedUser,
        task_id: Uuid,
    ) -> Result<Task, TaskError> {
        let task = self
            .store
            .get_task(task_id)
            .await?
            .ok_or(TaskError::NotFound)?;
        self.access.require_member(caller, task.project_id).await?;
        Ok(task)
    }

    /// Applies `changes` to `current` and records one history row per changed
    /// tracked field. History failures are logged and do not fail the update.
    pub async fn update_task(
        &self,
        actor: &AuthenticatedUser,
        current: &Task,
        changes: &TaskChanges,
    ) -> Result<Task, TaskError> {
        if let Some(Some(milestone_id)) = changes.milestone_id {
            self.check_milestone(current.project_id, milestone_id).await?;
        }

        if changes.status == Some(TaskStatus::Done) && current.parent_task_id.is_none() {
            let open = self.store.count_open_subtasks(current.id).await?;
            if open > 0 {
                return Err(TaskError::OpenSubtasks);
            }
        }

        let updated = self.store.update_task(current.id, changes).await?;

        let entries = diff_tasks(current, &updated, actor.user_id);
        if !entries.is_empty() {
            let count = entries.len();
            if let Err(e) = self.store.insert_history(entries).await {
                error!(task_id = %updated.id, error = %e, "Failed to record task history");
            } else {
                info!(task_id = %updated.id, changes = count, "Task updated");
            }
        }

        Ok(updated)
    }

    /// Newest first.
    pub async fn history(&self, task: &Task) -> Result<Vec<TaskHistoryEntry>, TaskError> {
        Ok(self.store.list_history(task.id).await?)
    }

    async fn check_milestone(&self, project_id: Uuid, milestone_id: Uuid) -> Result<(), TaskError> {
        let milestone = self
            .store
            .get_milestone(milestone_id)
            .await?
            .ok_or_else(|| TaskError::InvalidReference("Milestone not found".into()))?;
        if milestone.project_id != project_id {
            return Err(TaskError::InvalidReference(
                "Milestone must belong to the same project".into(),
            ));
        }
        Ok(())
    }
}
