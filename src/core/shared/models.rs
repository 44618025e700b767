//! Domain records shared by the services and the storage backends.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

pub use crate::security::auth_api::Role;

/// Kanban column a task lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum TaskStatus {
    #[default]
    #[serde(rename = "To Do")]
    ToDo,
    #[serde(rename = "In Progress")]
    InProgress,
    #[serde(rename = "Testing")]
    Testing,
    #[serde(rename = "Done")]
    Done,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 4] = [Self::ToDo, Self::InProgress, Self::Testing, Self::Done];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ToDo => "To Do",
            Self::InProgress => "In Progress",
            Self::Testing => "Testing",
            Self::Done => "Done",
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownStatus(pub String);

impl fmt::Display for UnknownStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown task status '{}'", self.0)
    }
}

impl std::error::Error for UnknownStatus {}

impl FromStr for TaskStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| UnknownStatus(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct User {
    pub id: Uuid,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub avatar_url: Option<String>,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// "First Last" trimmed, or `None` when both parts are blank.
    pub fn display_name(&self) -> Option<String> {
        display_name(self.first_name.as_deref(), self.last_name.as_deref())
    }
}

pub fn display_name(first: Option<&str>, last: Option<&str>) -> Option<String> {
    let joined = format!("{} {}", first.unwrap_or(""), last.unwrap_or(""));
    let trimmed = joined.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct NewAccount {
    pub email: String,
    pub password_hash: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub role: Role,
}

#[derive(Debug, Clone)]
pub struct Credentials {
    pub user_id: Uuid,
    pub email: String,
    pub password_hash: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub id: Uuid,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.revoked_at.is_none() && self.expires_at > now
    }
}

#[derive(Debug, Clone)]
pub struct RecoveryToken {
    pub token_hash: String,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Project {
    pub id: Uuid,
    pub name: String,
    pub owner_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewProject {
    pub name: String,
    pub owner_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectMember {
    pub project_id: Uuid,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// A member row joined with the user's profile.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemberProfile {
    pub user_id: Uuid,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub avatar_url: Option<String>,
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Milestone {
    pub id: Uuid,
    pub project_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewMilestone {
    pub project_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
}

/// Partial milestone update. The outer `Option` is "field present", the inner
/// one is the new (possibly cleared) value.
#[derive(Debug, Clone, Default)]
pub struct MilestoneChanges {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub due_date: Option<Option<DateTime<Utc>>>,
}

impl MilestoneChanges {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.description.is_none() && self.due_date.is_none()
    }

    pub fn apply_to(&self, milestone: &Milestone, now: DateTime<Utc>) -> Milestone {
        let mut updated = milestone.clone();
        if let Some(name) = &self.name {
            updated.name.clone_from(name);
        }
        if let Some(description) = &self.description {
            updated.description.clone_from(description);
        }
        if let Some(due_date) = self.due_date {
            updated.due_date = due_date;
        }
        updated.updated_at = now;
        updated
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Task {
    pub id: Uuid,
    pub project_id: Uuid,
    pub milestone_id: Option<Uuid>,
    pub assignee_id: Option<Uuid>,
    pub parent_task_id: Option<Uuid>,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub display_order: i32,
    pub due_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields of a task to insert; status and display order are assigned by the store.
#[derive(Debug, Clone, Default)]
pub struct NewTask {
    pub project_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub assignee_id: Option<Uuid>,
    pub milestone_id: Option<Uuid>,
    pub parent_task_id: Option<Uuid>,
    pub due_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default)]
pub struct TaskChanges {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub status: Option<TaskStatus>,
    pub assignee_id: Option<Option<Uuid>>,
    pub milestone_id: Option<Option<Uuid>>,
    pub due_date: Option<Option<DateTime<Utc>>>,
    pub display_order: Option<i32>,
}

impl TaskChanges {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.status.is_none()
            && self.assignee_id.is_none()
            && self.milestone_id.is_none()
            && self.due_date.is_none()
            && self.display_order.is_none()
    }

    pub fn apply_to(&self, task: &Task, now: DateTime<Utc>) -> Task {
        let mut updated = task.clone();
        if let Some(title) = &self.title {
            updated.title.clone_from(title);
        }
        if let Some(description) = &self.description {
            updated.description.clone_from(description);
        }
        if let Some(status) = self.status {
            updated.status = status;
        }
        if let Some(assignee_id) = self.assignee_id {
            updated.assignee_id = assignee_id;
        }
        if let Some(milestone_id) = self.milestone_id {
            updated.milestone_id = milestone_id;
        }
        if let Some(due_date) = self.due_date {
            updated.due_date = due_date;
        }
        if let Some(display_order) = self.display_order {
            updated.display_order = display_order;
        }
        updated.updated_at = now;
        updated
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TaskFilter {
    pub assignee_id: Option<Uuid>,
    pub milestone_id: Option<Uuid>,
}

impl TaskFilter {
    pub fn matches(&self, task: &Task) -> bool {
        self.assignee_id.map_or(true, |id| task.assignee_id == Some(id))
            && self.milestone_id.map_or(true, |id| task.milestone_id == Some(id))
    }
}

/// A task joined with its assignee's name and milestone name for board display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskCard {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub assignee_id: Option<Uuid>,
    pub parent_task_id: Option<Uuid>,
    pub display_order: i32,
    pub assignee_name: Option<String>,
    pub milestone_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskHistoryEntry {
    pub id: i64,
    pub task_id: Uuid,
    pub user_id: Option<Uuid>,
    pub changed_field: String,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub changed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewHistoryEntry {
    pub task_id: Uuid,
    pub user_id: Uuid,
    pub changed_field: String,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_labels_round_trip() {
        for status in TaskStatus::ALL {
            assert_eq!(status.as_str().parse::<TaskStatus>(), Ok(status));
        }
        assert!("done".parse::<TaskStatus>().is_err());
    }

    #[test]
    fn test_status_serializes_as_column_label() {
        let json = serde_json::to_string(&TaskStatus::InProgress).unwrap();
        assert_eq!(json, "\"In Progress\"");
    }

    #[test]
    fn test_display_name() {
        assert_eq!(display_name(Some("Ada"), Some("Lovelace")).as_deref(), Some("Ada Lovelace"));
        assert_eq!(display_name(Some("Ada"), None).as_deref(), Some("Ada"));
        assert_eq!(display_name(None, Some(" Lovelace ")).as_deref(), Some("Lovelace"));
        assert_eq!(display_name(Some("  "), None), None);
        assert_eq!(display_name(None, None), None);
    }

    #[test]
    fn test_task_changes_apply_clears_and_sets() {
        let now = Utc::now();
        let task = Task {
            id: Uuid::new_v4(),
            project_id: Uuid::new_v4(),
            milestone_id: Some(Uuid::new_v4()),
            assignee_id: None,
            parent_task_id: None,
            title: "A".into(),
            description: Some("desc".into()),
            status: TaskStatus::ToDo,
            display_order: 1,
            due_date: None,
            created_at: now,
            updated_at: now,
        };
        let changes = TaskChanges {
            title: Some("B".into()),
            milestone_id: Some(None),
            status: Some(TaskStatus::Testing),
            ..Default::default()
        };

        let updated = changes.apply_to(&task, now);
        assert_eq!(updated.title, "B");
        assert_eq!(updated.milestone_id, None);
        assert_eq!(updated.status, TaskStatus::Testing);
        assert_eq!(updated.description.as_deref(), Some("desc"));
        assert!(!changes.is_empty());
        assert!(TaskChanges::default().is_empty());
    }
}
