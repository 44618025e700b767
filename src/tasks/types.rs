use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::shared::models::{NewTask, TaskCard, TaskChanges, TaskFilter, TaskStatus};
use crate::security::validation::{
    deserialize_some, normalize_due_date, parse_uuid, validate_length, ValidationError,
    ValidationResult,
};

pub const MAX_TASK_TITLE_LEN: usize = 255;

/// Board view of a project: one column per status, each ordered by display order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct KanbanColumns {
    #[serde(rename = "To Do")]
    pub to_do: Vec<TaskCard>,
    #[serde(rename = "In Progress")]
    pub in_progress: Vec<TaskCard>,
    #[serde(rename = "Testing")]
    pub testing: Vec<TaskCard>,
    #[serde(rename = "Done")]
    pub done: Vec<TaskCard>,
}

impl KanbanColumns {
    pub fn column(&self, status: TaskStatus) -> &[TaskCard] {
        match status {
            TaskStatus::ToDo => &self.to_do,
            TaskStatus::InProgress => &self.in_progress,
            TaskStatus::Testing => &self.testing,
            TaskStatus::Done => &self.done,
        }
    }

    fn column_mut(&mut self, status: TaskStatus) -> &mut Vec<TaskCard> {
        match status {
            TaskStatus::ToDo => &mut self.to_do,
            TaskStatus::InProgress => &mut self.in_progress,
            TaskStatus::Testing => &mut self.testing,
            TaskStatus::Done => &mut self.done,
        }
    }
}

impl FromIterator<TaskCard> for KanbanColumns {
    fn from_iter<I: IntoIterator<Item = TaskCard>>(cards: I) -> Self {
        let mut columns = Self::default();
        for card in cards {
            columns.column_mut(card.status).push(card);
        }
        for status in TaskStatus::ALL {
            columns.column_mut(status).sort_by_key(|card| card.display_order);
        }
        columns
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct TaskListQuery {
    pub assignee_id: Option<String>,
    pub milestone_id: Option<String>,
}

impl TaskListQuery {
    /// Empty query values are treated as absent.
    pub fn into_filter(self) -> Result<TaskFilter, ValidationError> {
        let parse = |raw: Option<String>, field: &str| {
            raw.filter(|v| !v.trim().is_empty())
                .map(|v| parse_uuid(&v, field))
                .transpose()
        };
        Ok(TaskFilter {
            assignee_id: parse(self.assignee_id, "assignee_id")?,
            milestone_id: parse(self.milestone_id, "milestone_id")?,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct CreateTaskRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub assignee_id: Option<String>,
    #[serde(default)]
    pub milestone_id: Option<String>,
    #[serde(default)]
    pub parent_task_id: Option<String>,
    #[serde(default)]
    pub due_date: Option<String>,
}

impl CreateTaskRequest {
    pub fn into_new_task(self, project_id: Uuid) -> Result<NewTask, ValidationResult> {
        let mut result = ValidationResult::new();

        let title = result.take(parse_title(self.title.as_deref()));
        let assignee_id = optional_id(&mut result, self.assignee_id, "assignee_id");
        let milestone_id = optional_id(&mut result, self.milestone_id, "milestone_id");
        let parent_task_id = optional_id(&mut result, self.parent_task_id, "parent_task_id");
        let due_date = self
            .due_date
            .as_deref()
            .and_then(|raw| result.take(normalize_due_date(raw, "due_date")));

        result.into_result()?;
        Ok(NewTask {
            project_id,
            title: title.unwrap_or_default(),
            description: self.description,
            assignee_id,
            milestone_id,
            parent_task_id,
            due_date,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateTaskRequest {
    /// Title and status cannot be cleared, so an explicit `null` is rejected.
    #[serde(default, deserialize_with = "deserialize_some")]
    pub title: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub assignee_id: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub milestone_id: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub due_date: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub status: Option<Option<String>>,
    #[serde(default)]
    pub display_order: Option<i32>,
}

impl UpdateTaskRequest {
    pub fn into_changes(self) -> Result<TaskChanges, ValidationResult> {
        let mut result = ValidationResult::new();
        let mut changes = TaskChanges {
            description: self.description,
            display_order: self.display_order,
            ..Default::default()
        };

        if let Some(title) = self.title {
            changes.title = result.take(parse_title(title.as_deref()));
        }
        if let Some(assignee) = self.assignee_id {
            changes.assignee_id = nullable_id(&mut result, assignee, "assignee_id");
        }
        if let Some(milestone) = self.milestone_id {
            changes.milestone_id = nullable_id(&mut result, milestone, "milestone_id");
        }
        if let Some(due_date) = self.due_date {
            changes.due_date = match due_date.as_deref() {
                None => Some(None),
                Some(raw) => result.take(normalize_due_date(raw, "due_date")).map(Some),
            };
        }
        if let Some(status) = self.status {
            let parsed = status
                .ok_or_else(|| ValidationError::Required("status".to_string()))
                .and_then(|raw| {
                    raw.parse::<TaskStatus>()
                        .map_err(|_| ValidationError::InvalidValue {
                            field: "status".to_string(),
                            message: "must be one of To Do, In Progress, Testing, Done"
                                .to_string(),
                        })
                });
            changes.status = result.take(parsed);
        }

        result.into_result()?;
        Ok(changes)
    }
}

fn parse_title(raw: Option<&str>) -> Result<String, ValidationError> {
    let title = raw
        .map(str::trim)
        .ok_or_else(|| ValidationError::Required("title".to_string()))?;
    validate_length(title, "title", Some(1), Some(MAX_TASK_TITLE_LEN))?;
    Ok(title.to_string())
}

fn optional_id(result: &mut ValidationResult, raw: Option<String>, field: &str) -> Option<Uuid> {
    raw.and_then(|value| result.take(parse_uuid(&value, field)))
}

/// `Some(None)` clears the reference; an unparseable id records an error.
fn nullable_id(
    result: &mut ValidationResult,
    raw: Option<String>,
    field: &str,
) -> Option<Option<Uuid>> {
    match raw {
        None => Some(None),
        Some(value) => result.take(parse_uuid(&value, field)).map(Some),
    }
}
