//! Field-level change log for task updates.

use uuid::Uuid;

use crate::core::shared::models::{NewHistoryEntry, Task};

pub const TRACKED_FIELDS: [&str; 7] = [
    "title",
    "description",
    "status",
    "assignee_id",
    "milestone_id",
    "due_date",
    "display_order",
];

/// String form of a tracked field; empty strings collapse to `None`.
fn field_value(task: &Task, field: &str) -> Option<String> {
    let value = match field {
        "title" => Some(task.title.clone()),
        "description" => task.description.clone(),
        "status" => Some(task.status.to_string()),
        "assignee_id" => task.assignee_id.map(|id| id.to_string()),
        "milestone_id" => task.milestone_id.map(|id| id.to_string()),
        "due_date" => task.due_date.map(|d| d.to_rfc3339()),
        "display_order" => Some(task.display_order.to_string()),
        _ => None,
    };
    value.filter(|v| !v.is_empty())
}

/// One entry per tracked field whose stored value differs between the two rows.
pub fn diff_tasks(before: &Task, after: &Task, actor: Uuid) -> Vec<NewHistoryEntry> {
    TRACKED_FIELDS
        .iter()
        .filter_map(|&field| {
            let old_value = field_value(before, field);
            let new_value = field_value(after, field);
            (old_value != new_value).then(|| NewHistoryEntry {
                task_id: after.id,
                user_id: actor,
                changed_field: field.to_string(),
                old_value,
                new_value,
            })
        })
        .collect()
}
