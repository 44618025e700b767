//! Project milestones: per-project unique names, optional due dates, and a
//! delete guard while tasks still reference the milestone.

use axum::{routing::get, Router};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::core::shared::models::{MilestoneChanges, NewMilestone};
use crate::core::shared::state::AppState;
use crate::core::urls::ApiUrls;
use crate::security::validation::{
    deserialize_some, normalize_due_date, validate_length, ValidationError, ValidationResult,
};

pub mod handlers;
pub mod service;

pub use service::{MilestoneError, MilestoneService};

pub const MAX_MILESTONE_NAME_LEN: usize = 255;
pub const MAX_MILESTONE_DESCRIPTION_LEN: usize = 1000;

#[derive(Debug, Default, Deserialize)]
pub struct CreateMilestoneRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub due_date: Option<String>,
}

impl CreateMilestoneRequest {
    pub fn into_new_milestone(self, project_id: Uuid) -> Result<NewMilestone, ValidationResult> {
        let mut result = ValidationResult::new();

        let name = result.take(parse_name(self.name.as_deref()));
        let due_date = match self.due_date.as_deref() {
            Some(raw) => result.take(normalize_due_date(raw, "due_date")),
            None => None,
        };

        result.into_result()?;
        Ok(NewMilestone {
            project_id,
            name: name.unwrap_or_default(),
            description: self.description.filter(|d| !d.trim().is_empty()),
            due_date,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateMilestoneRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub due_date: Option<Option<String>>,
}

impl UpdateMilestoneRequest {
    pub fn into_changes(self) -> Result<MilestoneChanges, ValidationResult> {
        let mut result = ValidationResult::new();
        let mut changes = MilestoneChanges::default();

        if let Some(name) = self.name.as_deref() {
            changes.name = result.take(parse_name(Some(name)));
        }

        if let Some(description) = self.description {
            if let Some(text) = description.as_deref() {
                result.take(validate_length(
                    text,
                    "description",
                    None,
                    Some(MAX_MILESTONE_DESCRIPTION_LEN),
                ));
            }
            changes.description = Some(description);
        }

        // null or "" clears the due date
        if let Some(due_date) = self.due_date {
            changes.due_date = match due_date.as_deref().map(str::trim) {
                None | Some("") => Some(None),
                Some(raw) => result.take(normalize_due_date(raw, "due_date")).map(Some),
            };
        }

        if result.is_valid() && changes.is_empty() {
            result.add_error(ValidationError::NoChanges);
        }
        result.into_result()?;
        Ok(changes)
    }
}

fn parse_name(raw: Option<&str>) -> Result<String, ValidationError> {
    let name = raw
        .map(str::trim)
        .ok_or_else(|| ValidationError::Required("name".to_string()))?;
    validate_length(name, "name", Some(1), Some(MAX_MILESTONE_NAME_LEN))?;
    Ok(name.to_string())
}

pub fn configure_milestone_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            ApiUrls::PROJECT_MILESTONES,
            get(handlers::handle_list_milestones).post(handlers::handle_create_milestone),
        )
        .route(
            ApiUrls::MILESTONE_BY_ID,
            get(handlers::handle_get_milestone)
                .patch(handlers::handle_update_milestone)
                .delete(handlers::handle_delete_milestone),
        )
}
