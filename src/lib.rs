pub mod auth;
pub mod config;
pub mod core;
pub mod main_module;
pub mod milestones;
pub mod project;
pub mod security;
pub mod store;
pub mod tasks;
pub mod users;

pub use crate::config::AppConfig;
pub use crate::core::shared::state::AppState;
pub use crate::main_module::build_router;
