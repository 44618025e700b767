//! Task API module
//!
//! - engine: TaskEngine with board, create, update and history operations
//! - handlers: HTTP request handlers

pub mod engine;
pub mod handlers;

pub use engine::{TaskEngine, TaskError};
pub use handlers::{
    handle_task_board, handle_task_create, handle_task_get, handle_task_history,
    handle_task_update,
};
