pub mod api_error;
pub mod models;
pub mod schema;
pub mod state;
pub mod utils;

pub use api_error::{ApiError, ApiJson, ApiQuery};
