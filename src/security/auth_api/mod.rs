//! Authentication and authorization primitives: roles and their permissions,
//! the resolved caller, and the middleware that resolves it from a Bearer
//! token or session cookie.

pub mod config;
pub mod error;
pub mod middleware;
pub mod types;
pub mod utils;

pub use config::AuthConfig;
pub use error::AuthError;
pub use middleware::auth_middleware;
pub use types::{AuthenticatedUser, Permission, Role, UnknownRole};
pub use utils::{extract_bearer_token, extract_session_from_cookies, extract_token};
