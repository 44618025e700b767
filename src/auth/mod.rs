//! Account lifecycle: registration, password login, logout, password
//! recovery and password change. Sessions are rows in the store; the access
//! token handed to clients is a JWT naming that row.

pub mod handlers;
pub mod service;

pub use handlers::configure_auth_routes;
pub use service::{AccountDto, AuthService, IssuedSession, Registration};
