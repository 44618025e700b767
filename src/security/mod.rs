pub mod access;
pub mod auth_api;
pub mod cors;
pub mod error_sanitizer;
pub mod jwt;
pub mod password;
pub mod request_id;
pub mod validation;

pub use access::{AccessError, AccessGate};
pub use auth_api::{auth_middleware, AuthConfig, AuthError, AuthenticatedUser, Permission, Role};
pub use cors::{create_cors_layer, CorsConfig};
pub use error_sanitizer::{api_error_logging_middleware, FieldError, SafeErrorResponse};
pub use jwt::{Claims, JwtConfig, JwtManager};
pub use password::{Argon2Config, PasswordManager};
pub use request_id::{request_id_middleware, RequestId};
