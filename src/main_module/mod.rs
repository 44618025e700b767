//! Server assembly, health endpoints and process lifecycle.

mod health;
mod server;
mod shutdown;

pub use health::{configure_health_routes, health_check, health_check_simple};
pub use server::{build_router, run_axum_server};
pub use shutdown::shutdown_signal;
