mod config;
pub mod route;
mod telemetry;
pub mod websocket_listener;

pub use config::Config;
pub use route::create_router;
pub use telemetry::{init_telemetry, shutdown_telemetry};
