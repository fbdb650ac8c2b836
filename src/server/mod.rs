mod appraisal_routes;
mod auth_routes;
pub mod config;
mod http_layers;
mod library_routes;
pub mod metrics;
pub mod server;
pub mod session;
pub mod state;
pub mod websocket;

pub use config::ServerConfig;
pub use http_layers::*;
pub use server::{make_app, make_metrics_app, run_server};
pub use state::ServerState;
