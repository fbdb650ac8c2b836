//! Album Appraiser Library
//!
//! This library exposes the internal modules for testing and potential reuse.

pub mod appraisal;
pub mod cache;
pub mod config;
pub mod library;
pub mod oauth;
pub mod pricing;
pub mod server;
pub mod sqlite_persistence;

// Re-export commonly used types for convenience
pub use config::AppConfig;
pub use server::{make_app, run_server, RequestsLoggingLevel, ServerState};
