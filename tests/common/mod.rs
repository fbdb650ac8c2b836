//! Common test infrastructure
//!
//! This module provides all the infrastructure needed for end-to-end tests.
//! Tests should only import from this module, not from internal submodules.
//!
//! # Example
//!
//! ```no_run
//! mod common;
//! use common::{numbered_albums, FakeProviders, TestClient, TestServer, VALID_TOKEN};
//! use reqwest::StatusCode;
//!
//! #[tokio::test]
//! async fn test_get_me() {
//!     let providers = FakeProviders::spawn(numbered_albums(3)).await;
//!     let server = TestServer::spawn(&providers).await;
//!     let client = TestClient::with_token(server.base_url.clone(), VALID_TOKEN);
//!
//!     let response = client.get_me().await;
//!     assert_eq!(response.status(), StatusCode::OK);
//! }
//! ```

mod client;
mod constants;
mod fake_providers;
mod server;

// Public API - this is what tests import
#[allow(unused_imports)]
pub use client::{collect_frames, connect_ws, next_frame, TestClient, WsStream};
pub use constants::*;
#[allow(unused_imports)]
pub use fake_providers::{expected_price, numbered_albums, FakeAlbum, FakeProviders, RequestCounters};
#[allow(unused_imports)]
pub use server::{TestServer, TestServerOptions};
