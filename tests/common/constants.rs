//! Shared constants for end-to-end tests
//!
//! This module contains all constants used across the test suite.
//! When the fake providers' data changes, update only this file.

// ============================================================================
// OAuth application and tokens
// ============================================================================

/// Client id the server is configured with
pub const CLIENT_ID: &str = "test-client";

/// Client secret the server is configured with
pub const CLIENT_SECRET: &str = "test-secret";

/// Authorization code the fake accounts service accepts
pub const GOOD_AUTH_CODE: &str = "good-code";

/// Access token the fake accounts service hands out for `GOOD_AUTH_CODE`
pub const VALID_TOKEN: &str = "valid-token";

/// Refresh token handed out along with `VALID_TOKEN`
pub const REFRESH_TOKEN: &str = "refresh-token";

/// Access token handed out by a refresh
pub const REFRESHED_TOKEN: &str = "refreshed-token";

/// A token the fake API rejects with 401
pub const EXPIRED_TOKEN: &str = "expired-token";

/// Seconds until the fake access tokens expire
pub const TOKEN_EXPIRES_IN: u64 = 3600;

// ============================================================================
// Fake library data
// ============================================================================

/// Profile id of the fake account
pub const USER_ID: &str = "tester";

/// Display name of the fake account
pub const USER_DISPLAY_NAME: &str = "Test Listener";

/// Artist whose marketplace search fails with a server error
pub const BROKEN_ARTIST: &str = "Broken Artist";

/// Artist the marketplace knows nothing about
pub const OBSCURE_ARTIST: &str = "Obscure Artist";

// ============================================================================
// Timeouts
// ============================================================================

/// Maximum time to wait for server to become ready (milliseconds)
pub const SERVER_READY_TIMEOUT_MS: u64 = 5000;

/// Default timeout for HTTP requests in tests (seconds)
pub const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Polling interval when waiting for server readiness (milliseconds)
pub const SERVER_READY_POLL_INTERVAL_MS: u64 = 50;

/// Maximum time to wait for a whole appraisal stream (seconds)
pub const STREAM_TIMEOUT_SECS: u64 = 20;
