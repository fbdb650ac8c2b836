//! Test server lifecycle management
//!
//! This module manages spawning and shutting down test HTTP servers.
//! Each test gets an isolated server wired to its own fake providers.

use super::constants::*;
use super::fake_providers::FakeProviders;
use album_appraiser::cache::open_cache;
use album_appraiser::config::{
    AppConfig, AppraisalFileConfig, CacheBackend, CacheFileConfig, CliConfig, DiscogsFileConfig,
    FileConfig, SpotifyFileConfig,
};
use album_appraiser::server::{make_app, RequestsLoggingLevel, ServerState};
use std::time::Duration;
use tokio::net::TcpListener;

/// Knobs of the spawned server that tests care about
pub struct TestServerOptions {
    pub cache_backend: CacheBackend,
    pub stream_page_limit: i64,
    pub list_page_limit: i64,
}

impl Default for TestServerOptions {
    fn default() -> Self {
        Self {
            cache_backend: CacheBackend::Memory,
            stream_page_limit: -1,
            list_page_limit: 50,
        }
    }
}

/// Test server instance pointed at fake providers
///
/// When dropped, the server gracefully shuts down.
pub struct TestServer {
    /// Base URL for making requests (e.g., "http://127.0.0.1:12345")
    pub base_url: String,

    /// The port the server is listening on
    pub port: u16,

    // Private fields - keep resources alive until drop
    _shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl TestServer {
    pub async fn spawn(providers: &FakeProviders) -> Self {
        Self::spawn_with(providers, TestServerOptions::default()).await
    }

    /// Spawns a new test server on a random port
    ///
    /// # Panics
    ///
    /// Panics if configuration is rejected, the port cannot be bound or the
    /// server doesn't become ready within timeout.
    pub async fn spawn_with(providers: &FakeProviders, options: TestServerOptions) -> Self {
        // Bind to random port
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");

        let port = listener
            .local_addr()
            .expect("Failed to get local address")
            .port();

        let base_url = format!("http://127.0.0.1:{}", port);

        let cli = CliConfig {
            port,
            metrics_port: port.wrapping_add(1),
            logging_level: RequestsLoggingLevel::None,
            // reqwest's cookie store won't send Secure cookies over plain HTTP
            insecure_cookies: true,
            http_timeout_sec: 5,
            spotify_client_id: Some(CLIENT_ID.to_string()),
            spotify_client_secret: Some(CLIENT_SECRET.to_string()),
            spotify_redirect_uri: Some(format!("{}/v1/auth/callback", base_url)),
            cache_backend: Some(options.cache_backend),
            ..Default::default()
        };
        let file = FileConfig {
            spotify: Some(SpotifyFileConfig {
                accounts_url: Some(providers.accounts_url()),
                api_url: Some(providers.spotify_api_url()),
                ..Default::default()
            }),
            discogs: Some(DiscogsFileConfig {
                api_url: Some(providers.discogs_api_url()),
                // No client-side spacing between marketplace requests
                requests_per_minute: Some(0),
                ..Default::default()
            }),
            cache: Some(CacheFileConfig {
                namespace: Some("test".to_string()),
                ..Default::default()
            }),
            appraisal: Some(AppraisalFileConfig {
                stream_page_limit: Some(options.stream_page_limit),
                list_page_limit: Some(options.list_page_limit),
                ..Default::default()
            }),
            ..Default::default()
        };

        let app_config = AppConfig::resolve(&cli, Some(file)).expect("Invalid test config");
        let cache = open_cache(&app_config.cache).expect("Failed to open cache");
        let state = ServerState::from_config(&app_config, cache).expect("Failed to build state");
        let app = make_app(state);

        // Create shutdown channel
        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

        // Spawn server in background task with graceful shutdown
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .expect("Server failed");
        });

        let server = Self {
            base_url,
            port,
            _shutdown_tx: Some(shutdown_tx),
        };

        server.wait_for_ready().await;

        server
    }

    pub fn ws_url(&self, query: &str) -> String {
        format!(
            "{}/v1/appraisal/ws{}",
            self.base_url.replace("http://", "ws://"),
            query
        )
    }

    /// Waits for the server to become ready by polling the home route
    async fn wait_for_ready(&self) {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(100))
            .build()
            .expect("Failed to build reqwest client");

        let start = std::time::Instant::now();
        let timeout = Duration::from_millis(SERVER_READY_TIMEOUT_MS);

        loop {
            if start.elapsed() > timeout {
                panic!(
                    "Server did not become ready within {}ms",
                    SERVER_READY_TIMEOUT_MS
                );
            }

            match client.get(format!("{}/", self.base_url)).send().await {
                Ok(response) if response.status().is_success() => return,
                _ => {
                    tokio::time::sleep(Duration::from_millis(SERVER_READY_POLL_INTERVAL_MS)).await;
                }
            }
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        // Send shutdown signal
        if let Some(tx) = self._shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}
