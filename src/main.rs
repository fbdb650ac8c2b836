use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use album_appraiser::cache::{open_cache, run_purge_task};
use album_appraiser::config::{self, AppConfig, CacheBackend, FileConfig};
use album_appraiser::server::{metrics, run_server, RequestsLoggingLevel, ServerState};

/// How often pending OAuth states are swept.
const AUTH_STATE_CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

fn parse_path(s: &str) -> Result<PathBuf> {
    let path_buf = PathBuf::from(s);
    if path_buf.is_absolute() {
        return Ok(path_buf);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(path_buf))
}

#[derive(Parser, Debug)]
struct CliArgs {
    /// Path to a TOML configuration file. Its values override CLI arguments.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// The port to listen on.
    #[clap(short, long, default_value_t = 8888)]
    pub port: u16,

    /// The port for the metrics server (Prometheus scraping).
    #[clap(long, default_value_t = 9091)]
    pub metrics_port: u16,

    /// The level of logging to perform on each request.
    #[clap(long, default_value = "path")]
    pub logging_level: RequestsLoggingLevel,

    /// Path to the frontend directory to be statically served.
    #[clap(long)]
    pub frontend_dir_path: Option<String>,

    /// Issue session cookies without the Secure flag, for plain-HTTP development.
    #[clap(long)]
    pub insecure_cookies: bool,

    /// Timeout in seconds for requests to Spotify and Discogs.
    #[clap(long, default_value_t = 30)]
    pub http_timeout_sec: u64,

    /// Spotify application client id.
    #[clap(long, env = "SPOTIFY_CLIENT_ID")]
    pub spotify_client_id: Option<String>,

    /// Spotify application client secret.
    #[clap(long, env = "SPOTIFY_CLIENT_SECRET", hide_env_values = true)]
    pub spotify_client_secret: Option<String>,

    /// OAuth redirect URI registered with Spotify, pointing at /v1/auth/callback.
    #[clap(long, env = "SPOTIFY_REDIRECT_URL")]
    pub spotify_redirect_uri: Option<String>,

    /// OAuth scopes requested at login.
    #[clap(long, env = "SPOTIFY_SCOPE")]
    pub spotify_scope: Option<String>,

    /// Discogs personal access token. Anonymous requests get a lower rate limit.
    #[clap(long, env = "DISCOGS_ACCESS_TOKEN", hide_env_values = true)]
    pub discogs_access_token: Option<String>,

    /// Where price lookups are cached.
    #[clap(long)]
    pub cache_backend: Option<CacheBackend>,

    /// SQLite file of the price cache, required by the sqlite backend.
    #[clap(long, value_parser = parse_path)]
    pub cache_db_path: Option<PathBuf>,
}

/// Convert CLI args to CliConfig for config resolution
impl From<&CliArgs> for config::CliConfig {
    fn from(args: &CliArgs) -> Self {
        config::CliConfig {
            port: args.port,
            metrics_port: args.metrics_port,
            logging_level: args.logging_level.clone(),
            frontend_dir_path: args.frontend_dir_path.clone(),
            insecure_cookies: args.insecure_cookies,
            http_timeout_sec: args.http_timeout_sec,
            spotify_client_id: args.spotify_client_id.clone(),
            spotify_client_secret: args.spotify_client_secret.clone(),
            spotify_redirect_uri: args.spotify_redirect_uri.clone(),
            spotify_scope: args.spotify_scope.clone(),
            discogs_access_token: args.discogs_access_token.clone(),
            cache_backend: args.cache_backend,
            cache_db_path: args.cache_db_path.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .context("Failed to initialize logging")?;

    let file_config = match &cli_args.config {
        Some(path) => {
            info!("Loading config file {:?}", path);
            Some(FileConfig::load(path)?)
        }
        None => None,
    };
    let app_config = AppConfig::resolve(&config::CliConfig::from(&cli_args), file_config)?;

    info!("Initializing metrics...");
    metrics::init_metrics();

    let shutdown_token = CancellationToken::new();

    let cache = open_cache(&app_config.cache)?;
    match &cache {
        Some(cache) => {
            info!(
                "Price cache: {:?}, ttl {}s",
                app_config.cache.backend, app_config.cache.price_ttl_sec
            );
            tokio::spawn(run_purge_task(
                cache.clone(),
                Duration::from_secs(app_config.cache.purge_interval_sec),
                shutdown_token.child_token(),
            ));
        }
        None => info!("Price cache disabled"),
    }

    let state = ServerState::from_config(&app_config, cache)?;

    let auth_state_store = state.auth_state_store.clone();
    let cleanup_token = shutdown_token.child_token();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(AUTH_STATE_CLEANUP_INTERVAL);
        loop {
            tokio::select! {
                _ = cleanup_token.cancelled() => return,
                _ = ticker.tick() => auth_state_store.cleanup_expired().await,
            }
        }
    });

    info!("Ready to serve at port {}!", app_config.port);
    info!("Metrics available at port {}!", app_config.metrics_port);

    let server = run_server(state, app_config.metrics_port, shutdown_token.clone());
    tokio::pin!(server);

    tokio::select! {
        result = &mut server => {
            if let Err(e) = &result {
                error!("HTTP server stopped: {:?}", e);
            }
            shutdown_token.cancel();
            result
        },
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, initiating graceful shutdown");
            shutdown_token.cancel();
            server.await
        }
    }
}
