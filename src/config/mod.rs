mod file_config;

pub use file_config::{
    AppraisalFileConfig, CacheFileConfig, DiscogsFileConfig, FileConfig, SpotifyFileConfig,
};

use crate::library::PageLimit;
use crate::server::RequestsLoggingLevel;
use anyhow::{anyhow, bail, Result};
use clap::ValueEnum;
use std::path::PathBuf;

pub const DEFAULT_SPOTIFY_SCOPE: &str = "user-library-read";
pub const DEFAULT_SPOTIFY_ACCOUNTS_URL: &str = "https://accounts.spotify.com";
pub const DEFAULT_SPOTIFY_API_URL: &str = "https://api.spotify.com/v1";
pub const DEFAULT_DISCOGS_API_URL: &str = "https://api.discogs.com";
pub const DEFAULT_DISCOGS_USER_AGENT: &str = "AlbumAppraiser/1.0";
/// Ten days; marketplace prices move slowly.
pub const DEFAULT_PRICE_TTL_SEC: u64 = 864_000;

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub port: u16,
    pub metrics_port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub frontend_dir_path: Option<String>,
    pub insecure_cookies: bool,
    pub http_timeout_sec: u64,
    pub spotify_client_id: Option<String>,
    pub spotify_client_secret: Option<String>,
    pub spotify_redirect_uri: Option<String>,
    pub spotify_scope: Option<String>,
    pub discogs_access_token: Option<String>,
    pub cache_backend: Option<CacheBackend>,
    pub cache_db_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CacheBackend {
    Memory,
    Sqlite,
    None,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpotifyConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub scope: String,
    pub accounts_url: String,
    pub api_url: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DiscogsConfig {
    pub access_token: Option<String>,
    pub api_url: String,
    pub user_agent: String,
    pub requests_per_minute: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CacheConfig {
    pub backend: CacheBackend,
    pub db_path: Option<PathBuf>,
    pub price_ttl_sec: u64,
    pub namespace: String,
    pub purge_interval_sec: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppraisalConfig {
    pub currency: String,
    pub stream_page_limit: PageLimit,
    pub list_page_limit: PageLimit,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    // Core settings
    pub port: u16,
    pub metrics_port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub frontend_dir_path: Option<String>,
    pub secure_cookies: bool,
    pub http_timeout_sec: u64,

    pub spotify: SpotifyConfig,
    pub discogs: DiscogsConfig,
    pub cache: CacheConfig,
    pub appraisal: AppraisalConfig,
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let port = file.port.unwrap_or(cli.port);
        let metrics_port = file.metrics_port.unwrap_or(cli.metrics_port);
        if port == metrics_port {
            bail!("port and metrics_port must differ (both are {})", port);
        }

        let logging_level = match file.logging_level {
            Some(s) => parse_logging_level(&s)
                .ok_or_else(|| anyhow!("Invalid logging_level in config file: {}", s))?,
            None => cli.logging_level.clone(),
        };

        let frontend_dir_path = file
            .frontend_dir_path
            .or_else(|| cli.frontend_dir_path.clone());
        let secure_cookies = file.secure_cookies.unwrap_or(!cli.insecure_cookies);
        let http_timeout_sec = file.http_timeout_sec.unwrap_or(cli.http_timeout_sec);

        let spotify = Self::resolve_spotify(cli, file.spotify.unwrap_or_default())?;
        let discogs = Self::resolve_discogs(cli, file.discogs.unwrap_or_default());
        let cache = Self::resolve_cache(cli, file.cache.unwrap_or_default())?;
        let appraisal = Self::resolve_appraisal(file.appraisal.unwrap_or_default())?;

        Ok(Self {
            port,
            metrics_port,
            logging_level,
            frontend_dir_path,
            secure_cookies,
            http_timeout_sec,
            spotify,
            discogs,
            cache,
            appraisal,
        })
    }

    fn resolve_spotify(cli: &CliConfig, file: SpotifyFileConfig) -> Result<SpotifyConfig> {
        let required = |file_value: Option<String>, cli_value: &Option<String>, name: &str| {
            file_value.or_else(|| cli_value.clone()).ok_or_else(|| {
                anyhow!(
                    "spotify.{} must be specified via --spotify-{} / SPOTIFY_{} or in config file",
                    name,
                    name.replace('_', "-"),
                    name.to_uppercase()
                )
            })
        };

        Ok(SpotifyConfig {
            client_id: required(file.client_id, &cli.spotify_client_id, "client_id")?,
            client_secret: required(file.client_secret, &cli.spotify_client_secret, "client_secret")?,
            redirect_uri: required(file.redirect_uri, &cli.spotify_redirect_uri, "redirect_uri")?,
            scope: file
                .scope
                .or_else(|| cli.spotify_scope.clone())
                .unwrap_or_else(|| DEFAULT_SPOTIFY_SCOPE.to_string()),
            accounts_url: file
                .accounts_url
                .unwrap_or_else(|| DEFAULT_SPOTIFY_ACCOUNTS_URL.to_string()),
            api_url: file
                .api_url
                .unwrap_or_else(|| DEFAULT_SPOTIFY_API_URL.to_string()),
        })
    }

    fn resolve_discogs(cli: &CliConfig, file: DiscogsFileConfig) -> DiscogsConfig {
        let access_token = file
            .access_token
            .or_else(|| cli.discogs_access_token.clone())
            .filter(|t| !t.is_empty());
        // Discogs allows fewer requests to anonymous clients
        let default_rpm = if access_token.is_some() { 60 } else { 25 };

        DiscogsConfig {
            requests_per_minute: file.requests_per_minute.unwrap_or(default_rpm),
            access_token,
            api_url: file
                .api_url
                .unwrap_or_else(|| DEFAULT_DISCOGS_API_URL.to_string()),
            user_agent: file
                .user_agent
                .unwrap_or_else(|| DEFAULT_DISCOGS_USER_AGENT.to_string()),
        }
    }

    fn resolve_cache(cli: &CliConfig, file: CacheFileConfig) -> Result<CacheConfig> {
        let backend = match file.backend {
            Some(s) => CacheBackend::from_str(&s, true)
                .map_err(|_| anyhow!("Invalid cache backend in config file: {}", s))?,
            None => cli.cache_backend.unwrap_or(CacheBackend::Memory),
        };
        let db_path = file
            .db_path
            .map(PathBuf::from)
            .or_else(|| cli.cache_db_path.clone());

        if backend == CacheBackend::Sqlite {
            match &db_path {
                None => bail!("cache.db_path is required for the sqlite cache backend"),
                Some(path) => {
                    if let Some(parent) = path.parent() {
                        if !parent.as_os_str().is_empty() && !parent.is_dir() {
                            bail!("Cache database directory does not exist: {:?}", parent);
                        }
                    }
                }
            }
        }

        Ok(CacheConfig {
            backend,
            db_path,
            price_ttl_sec: file.price_ttl_sec.unwrap_or(DEFAULT_PRICE_TTL_SEC),
            namespace: file.namespace.unwrap_or_else(|| "albums".to_string()),
            purge_interval_sec: file.purge_interval_sec.unwrap_or(3600).max(1),
        })
    }

    fn resolve_appraisal(file: AppraisalFileConfig) -> Result<AppraisalConfig> {
        let page_limit = |value: Option<i64>, default: PageLimit, name: &str| match value {
            None => Ok(default),
            Some(v) => PageLimit::from_wire(v).ok_or_else(|| {
                anyhow!("appraisal.{} must be -1 or a positive number, got {}", name, v)
            }),
        };

        Ok(AppraisalConfig {
            currency: file.currency.unwrap_or_else(|| "EUR".to_string()),
            stream_page_limit: page_limit(
                file.stream_page_limit,
                PageLimit::Unbounded,
                "stream_page_limit",
            )?,
            list_page_limit: page_limit(
                file.list_page_limit,
                PageLimit::Limited(50),
                "list_page_limit",
            )?,
        })
    }
}

/// Parses a logging level string into RequestsLoggingLevel.
/// Uses clap's ValueEnum trait for parsing.
fn parse_logging_level(s: &str) -> Option<RequestsLoggingLevel> {
    RequestsLoggingLevel::from_str(s, true).ok()
}
