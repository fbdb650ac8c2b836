use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    // Core settings (can override CLI)
    pub port: Option<u16>,
    pub metrics_port: Option<u16>,
    pub logging_level: Option<String>,
    pub frontend_dir_path: Option<String>,
    pub secure_cookies: Option<bool>,
    pub http_timeout_sec: Option<u64>,

    // Provider and feature sections
    pub spotify: Option<SpotifyFileConfig>,
    pub discogs: Option<DiscogsFileConfig>,
    pub cache: Option<CacheFileConfig>,
    pub appraisal: Option<AppraisalFileConfig>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct SpotifyFileConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub redirect_uri: Option<String>,
    pub scope: Option<String>,
    pub accounts_url: Option<String>,
    pub api_url: Option<String>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct DiscogsFileConfig {
    pub access_token: Option<String>,
    pub api_url: Option<String>,
    pub user_agent: Option<String>,
    pub requests_per_minute: Option<u32>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct CacheFileConfig {
    /// "memory", "sqlite" or "none"
    pub backend: Option<String>,
    pub db_path: Option<String>,
    pub price_ttl_sec: Option<u64>,
    pub namespace: Option<String>,
    pub purge_interval_sec: Option<u64>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct AppraisalFileConfig {
    pub currency: Option<String>,
    /// -1 for every saved album
    pub stream_page_limit: Option<i64>,
    pub list_page_limit: Option<i64>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}
