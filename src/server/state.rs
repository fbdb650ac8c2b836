use axum::extract::FromRef;

use anyhow::{Context, Result};
use tracing::info;

use crate::cache::ResponseCache;
use crate::config::AppConfig;
use crate::library::{LibraryProvider, SpotifyClient};
use crate::oauth::{AuthStateStore, SpotifyAuthClient};
use crate::pricing::{CachedPriceLookup, DiscogsClient, MarketplacePriceLookup, PriceLookup};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::ServerConfig;

pub type GuardedLibraryProvider = Arc<dyn LibraryProvider>;
pub type GuardedPriceLookup = Arc<dyn PriceLookup>;
pub type GuardedAuthClient = Arc<SpotifyAuthClient>;
pub type GuardedAuthStateStore = Arc<AuthStateStore>;

#[derive(Clone)]
pub struct ServerState {
    pub config: ServerConfig,
    pub start_time: Instant,
    pub library: GuardedLibraryProvider,
    pub price_lookup: GuardedPriceLookup,
    pub auth_client: GuardedAuthClient,
    pub auth_state_store: GuardedAuthStateStore,
    pub hash: String,
}

impl ServerState {
    pub fn new(
        config: ServerConfig,
        library: GuardedLibraryProvider,
        price_lookup: GuardedPriceLookup,
        auth_client: GuardedAuthClient,
        auth_state_store: GuardedAuthStateStore,
    ) -> Self {
        ServerState {
            config,
            start_time: Instant::now(),
            library,
            price_lookup,
            auth_client,
            auth_state_store,
            hash: env!("GIT_HASH").to_owned(),
        }
    }

    /// Builds the provider clients described by `config`. Prices go through
    /// `cache` when one is given.
    pub fn from_config(config: &AppConfig, cache: Option<Arc<dyn ResponseCache>>) -> Result<Self> {
        let library = SpotifyClient::new(&config.spotify.api_url, config.http_timeout_sec)
            .context("Failed to create Spotify client")?;
        let auth_client = SpotifyAuthClient::new(&config.spotify, config.http_timeout_sec)
            .context("Failed to create Spotify accounts client")?;

        let discogs = DiscogsClient::new(
            &config.discogs.api_url,
            config.discogs.access_token.clone(),
            &config.discogs.user_agent,
            config.discogs.requests_per_minute,
            config.http_timeout_sec,
        )
        .context("Failed to create Discogs client")?;
        info!(
            "Discogs client at {} ({} requests/minute)",
            config.discogs.api_url, config.discogs.requests_per_minute
        );

        let mut price_lookup: GuardedPriceLookup = Arc::new(MarketplacePriceLookup::new(
            Arc::new(discogs),
            config.appraisal.currency.clone(),
        ));
        if let Some(cache) = cache {
            price_lookup = Arc::new(CachedPriceLookup::new(
                price_lookup,
                cache,
                config.cache.namespace.clone(),
                Duration::from_secs(config.cache.price_ttl_sec),
            ));
        }

        Ok(ServerState::new(
            ServerConfig::from(config),
            Arc::new(library),
            price_lookup,
            Arc::new(auth_client),
            Arc::new(AuthStateStore::new()),
        ))
    }
}

impl FromRef<ServerState> for ServerConfig {
    fn from_ref(input: &ServerState) -> Self {
        input.config.clone()
    }
}

impl FromRef<ServerState> for GuardedLibraryProvider {
    fn from_ref(input: &ServerState) -> Self {
        input.library.clone()
    }
}

impl FromRef<ServerState> for GuardedPriceLookup {
    fn from_ref(input: &ServerState) -> Self {
        input.price_lookup.clone()
    }
}

impl FromRef<ServerState> for GuardedAuthClient {
    fn from_ref(input: &ServerState) -> Self {
        input.auth_client.clone()
    }
}

impl FromRef<ServerState> for GuardedAuthStateStore {
    fn from_ref(input: &ServerState) -> Self {
        input.auth_state_store.clone()
    }
}
