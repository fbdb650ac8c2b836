//! HTTP client for the Spotify Web API.

use anyhow::Result;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use super::spotify_models::{SavedAlbumsResponse, SpotifyUser};
use super::{LibraryError, LibraryProvider, PageCursor, SavedAlbumsPage, UserProfile};
use crate::server::metrics;

pub struct SpotifyClient {
    client: reqwest::Client,
    api_url: String,
}

impl SpotifyClient {
    /// # Arguments
    /// * `api_url` - Base URL of the Web API (e.g., "https://api.spotify.com/v1")
    /// * `timeout_sec` - Request timeout in seconds
    pub fn new(api_url: &str, timeout_sec: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_sec))
            .build()?;

        Ok(Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
        })
    }

    fn page_url(&self, cursor: &PageCursor) -> Result<String, LibraryError> {
        match cursor {
            PageCursor::First { limit } => Ok(format!("{}/me/albums?limit={}", self.api_url, limit)),
            PageCursor::Next(url) => {
                // The bearer token goes along with the request, so only follow
                // cursors pointing back at the API we were configured with.
                if url.starts_with(&format!("{}/", self.api_url)) {
                    Ok(url.clone())
                } else {
                    warn!("Refusing to follow pagination cursor outside the API: {}", url);
                    Err(LibraryError::Upstream(format!(
                        "Unexpected pagination cursor: {}",
                        url
                    )))
                }
            }
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        access_token: &str,
    ) -> Result<T, LibraryError> {
        let start = Instant::now();
        let response = self
            .client
            .get(url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| {
                metrics::record_upstream_request("spotify", "error", start.elapsed());
                LibraryError::Upstream(format!("Failed to reach Spotify: {}", e))
            })?;

        let status = response.status();
        metrics::record_upstream_request("spotify", status.as_str(), start.elapsed());
        debug!("GET {} -> {}", url, status);

        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(LibraryError::AuthRequired),
            s if !s.is_success() => Err(LibraryError::Upstream(format!(
                "Spotify responded with status {}",
                s
            ))),
            _ => response
                .json()
                .await
                .map_err(|e| LibraryError::Upstream(format!("Failed to parse Spotify response: {}", e))),
        }
    }
}

#[async_trait]
impl LibraryProvider for SpotifyClient {
    async fn current_profile(&self, access_token: &str) -> Result<UserProfile, LibraryError> {
        let url = format!("{}/me", self.api_url);
        let user: SpotifyUser = self.get_json(&url, access_token).await?;
        Ok(user.into())
    }

    async fn saved_albums_page(
        &self,
        access_token: &str,
        cursor: &PageCursor,
    ) -> Result<SavedAlbumsPage, LibraryError> {
        let url = self.page_url(cursor)?;
        let response: SavedAlbumsResponse = self.get_json(&url, access_token).await?;
        Ok(response.into())
    }
}
