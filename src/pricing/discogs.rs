//! Discogs API client.
//!
//! Discogs throttles per client (60 requests per minute with a token, 25 without),
//! so requests are spaced client-side across every appraisal run sharing the client.

use anyhow::Result;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::debug;

use super::{Marketplace, MarketplaceError, PriceSuggestions, ReleaseId};
use crate::server::metrics;

pub struct DiscogsClient {
    client: reqwest::Client,
    api_url: String,
    access_token: Option<String>,
    min_interval: Duration,
    last_request: Mutex<Option<tokio::time::Instant>>,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<Option<SearchResult>>,
}

#[derive(Deserialize)]
struct SearchResult {
    id: Option<u64>,
}

impl DiscogsClient {
    /// # Arguments
    /// * `api_url` - Base URL of the API (e.g., "https://api.discogs.com")
    /// * `access_token` - Personal access token, sent as `Discogs token=...` when set
    /// * `user_agent` - Discogs rejects requests without a descriptive user agent
    /// * `requests_per_minute` - Client-side request budget; 0 disables spacing
    pub fn new(
        api_url: &str,
        access_token: Option<String>,
        user_agent: &str,
        requests_per_minute: u32,
        timeout_sec: u64,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_secs(timeout_sec))
            .build()?;

        let min_interval = if requests_per_minute == 0 {
            Duration::ZERO
        } else {
            Duration::from_secs(60) / requests_per_minute
        };

        Ok(Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            access_token,
            min_interval,
            last_request: Mutex::new(None),
        })
    }

    async fn rate_limit(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.min_interval {
                tokio::time::sleep(self.min_interval - elapsed).await;
            }
        }
        *last = Some(tokio::time::Instant::now());
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<T, MarketplaceError> {
        self.rate_limit().await;

        let mut request = self.client.get(url).query(query);
        if let Some(token) = &self.access_token {
            request = request.header("Authorization", format!("Discogs token={}", token));
        }

        let start = Instant::now();
        let response = request.send().await.map_err(|e| {
            metrics::record_upstream_request("discogs", "error", start.elapsed());
            MarketplaceError::Network(e.to_string())
        })?;

        let status = response.status();
        metrics::record_upstream_request("discogs", status.as_str(), start.elapsed());
        debug!("GET {} -> {}", url, status);

        if !status.is_success() {
            return Err(MarketplaceError::Status(status.as_u16()));
        }

        response
            .json()
            .await
            .map_err(|e| MarketplaceError::Decode(e.to_string()))
    }
}

#[async_trait]
impl Marketplace for DiscogsClient {
    async fn search_release(&self, query: &str) -> Result<Option<ReleaseId>, MarketplaceError> {
        let url = format!("{}/database/search", self.api_url);
        let response: SearchResponse = self
            .get_json(&url, &[("q", query), ("type", "release")])
            .await?;

        Ok(response
            .results
            .into_iter()
            .next()
            .flatten()
            .and_then(|result| result.id)
            .map(ReleaseId))
    }

    async fn price_suggestions(
        &self,
        release: ReleaseId,
    ) -> Result<PriceSuggestions, MarketplaceError> {
        let url = format!(
            "{}/marketplace/price_suggestions/{}",
            self.api_url, release.0
        );
        self.get_json(&url, &[]).await
    }
}
