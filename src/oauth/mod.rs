//! Spotify OAuth2 authorization-code flow.
//!
//! This module handles:
//! - Authorization URL generation with a random `state`
//! - Server-side storage of pending states between /login and /callback
//! - Code and refresh-token exchange against the accounts service

use anyhow::Result;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rand::distr::Alphanumeric;
use rand::Rng;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;

use crate::config::SpotifyConfig;
use crate::server::metrics;

/// Seconds a pending authorization state stays valid.
pub const AUTH_STATE_TTL_SECS: i64 = 300;

/// State stored during the authorization flow (between /login and /callback)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthState {
    pub state: String,
    /// Unix seconds
    pub created_at: i64,
}

impl AuthState {
    fn is_expired(&self, now: i64) -> bool {
        now - self.created_at >= AUTH_STATE_TTL_SECS
    }
}

/// Tokens handed out by the accounts service.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UserCredentials {
    pub access_token: String,
    /// Absent on refresh responses that keep the previous refresh token.
    pub refresh_token: Option<String>,
    pub expires_in: u64,
    #[serde(default)]
    pub scope: Option<String>,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OAuthError {
    #[error("Accounts service unreachable: {0}")]
    Network(String),

    #[error("Accounts service rejected the request ({status}): {message}")]
    Provider { status: u16, message: String },

    #[error("Malformed accounts service response: {0}")]
    Decode(String),
}

#[derive(Deserialize)]
struct ProviderErrorBody {
    error: Option<String>,
    error_description: Option<String>,
}

pub struct SpotifyAuthClient {
    client: reqwest::Client,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    scope: String,
    accounts_url: String,
}

impl SpotifyAuthClient {
    pub fn new(config: &SpotifyConfig, timeout_sec: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(Duration::from_secs(timeout_sec))
            .build()?;

        Ok(Self {
            client,
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            redirect_uri: config.redirect_uri.clone(),
            scope: config.scope.clone(),
            accounts_url: config.accounts_url.trim_end_matches('/').to_string(),
        })
    }

    /// URL to send the user to, along with the state to remember until the callback.
    pub fn authorize_url(&self) -> (String, AuthState) {
        let state: String = rand::rng()
            .sample_iter(&Alphanumeric)
            .take(16)
            .map(char::from)
            .collect();

        let url = format!(
            "{}/authorize?response_type=code&client_id={}&scope={}&redirect_uri={}&state={}",
            self.accounts_url,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(&self.scope),
            urlencoding::encode(&self.redirect_uri),
            state
        );

        (
            url,
            AuthState {
                state,
                created_at: chrono::Utc::now().timestamp(),
            },
        )
    }

    pub async fn exchange_code(&self, code: &str) -> Result<UserCredentials, OAuthError> {
        self.token_request(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", &self.redirect_uri),
        ])
        .await
    }

    pub async fn refresh(&self, refresh_token: &str) -> Result<UserCredentials, OAuthError> {
        self.token_request(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ])
        .await
    }

    fn basic_auth_header(&self) -> String {
        let credentials = format!("{}:{}", self.client_id, self.client_secret);
        format!("Basic {}", STANDARD.encode(credentials))
    }

    async fn token_request(&self, form: &[(&str, &str)]) -> Result<UserCredentials, OAuthError> {
        let url = format!("{}/api/token", self.accounts_url);
        let start = Instant::now();
        let response = self
            .client
            .post(&url)
            .header("Authorization", self.basic_auth_header())
            .form(form)
            .send()
            .await
            .map_err(|e| {
                metrics::record_upstream_request("spotify_accounts", "error", start.elapsed());
                OAuthError::Network(e.to_string())
            })?;

        let status = response.status();
        metrics::record_upstream_request("spotify_accounts", status.as_str(), start.elapsed());
        debug!("POST {} -> {}", url, status);

        if !status.is_success() {
            let message = match response.json::<ProviderErrorBody>().await {
                Ok(body) => body
                    .error_description
                    .or(body.error)
                    .unwrap_or_else(|| status.to_string()),
                Err(_) => status.to_string(),
            };
            return Err(OAuthError::Provider {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json()
            .await
            .map_err(|e| OAuthError::Decode(e.to_string()))
    }
}

/// Pending authorization states, keyed by the state value.
pub struct AuthStateStore {
    states: RwLock<HashMap<String, AuthState>>,
}

impl AuthStateStore {
    pub fn new() -> Self {
        Self {
            states: RwLock::new(HashMap::new()),
        }
    }

    pub async fn store(&self, state: AuthState) {
        let key = state.state.clone();
        self.states.write().await.insert(key, state);
    }

    /// Removes and returns a state, unless it has expired.
    pub async fn take(&self, state: &str) -> Option<AuthState> {
        let taken = self.states.write().await.remove(state)?;
        if taken.is_expired(chrono::Utc::now().timestamp()) {
            debug!("Discarding expired auth state");
            return None;
        }
        Some(taken)
    }

    pub async fn cleanup_expired(&self) {
        let now = chrono::Utc::now().timestamp();
        self.states
            .write()
            .await
            .retain(|_, state| !state.is_expired(now));
    }

    pub async fn len(&self) -> usize {
        self.states.read().await.len()
    }
}

impl Default for AuthStateStore {
    fn default() -> Self {
        Self::new()
    }
}
