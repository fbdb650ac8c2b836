//! HTTP and WebSocket client for end-to-end tests
//!
//! Wraps reqwest and tokio-tungstenite and provides methods for all
//! appraiser endpoints. When API routes or request formats change, update
//! only this file.

use super::constants::*;
use futures::StreamExt;
use http::header;
use reqwest::Response;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// HTTP test client with cookie-based session management
pub struct TestClient {
    /// The underlying reqwest client (public for custom requests in tests)
    pub client: reqwest::Client,
    /// The base URL of the test server
    pub base_url: String,
    /// Sent as `Authorization: Bearer` when set
    bearer_token: Option<String>,
}

impl TestClient {
    /// Creates a new unauthenticated client. Redirects are not followed so
    /// tests can inspect the OAuth hops.
    pub fn new(base_url: String) -> Self {
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .redirect(reqwest::redirect::Policy::none())
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .expect("Failed to build reqwest client");

        Self {
            client,
            base_url,
            bearer_token: None,
        }
    }

    /// Creates a client sending `token` as a bearer credential
    pub fn with_token(base_url: String, token: &str) -> Self {
        let mut client = Self::new(base_url);
        client.bearer_token = Some(token.to_string());
        client
    }

    /// Creates a client that went through the OAuth login and holds the cookies
    pub async fn logged_in(base_url: String) -> Self {
        let client = Self::new(base_url);
        let state = client.start_login().await;
        let response = client.callback(Some(GOOD_AUTH_CODE), Some(&state)).await;
        assert!(
            response.status().is_redirection(),
            "Login callback failed: {:?}",
            response.text().await
        );
        client
    }

    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        let request = self.client.get(format!("{}{}", self.base_url, path));
        match &self.bearer_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    // ========================================================================
    // Auth endpoints
    // ========================================================================

    pub async fn login(&self) -> Response {
        self.get("/v1/auth/login")
            .send()
            .await
            .expect("Login request failed")
    }

    /// Hits /login and returns the `state` the server put in the redirect
    pub async fn start_login(&self) -> String {
        let response = self.login().await;
        let location = response
            .headers()
            .get(header::LOCATION)
            .expect("Login did not redirect")
            .to_str()
            .unwrap()
            .to_string();
        let url = reqwest::Url::parse(&location).expect("Invalid authorize URL");
        url.query_pairs()
            .find(|(k, _)| k == "state")
            .map(|(_, v)| v.to_string())
            .expect("No state in authorize URL")
    }

    pub async fn callback(&self, code: Option<&str>, state: Option<&str>) -> Response {
        let mut query = Vec::new();
        if let Some(code) = code {
            query.push(("code", code));
        }
        if let Some(state) = state {
            query.push(("state", state));
        }
        self.get("/v1/auth/callback")
            .query(&query)
            .send()
            .await
            .expect("Callback request failed")
    }

    pub async fn refresh(&self) -> Response {
        self.client
            .post(format!("{}/v1/auth/refresh", self.base_url))
            .send()
            .await
            .expect("Refresh request failed")
    }

    pub async fn logout(&self) -> Response {
        self.get("/v1/auth/logout")
            .send()
            .await
            .expect("Logout request failed")
    }

    // ========================================================================
    // Library endpoints
    // ========================================================================

    pub async fn home(&self) -> Response {
        self.get("/").send().await.expect("Home request failed")
    }

    pub async fn get_me(&self) -> Response {
        self.get("/v1/user/me")
            .send()
            .await
            .expect("Profile request failed")
    }

    pub async fn get_saved_albums(&self, limit: Option<&str>) -> Response {
        let path = match limit {
            Some(limit) => format!("/v1/user/albums?limit={}", limit),
            None => "/v1/user/albums".to_string(),
        };
        self.get(&path)
            .send()
            .await
            .expect("Albums request failed")
    }

    // ========================================================================
    // Appraisal endpoints
    // ========================================================================

    /// POSTs `albums` as `(artist, album_name)` pairs
    pub async fn price_albums(&self, albums: &[(&str, &str)]) -> Response {
        let albums: Vec<Value> = albums
            .iter()
            .map(|(artist, album_name)| json!({"artist": artist, "album_name": album_name}))
            .collect();
        self.client
            .post(format!("{}/v1/appraisal/price", self.base_url))
            .json(&json!({ "albums": albums }))
            .send()
            .await
            .expect("Bulk price request failed")
    }
}

/// Opens the appraisal WebSocket, sending `token` as the session cookie when set
pub async fn connect_ws(url: &str, token: Option<&str>) -> WsStream {
    let mut request = http::Request::builder()
        .uri(url)
        .header(header::HOST, "localhost")
        .header(header::CONNECTION, "Upgrade")
        .header(header::UPGRADE, "websocket")
        .header(header::SEC_WEBSOCKET_VERSION, "13")
        .header(header::SEC_WEBSOCKET_KEY, "dGhlIHNhbXBsZSBub25jZQ==");
    if let Some(token) = token {
        request = request.header(header::COOKIE, format!("spotify_access_token={}", token));
    }
    let request = request.body(()).expect("Failed to build WebSocket request");

    let (ws_stream, _) = connect_async(request)
        .await
        .expect("Failed to connect to WebSocket");
    ws_stream
}

/// Reads text frames as JSON until the server closes the socket
pub async fn collect_frames(ws: &mut WsStream) -> Vec<Value> {
    let collect = async {
        let mut frames = Vec::new();
        while let Some(Ok(msg)) = ws.next().await {
            match msg {
                Message::Text(text) => {
                    frames.push(serde_json::from_str(&text).expect("Frame is not JSON"))
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
        frames
    };
    tokio::time::timeout(Duration::from_secs(STREAM_TIMEOUT_SECS), collect)
        .await
        .expect("Stream did not finish in time")
}

/// Reads the next text frame as JSON
pub async fn next_frame(ws: &mut WsStream) -> Option<Value> {
    let next = async {
        while let Some(Ok(msg)) = ws.next().await {
            if let Message::Text(text) = msg {
                return serde_json::from_str(&text).ok();
            }
        }
        None
    };
    tokio::time::timeout(Duration::from_secs(STREAM_TIMEOUT_SECS), next)
        .await
        .ok()
        .flatten()
}
