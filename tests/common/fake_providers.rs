//! Fake Spotify accounts/API and Discogs endpoints
//!
//! One axum router imitates the three upstream services on a random port and
//! counts the requests it receives, so tests can assert on upstream traffic.
//!
//! Albums are numbered from 1. Album `n` has release id `n` on the marketplace
//! and a "Good Plus (G+)" suggestion of `n + 0.125`, so its quote is `n.13`.

use super::constants::*;
use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Form, Json, Router,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

#[derive(Debug, Clone)]
pub struct FakeAlbum {
    pub artist: String,
    pub title: String,
}

impl FakeAlbum {
    pub fn new(artist: &str, title: &str) -> Self {
        Self {
            artist: artist.to_string(),
            title: title.to_string(),
        }
    }
}

/// `Artist n` / `Album n` for n in 1..=count
pub fn numbered_albums(count: usize) -> Vec<FakeAlbum> {
    (1..=count)
        .map(|n| FakeAlbum::new(&format!("Artist {}", n), &format!("Album {}", n)))
        .collect()
}

/// Expected quote of album number `n`
pub fn expected_price(n: usize) -> f64 {
    format!("{}.13", n).parse().unwrap()
}

#[derive(Default)]
pub struct RequestCounters {
    pub token: AtomicUsize,
    pub profile: AtomicUsize,
    pub album_pages: AtomicUsize,
    pub searches: AtomicUsize,
    pub price_suggestions: AtomicUsize,
}

impl RequestCounters {
    pub fn get(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

#[derive(Clone)]
struct FakeState {
    base_url: String,
    albums: Arc<Vec<FakeAlbum>>,
    price_delay: Duration,
    counters: Arc<RequestCounters>,
}

pub struct FakeProviders {
    pub base_url: String,
    pub counters: Arc<RequestCounters>,
    _shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl FakeProviders {
    pub async fn spawn(albums: Vec<FakeAlbum>) -> Self {
        Self::spawn_with_delay(albums, Duration::ZERO).await
    }

    /// Every price suggestion response is delayed by `price_delay`.
    pub async fn spawn_with_delay(albums: Vec<FakeAlbum>, price_delay: Duration) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind fake providers");
        let port = listener.local_addr().expect("No local address").port();
        let base_url = format!("http://127.0.0.1:{}", port);

        let counters = Arc::new(RequestCounters::default());
        let state = FakeState {
            base_url: base_url.clone(),
            albums: Arc::new(albums),
            price_delay,
            counters: counters.clone(),
        };

        let app = Router::new()
            .route("/accounts/api/token", post(token))
            .route("/spotify/me", get(profile))
            .route("/spotify/me/albums", get(saved_albums))
            .route("/discogs/database/search", get(search))
            .route(
                "/discogs/marketplace/price_suggestions/{id}",
                get(price_suggestions),
            )
            .with_state(state);

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .expect("Fake providers failed");
        });

        Self {
            base_url,
            counters,
            _shutdown_tx: Some(shutdown_tx),
        }
    }

    pub fn accounts_url(&self) -> String {
        format!("{}/accounts", self.base_url)
    }

    pub fn spotify_api_url(&self) -> String {
        format!("{}/spotify", self.base_url)
    }

    pub fn discogs_api_url(&self) -> String {
        format!("{}/discogs", self.base_url)
    }
}

impl Drop for FakeProviders {
    fn drop(&mut self) {
        if let Some(tx) = self._shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

fn bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

fn authorized(headers: &HeaderMap) -> bool {
    matches!(bearer(headers), Some(VALID_TOKEN) | Some(REFRESHED_TOKEN))
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({"error": {"status": 401, "message": "The access token expired"}})),
    )
        .into_response()
}

async fn token(
    State(state): State<FakeState>,
    headers: HeaderMap,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    state.counters.token.fetch_add(1, Ordering::SeqCst);

    let expected = format!(
        "Basic {}",
        STANDARD.encode(format!("{}:{}", CLIENT_ID, CLIENT_SECRET))
    );
    if headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok()) != Some(&expected) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": "invalid_client"})),
        )
            .into_response();
    }

    let invalid_grant = || {
        (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "invalid_grant", "error_description": "Invalid authorization code"})),
        )
            .into_response()
    };

    match form.get("grant_type").map(String::as_str) {
        Some("authorization_code") if form.get("code").map(String::as_str) == Some(GOOD_AUTH_CODE) => {
            Json(json!({
                "access_token": VALID_TOKEN,
                "token_type": "Bearer",
                "refresh_token": REFRESH_TOKEN,
                "expires_in": TOKEN_EXPIRES_IN,
                "scope": "user-library-read",
            }))
            .into_response()
        }
        Some("refresh_token")
            if form.get("refresh_token").map(String::as_str) == Some(REFRESH_TOKEN) =>
        {
            Json(json!({
                "access_token": REFRESHED_TOKEN,
                "token_type": "Bearer",
                "expires_in": TOKEN_EXPIRES_IN,
            }))
            .into_response()
        }
        _ => invalid_grant(),
    }
}

async fn profile(State(state): State<FakeState>, headers: HeaderMap) -> Response {
    state.counters.profile.fetch_add(1, Ordering::SeqCst);
    if !authorized(&headers) {
        return unauthorized();
    }
    Json(json!({"id": USER_ID, "display_name": USER_DISPLAY_NAME})).into_response()
}

#[derive(Deserialize)]
struct PageQuery {
    limit: Option<usize>,
    offset: Option<usize>,
}

async fn saved_albums(
    State(state): State<FakeState>,
    headers: HeaderMap,
    Query(query): Query<PageQuery>,
) -> Response {
    state.counters.album_pages.fetch_add(1, Ordering::SeqCst);
    if !authorized(&headers) {
        return unauthorized();
    }

    let limit = query.limit.unwrap_or(20).min(50);
    let offset = query.offset.unwrap_or(0);
    let total = state.albums.len();

    let items: Vec<_> = state
        .albums
        .iter()
        .enumerate()
        .skip(offset)
        .take(limit)
        .map(|(i, album)| {
            json!({
                "added_at": format!("2024-01-{:02}T10:00:00Z", (i % 28) + 1),
                "album": {
                    "name": album.title,
                    "artists": [{"name": album.artist}],
                    "images": [{"url": format!("https://img.example.com/{}.jpg", i + 1)}],
                    "release_date": "1999",
                }
            })
        })
        .collect();

    let next_offset = offset + limit;
    let next = (next_offset < total).then(|| {
        format!(
            "{}/spotify/me/albums?offset={}&limit={}",
            state.base_url, next_offset, limit
        )
    });

    Json(json!({"items": items, "next": next, "total": total, "limit": limit, "offset": offset}))
        .into_response()
}

#[derive(Deserialize)]
struct SearchQuery {
    q: String,
}

async fn search(State(state): State<FakeState>, Query(query): Query<SearchQuery>) -> Response {
    state.counters.searches.fetch_add(1, Ordering::SeqCst);

    let wanted = query.q.strip_suffix(" CD").unwrap_or(&query.q);
    let position = state
        .albums
        .iter()
        .position(|album| format!("{} - {}", album.artist, album.title) == wanted);

    match position {
        Some(i) if state.albums[i].artist == BROKEN_ARTIST => {
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
        Some(i) if state.albums[i].artist != OBSCURE_ARTIST => {
            Json(json!({"results": [{"id": i + 1, "title": wanted}]})).into_response()
        }
        _ => Json(json!({"results": []})).into_response(),
    }
}

async fn price_suggestions(State(state): State<FakeState>, Path(id): Path<usize>) -> Response {
    state.counters.price_suggestions.fetch_add(1, Ordering::SeqCst);
    if !state.price_delay.is_zero() {
        tokio::time::sleep(state.price_delay).await;
    }

    Json(json!({
        "Good Plus (G+)": {"currency": "EUR", "value": id as f64 + 0.125},
        "Mint (M)": {"currency": "EUR", "value": 999.0},
        "Poor (P)": {"currency": "EUR", "value": 0.5},
    }))
    .into_response()
}
