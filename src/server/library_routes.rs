//! Profile and saved-album routes backed by the account provider.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use super::session::{auth_required_response, SpotifySession};
use super::state::{GuardedLibraryProvider, ServerState};
use crate::library::{AlbumRecord, LibraryError, PageLimit, SavedAlbumSource};

#[derive(Deserialize, Debug)]
pub(super) struct LimitQuery {
    pub limit: Option<i64>,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(Serialize)]
struct AlbumView {
    name: String,
    artist: String,
    image: Option<String>,
    release_date: Option<String>,
    added_at: Option<DateTime<Utc>>,
}

impl From<AlbumRecord> for AlbumView {
    fn from(record: AlbumRecord) -> Self {
        AlbumView {
            name: record.identity.title,
            artist: record.identity.artist,
            image: record.cover_image_url,
            release_date: record.release_date,
            added_at: record.added_at,
        }
    }
}

#[derive(Serialize)]
struct SavedAlbumsResponse {
    total: usize,
    albums: Vec<AlbumView>,
}

/// Query limit, or the configured default. Invalid values become a 400.
pub(super) fn resolve_limit(requested: Option<i64>, default: PageLimit) -> Result<PageLimit, Response> {
    match requested {
        None => Ok(default),
        Some(value) => PageLimit::from_wire(value).ok_or_else(|| {
            (
                StatusCode::BAD_REQUEST,
                Json(ErrorBody {
                    error: format!("Invalid limit {}: use -1 or a positive number", value),
                }),
            )
                .into_response()
        }),
    }
}

pub(super) fn library_error_response(err: LibraryError) -> Response {
    match err {
        LibraryError::AuthRequired => auth_required_response(),
        LibraryError::Upstream(message) => {
            error!("Account provider failure: {}", message);
            (StatusCode::BAD_GATEWAY, Json(ErrorBody { error: message })).into_response()
        }
    }
}

async fn get_me(session: SpotifySession, State(library): State<GuardedLibraryProvider>) -> Response {
    match library.current_profile(&session.access_token).await {
        Ok(profile) => Json(profile).into_response(),
        Err(err) => library_error_response(err),
    }
}

async fn get_saved_albums(
    session: SpotifySession,
    State(state): State<ServerState>,
    Query(query): Query<LimitQuery>,
) -> Response {
    let limit = match resolve_limit(query.limit, state.config.list_page_limit) {
        Ok(limit) => limit,
        Err(response) => return response,
    };

    let source = SavedAlbumSource::new(state.library.clone(), session.access_token, limit);
    match source.collect_all().await {
        Ok(records) => {
            debug!("Listed {} saved albums", records.len());
            let albums: Vec<AlbumView> = records.into_iter().map(AlbumView::from).collect();
            Json(SavedAlbumsResponse {
                total: albums.len(),
                albums,
            })
            .into_response()
        }
        Err(err) => library_error_response(err),
    }
}

pub fn make_library_routes(state: ServerState) -> Router {
    Router::new()
        .route("/me", get(get_me))
        .route("/albums", get(get_saved_albums))
        .with_state(state)
}
