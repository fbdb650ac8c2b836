//! Wire types of the Spotify Web API responses we consume.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::{AlbumIdentity, AlbumRecord, SavedAlbumsPage, UserProfile};

#[derive(Debug, Deserialize)]
pub struct SpotifyUser {
    pub id: String,
    pub display_name: Option<String>,
}

impl From<SpotifyUser> for UserProfile {
    fn from(user: SpotifyUser) -> Self {
        UserProfile {
            id: user.id,
            display_name: user.display_name,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SavedAlbumsResponse {
    #[serde(default)]
    pub items: Vec<SavedAlbumItem>,
    pub next: Option<String>,
    pub total: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct SavedAlbumItem {
    pub added_at: Option<String>,
    pub album: SpotifyAlbum,
}

#[derive(Debug, Deserialize)]
pub struct SpotifyAlbum {
    pub name: String,
    #[serde(default)]
    pub artists: Vec<SpotifyArtist>,
    #[serde(default)]
    pub images: Vec<SpotifyImage>,
    pub release_date: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SpotifyArtist {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct SpotifyImage {
    pub url: String,
}

impl From<SavedAlbumItem> for AlbumRecord {
    fn from(item: SavedAlbumItem) -> Self {
        let SpotifyAlbum {
            name,
            artists,
            images,
            release_date,
        } = item.album;

        // Only the first credited artist takes part in the lookup key
        let artist = artists.into_iter().next().map(|a| a.name).unwrap_or_default();

        AlbumRecord {
            identity: AlbumIdentity::new(artist, name),
            added_at: item
                .added_at
                .as_deref()
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(|dt| dt.with_timezone(&Utc)),
            // Spotify lists images widest first
            cover_image_url: images.into_iter().next().map(|i| i.url),
            release_date,
        }
    }
}

impl From<SavedAlbumsResponse> for SavedAlbumsPage {
    fn from(response: SavedAlbumsResponse) -> Self {
        SavedAlbumsPage {
            items: response.items.into_iter().map(AlbumRecord::from).collect(),
            next: response.next,
            total: response.total,
        }
    }
}
