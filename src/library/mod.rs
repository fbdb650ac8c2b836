//! Saved-album library of the authenticated account.
//!
//! This module provides:
//! - The album value types shared by the rest of the crate
//! - The `LibraryProvider` trait, implemented by the Spotify client
//! - `SavedAlbumSource`, a lazy pager over the provider's saved albums

mod source;
mod spotify;
mod spotify_models;

pub use source::{AlbumStream, RecordsStream, SavedAlbumSource};
pub use spotify::SpotifyClient;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Largest page the provider accepts for the saved-albums listing.
pub const MAX_PAGE_SIZE: u32 = 50;

/// Artist and title of an album, used as the price lookup key.
///
/// Equality is exact and case-sensitive, as received from the provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AlbumIdentity {
    pub artist: String,
    pub title: String,
}

impl AlbumIdentity {
    pub fn new(artist: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            artist: artist.into(),
            title: title.into(),
        }
    }
}

impl fmt::Display for AlbumIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.artist, self.title)
    }
}

/// A saved album as produced by the album source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlbumRecord {
    pub identity: AlbumIdentity,
    pub added_at: Option<DateTime<Utc>>,
    pub cover_image_url: Option<String>,
    pub release_date: Option<String>,
}

impl AlbumRecord {
    /// A record carrying only an identity, as submitted to the bulk pricing endpoint.
    pub fn from_identity(identity: AlbumIdentity) -> Self {
        Self {
            identity,
            added_at: None,
            cover_image_url: None,
            release_date: None,
        }
    }
}

/// Profile of the account owning the credential.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub display_name: Option<String>,
}

/// How many saved albums to retrieve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageLimit {
    /// Follow the pagination cursor until the provider reports no further page.
    Unbounded,
    /// Fetch exactly one page of at most this many items.
    Limited(u32),
}

impl PageLimit {
    /// Wire value meaning "every saved album".
    pub const UNBOUNDED_SENTINEL: i64 = -1;

    /// Parses the integer used by clients and config files: `-1` means unbounded,
    /// a positive value is a single-page limit.
    pub fn from_wire(value: i64) -> Option<Self> {
        if value == Self::UNBOUNDED_SENTINEL {
            Some(PageLimit::Unbounded)
        } else if value > 0 {
            Some(PageLimit::Limited(u32::try_from(value).unwrap_or(u32::MAX)))
        } else {
            None
        }
    }

    /// Page size requested from the provider.
    pub fn page_size(&self) -> u32 {
        match self {
            PageLimit::Unbounded => MAX_PAGE_SIZE,
            PageLimit::Limited(n) => (*n).min(MAX_PAGE_SIZE),
        }
    }
}

/// Where the next page of saved albums comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageCursor {
    /// The first page, sized by the caller.
    First { limit: u32 },
    /// A "next page" URL handed out by the provider with the previous page.
    Next(String),
}

/// One page of the provider's saved-album listing.
#[derive(Debug, Clone, Default)]
pub struct SavedAlbumsPage {
    pub items: Vec<AlbumRecord>,
    pub next: Option<String>,
    /// Total number of saved albums, when the provider reports it.
    pub total: Option<usize>,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LibraryError {
    /// The credential is missing, expired or lacks the required scope.
    /// Callers should send the user through the login flow again.
    #[error("Re-authentication required")]
    AuthRequired,

    #[error("Account provider request failed: {0}")]
    Upstream(String),
}

/// Account provider holding the user's saved albums.
#[cfg_attr(feature = "mock", mockall::automock)]
#[async_trait]
pub trait LibraryProvider: Send + Sync {
    /// Profile of the credential's owner. Doubles as a credential validity check.
    async fn current_profile(&self, access_token: &str) -> Result<UserProfile, LibraryError>;

    /// Fetches one page of saved albums.
    async fn saved_albums_page(
        &self,
        access_token: &str,
        cursor: &PageCursor,
    ) -> Result<SavedAlbumsPage, LibraryError>;
}
