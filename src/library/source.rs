//! Lazy album sequences.
//!
//! Albums are handed out one at a time so the consumer can start working on the
//! first album before the last page has been fetched.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::{AlbumRecord, LibraryError, LibraryProvider, PageCursor, PageLimit};

/// A lazy, possibly paginated, sequence of albums.
#[async_trait]
pub trait AlbumStream: Send {
    /// Next album in provider order. `None` once the sequence is exhausted.
    /// An `Err` terminates the sequence.
    async fn next_album(&mut self) -> Option<Result<AlbumRecord, LibraryError>>;

    /// Number of albums the sequence will produce, once it is known.
    fn total_hint(&self) -> Option<usize>;
}

/// Saved albums of one account, paged in from a `LibraryProvider`.
pub struct SavedAlbumSource {
    provider: Arc<dyn LibraryProvider>,
    access_token: String,
    limit: PageLimit,
    buffered: VecDeque<AlbumRecord>,
    next_cursor: Option<PageCursor>,
    total_hint: Option<usize>,
    visited_cursors: HashSet<String>,
    /// Raised after a page whose items still have to be handed out.
    pending_error: Option<LibraryError>,
    pages_fetched: usize,
    emitted: usize,
}

impl SavedAlbumSource {
    pub fn new(provider: Arc<dyn LibraryProvider>, access_token: String, limit: PageLimit) -> Self {
        Self {
            provider,
            access_token,
            limit,
            buffered: VecDeque::new(),
            next_cursor: Some(PageCursor::First {
                limit: limit.page_size(),
            }),
            total_hint: None,
            visited_cursors: HashSet::new(),
            pending_error: None,
            pages_fetched: 0,
            emitted: 0,
        }
    }

    pub fn pages_fetched(&self) -> usize {
        self.pages_fetched
    }

    /// Drains the whole sequence into a vector.
    pub async fn collect_all(mut self) -> Result<Vec<AlbumRecord>, LibraryError> {
        let mut records = Vec::new();
        while let Some(record) = self.next_album().await {
            records.push(record?);
        }
        Ok(records)
    }

    async fn fetch_page(&mut self, cursor: PageCursor) -> Result<(), LibraryError> {
        let page = self
            .provider
            .saved_albums_page(&self.access_token, &cursor)
            .await?;
        self.pages_fetched += 1;

        debug!(
            "Fetched saved albums page {} with {} item(s), more: {}",
            self.pages_fetched,
            page.items.len(),
            page.next.is_some()
        );

        let fetched_so_far = self.emitted_or_buffered() + page.items.len();
        self.buffered.extend(page.items);

        match self.limit {
            // A limited request is a single page, whatever the provider says about more.
            PageLimit::Limited(_) => {
                self.next_cursor = None;
                self.total_hint = Some(fetched_so_far);
            }
            PageLimit::Unbounded => {
                self.next_cursor = match page.next {
                    Some(url) if !self.visited_cursors.insert(url.clone()) => {
                        warn!("Provider handed out page cursor {} twice", url);
                        self.pending_error = Some(LibraryError::Upstream(
                            "saved albums pagination loops back on itself".to_string(),
                        ));
                        None
                    }
                    Some(url) => Some(PageCursor::Next(url)),
                    None => None,
                };
                // The first known total sticks.
                if self.total_hint.is_none() {
                    self.total_hint = match self.next_cursor {
                        Some(_) => page.total,
                        None => Some(fetched_so_far),
                    };
                }
            }
        }
        Ok(())
    }

    fn emitted_or_buffered(&self) -> usize {
        self.emitted + self.buffered.len()
    }
}

#[async_trait]
impl AlbumStream for SavedAlbumSource {
    async fn next_album(&mut self) -> Option<Result<AlbumRecord, LibraryError>> {
        loop {
            if let Some(record) = self.buffered.pop_front() {
                self.emitted += 1;
                return Some(Ok(record));
            }
            if let Some(e) = self.pending_error.take() {
                return Some(Err(e));
            }
            let cursor = self.next_cursor.take()?;
            if let Err(e) = self.fetch_page(cursor).await {
                return Some(Err(e));
            }
        }
    }

    fn total_hint(&self) -> Option<usize> {
        self.total_hint
    }
}

/// An in-memory album sequence, used for explicitly submitted album lists.
pub struct RecordsStream {
    records: std::vec::IntoIter<AlbumRecord>,
    total: usize,
}

impl RecordsStream {
    pub fn new(records: Vec<AlbumRecord>) -> Self {
        Self {
            total: records.len(),
            records: records.into_iter(),
        }
    }
}

#[async_trait]
impl AlbumStream for RecordsStream {
    async fn next_album(&mut self) -> Option<Result<AlbumRecord, LibraryError>> {
        self.records.next().map(Ok)
    }

    fn total_hint(&self) -> Option<usize> {
        Some(self.total)
    }
}
