use rust_decimal::Decimal;
use serde::{Serialize, Serializer};

use crate::library::{AlbumRecord, LibraryError};
use crate::pricing::PriceQuote;

/// An album together with its quote, as emitted by the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct PricedAlbum {
    /// 1-based position in the run, gapless across album and error events.
    pub index: usize,
    pub record: AlbumRecord,
    pub quote: PriceQuote,
}

/// Why a run stopped before the album sequence was exhausted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    AuthRequired,
    Upstream(String),
}

impl FailureReason {
    pub fn message(&self) -> String {
        match self {
            FailureReason::AuthRequired => "Not authenticated".to_string(),
            FailureReason::Upstream(message) => message.clone(),
        }
    }
}

impl From<LibraryError> for FailureReason {
    fn from(error: LibraryError) -> Self {
        match error {
            LibraryError::AuthRequired => FailureReason::AuthRequired,
            e @ LibraryError::Upstream(_) => FailureReason::Upstream(e.to_string()),
        }
    }
}

/// Everything the pipeline pushes into a delivery channel.
#[derive(Debug, Clone, PartialEq)]
pub enum AppraisalEvent {
    Total {
        total_albums: usize,
    },
    Album {
        album: PricedAlbum,
        /// Number of albums in the run, when known.
        total: Option<usize>,
    },
    /// The lookup for one album failed; the run goes on.
    Error {
        index: usize,
        message: String,
    },
    Complete,
    Failed(FailureReason),
}

impl AppraisalEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, AppraisalEvent::Complete | AppraisalEvent::Failed(_))
    }
}

#[derive(Serialize)]
struct AlbumWire<'a> {
    name: &'a str,
    artist: &'a str,
    #[serde(with = "rust_decimal::serde::float")]
    price: Decimal,
    valid: bool,
    image: Option<&'a str>,
    release_date: Option<&'a str>,
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum TypedWire<'a> {
    Total {
        total_albums: usize,
    },
    Album {
        index: usize,
        total: Option<usize>,
        album: AlbumWire<'a>,
    },
    Error {
        index: usize,
        message: &'a str,
    },
    Complete,
}

#[derive(Serialize)]
struct FatalWire {
    error: String,
}

impl Serialize for AppraisalEvent {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let typed = match self {
            AppraisalEvent::Failed(reason) => {
                return FatalWire {
                    error: reason.message(),
                }
                .serialize(serializer)
            }
            AppraisalEvent::Total { total_albums } => TypedWire::Total {
                total_albums: *total_albums,
            },
            AppraisalEvent::Album { album, total } => TypedWire::Album {
                index: album.index,
                total: *total,
                album: AlbumWire {
                    name: &album.record.identity.title,
                    artist: &album.record.identity.artist,
                    price: album.quote.amount,
                    valid: album.quote.found,
                    image: album.record.cover_image_url.as_deref(),
                    release_date: album.record.release_date.as_deref(),
                },
            },
            AppraisalEvent::Error { index, message } => TypedWire::Error {
                index: *index,
                message,
            },
            AppraisalEvent::Complete => TypedWire::Complete,
        };
        typed.serialize(serializer)
    }
}

/// Priced albums of a run with their running total, rebuilt from album events.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregationResult {
    pub items: Vec<PricedAlbum>,
    pub total: Decimal,
    pub currency: String,
}

impl AggregationResult {
    pub fn new(currency: impl Into<String>) -> Self {
        Self {
            items: Vec::new(),
            total: Decimal::ZERO,
            currency: currency.into(),
        }
    }

    pub fn push(&mut self, album: PricedAlbum) {
        self.total += album.quote.amount;
        self.items.push(album);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::AlbumIdentity;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn priced(index: usize, amount: Decimal, found: bool) -> PricedAlbum {
        PricedAlbum {
            index,
            record: AlbumRecord {
                identity: AlbumIdentity::new("Aphex Twin", "Drukqs"),
                added_at: None,
                cover_image_url: Some("https://img/1".into()),
                release_date: Some("2001-10-22".into()),
            },
            quote: PriceQuote { amount, found },
        }
    }

    #[test]
    fn album_event_wire_form() {
        let event = AppraisalEvent::Album {
            album: priced(3, dec!(12.5), true),
            total: Some(10),
        };

        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({
                "type": "album",
                "index": 3,
                "total": 10,
                "album": {
                    "name": "Drukqs",
                    "artist": "Aphex Twin",
                    "price": 12.5,
                    "valid": true,
                    "image": "https://img/1",
                    "release_date": "2001-10-22"
                }
            })
        );
    }

    #[test]
    fn other_event_wire_forms() {
        assert_eq!(
            serde_json::to_value(AppraisalEvent::Total { total_albums: 7 }).unwrap(),
            json!({"type": "total", "total_albums": 7})
        );
        assert_eq!(
            serde_json::to_value(AppraisalEvent::Error {
                index: 5,
                message: "boom".into()
            })
            .unwrap(),
            json!({"type": "error", "index": 5, "message": "boom"})
        );
        assert_eq!(
            serde_json::to_value(AppraisalEvent::Complete).unwrap(),
            json!({"type": "complete"})
        );
        assert_eq!(
            serde_json::to_value(AppraisalEvent::Failed(FailureReason::AuthRequired)).unwrap(),
            json!({"error": "Not authenticated"})
        );
    }

    #[test]
    fn unknown_total_is_null() {
        let event = AppraisalEvent::Album {
            album: priced(1, dec!(0), false),
            total: None,
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["total"], serde_json::Value::Null);
        assert_eq!(value["album"]["valid"], json!(false));
    }

    #[test]
    fn aggregation_sums_including_not_found() {
        let mut result = AggregationResult::new("EUR");
        result.push(priced(1, dec!(10.01), true));
        result.push(priced(2, dec!(0), false));
        result.push(priced(3, dec!(4.99), true));

        assert_eq!(result.total, dec!(15.00));
        assert_eq!(result.items.len(), 3);
    }

    #[test]
    fn library_errors_map_to_failure_reasons() {
        assert_eq!(
            FailureReason::from(LibraryError::AuthRequired),
            FailureReason::AuthRequired
        );
        assert!(matches!(
            FailureReason::from(LibraryError::Upstream("503".into())),
            FailureReason::Upstream(m) if m.contains("503")
        ));
    }
}
