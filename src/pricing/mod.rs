//! Album resale price estimation.
//!
//! `MarketplacePriceLookup` searches the marketplace for a CD release of the album
//! and picks one representative price out of its per-condition suggestions.
//! `CachedPriceLookup` memoizes any `PriceLookup` by album identity.

mod cached;
mod discogs;
mod quality;

pub use cached::{price_cache_key, CachedPriceLookup};
pub use discogs::DiscogsClient;
pub use quality::{PriceSuggestions, QualityTier, SuggestedPrice, TIER_PREFERENCE};

use async_trait::async_trait;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

use crate::library::AlbumIdentity;
use crate::server::metrics;

/// Best-guess resale price of one album.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub amount: Decimal,
    pub found: bool,
}

impl PriceQuote {
    /// A found price, rounded half-up to two decimal places.
    pub fn found(amount: Decimal) -> Self {
        Self {
            amount: amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero),
            found: true,
        }
    }

    pub fn not_found() -> Self {
        Self {
            amount: Decimal::new(0, 2),
            found: false,
        }
    }
}

/// Marketplace identifier of a catalog edition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReleaseId(pub u64);

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MarketplaceError {
    #[error("Marketplace unreachable: {0}")]
    Network(String),

    #[error("Marketplace responded with status {0}")]
    Status(u16),

    #[error("Malformed marketplace response: {0}")]
    Decode(String),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LookupError {
    #[error(transparent)]
    Marketplace(#[from] MarketplaceError),
}

/// Secondhand marketplace holding release listings and price suggestions.
#[cfg_attr(feature = "mock", mockall::automock)]
#[async_trait]
pub trait Marketplace: Send + Sync {
    /// First release matching a free-text query, if any.
    async fn search_release(&self, query: &str) -> Result<Option<ReleaseId>, MarketplaceError>;

    async fn price_suggestions(
        &self,
        release: ReleaseId,
    ) -> Result<PriceSuggestions, MarketplaceError>;
}

/// Produces a price quote for an album. Implementations must depend on the
/// identity alone so results can be cached by it.
#[cfg_attr(feature = "mock", mockall::automock)]
#[async_trait]
pub trait PriceLookup: Send + Sync {
    async fn lookup(&self, album: &AlbumIdentity) -> Result<PriceQuote, LookupError>;
}

/// Query text used to find the CD release of an album.
pub fn release_query(album: &AlbumIdentity) -> String {
    format!("{} - {} CD", album.artist, album.title)
}

pub struct MarketplacePriceLookup {
    marketplace: Arc<dyn Marketplace>,
    currency: String,
}

impl MarketplacePriceLookup {
    pub fn new(marketplace: Arc<dyn Marketplace>, currency: impl Into<String>) -> Self {
        Self {
            marketplace,
            currency: currency.into(),
        }
    }
}

#[async_trait]
impl PriceLookup for MarketplacePriceLookup {
    async fn lookup(&self, album: &AlbumIdentity) -> Result<PriceQuote, LookupError> {
        let result = self.lookup_uncounted(album).await;
        metrics::record_price_lookup(match &result {
            Ok(quote) if quote.found => "found",
            Ok(_) => "not_found",
            Err(_) => "error",
        });
        result
    }
}

impl MarketplacePriceLookup {
    async fn lookup_uncounted(&self, album: &AlbumIdentity) -> Result<PriceQuote, LookupError> {
        let Some(release) = self.marketplace.search_release(&release_query(album)).await? else {
            debug!("No release found for {}", album);
            return Ok(PriceQuote::not_found());
        };

        let suggestions = self.marketplace.price_suggestions(release).await?;
        match suggestions.select() {
            Some((tier, suggested)) => {
                if !suggested.currency.is_empty() && suggested.currency != self.currency {
                    warn!(
                        "Price for {} is in {} instead of {}, using it unconverted",
                        album, suggested.currency, self.currency
                    );
                }
                debug!("Priced {} at {} ({})", album, suggested.value, tier.label());
                Ok(PriceQuote::found(suggested.value))
            }
            None => {
                debug!("No usable price tier for {} (release {})", album, release.0);
                Ok(PriceQuote::not_found())
            }
        }
    }
}
