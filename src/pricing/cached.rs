use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::{LookupError, PriceLookup, PriceQuote};
use crate::cache::ResponseCache;
use crate::library::AlbumIdentity;
use crate::server::metrics;

/// Cache key of an album's price: the namespace plus a digest of artist and title.
/// A unit separator keeps ("a b", "c") and ("a", "b c") apart.
pub fn price_cache_key(namespace: &str, album: &AlbumIdentity) -> String {
    let mut hasher = Sha256::new();
    hasher.update(album.artist.as_bytes());
    hasher.update([0x1f]);
    hasher.update(album.title.as_bytes());
    let digest = hasher.finalize();
    let hex: String = digest.iter().map(|b| format!("{:02x}", b)).collect();
    format!("{}:{}", namespace, hex)
}

/// Cache-aside wrapper around a `PriceLookup`.
///
/// Successful quotes, found or not, are stored for `ttl`. Failed lookups are not
/// cached so the next run tries again. Cache errors never reach the caller.
pub struct CachedPriceLookup {
    inner: Arc<dyn PriceLookup>,
    cache: Arc<dyn ResponseCache>,
    namespace: String,
    ttl: Duration,
}

impl CachedPriceLookup {
    pub fn new(
        inner: Arc<dyn PriceLookup>,
        cache: Arc<dyn ResponseCache>,
        namespace: impl Into<String>,
        ttl: Duration,
    ) -> Self {
        Self {
            inner,
            cache,
            namespace: namespace.into(),
            ttl,
        }
    }

    fn cached(&self, key: &str) -> Option<PriceQuote> {
        match self.cache.get(key) {
            Ok(Some(value)) => match serde_json::from_value(value) {
                Ok(quote) => Some(quote),
                Err(e) => {
                    warn!("Ignoring unreadable cached price {}: {}", key, e);
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!("Price cache read failed for {}: {}", key, e);
                None
            }
        }
    }

    fn store(&self, key: &str, quote: &PriceQuote) {
        let result = serde_json::to_value(quote)
            .map_err(anyhow::Error::from)
            .and_then(|value| self.cache.set(key, &value, self.ttl));
        if let Err(e) = result {
            warn!("Price cache write failed for {}: {}", key, e);
        }
    }
}

#[async_trait]
impl PriceLookup for CachedPriceLookup {
    async fn lookup(&self, album: &AlbumIdentity) -> Result<PriceQuote, LookupError> {
        let key = price_cache_key(&self.namespace, album);

        if let Some(quote) = self.cached(&key) {
            metrics::record_price_cache(true);
            debug!("Price cache hit for {}", album);
            return Ok(quote);
        }
        metrics::record_price_cache(false);

        let quote = self.inner.lookup(album).await?;
        self.store(&key, &quote);
        Ok(quote)
    }
}
