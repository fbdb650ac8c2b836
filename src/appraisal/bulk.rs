use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::events::AppraisalEvent;
use super::pipeline::AppraisalPipeline;
use super::sink::CollectingSink;
use crate::library::{AlbumIdentity, AlbumRecord, RecordsStream};
use crate::pricing::PriceLookup;

#[derive(Debug, Clone, Deserialize)]
pub struct BulkAlbum {
    pub artist: String,
    pub album_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BulkPriceRequest {
    pub albums: Vec<BulkAlbum>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BulkPricedAlbum {
    pub artist: String,
    pub album_name: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BulkPriceResponse {
    pub albums_with_price: Vec<BulkPricedAlbum>,
    #[serde(with = "rust_decimal::serde::float")]
    pub total: Decimal,
    pub currency: String,
}

/// Prices an explicit list of albums in one go. A failing lookup marks its album
/// invalid with a zero price and never aborts the batch.
pub async fn price_albums(
    lookup: Arc<dyn PriceLookup>,
    request: BulkPriceRequest,
    currency: &str,
) -> BulkPriceResponse {
    let identities: Vec<AlbumIdentity> = request
        .albums
        .into_iter()
        .map(|a| AlbumIdentity::new(a.artist, a.album_name))
        .collect();
    let mut source = RecordsStream::new(
        identities
            .iter()
            .cloned()
            .map(AlbumRecord::from_identity)
            .collect(),
    );
    let mut sink = CollectingSink::new(currency);

    AppraisalPipeline::new(lookup, CancellationToken::new())
        .run(&mut source, &mut sink)
        .await;

    let mut albums_with_price = Vec::with_capacity(identities.len());
    for event in sink.events {
        match event {
            AppraisalEvent::Album { album, .. } => albums_with_price.push(BulkPricedAlbum {
                artist: album.record.identity.artist,
                album_name: album.record.identity.title,
                price: album.quote.amount,
                valid: album.quote.found,
                error: None,
            }),
            AppraisalEvent::Error { index, message } => {
                let identity = &identities[index - 1];
                albums_with_price.push(BulkPricedAlbum {
                    artist: identity.artist.clone(),
                    album_name: identity.title.clone(),
                    price: Decimal::ZERO,
                    valid: false,
                    error: Some(message),
                })
            }
            _ => {}
        }
    }

    BulkPriceResponse {
        albums_with_price,
        total: sink.result.total,
        currency: sink.result.currency,
    }
}
