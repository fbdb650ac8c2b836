//! Incremental library appraisal.
//!
//! The pipeline reads albums from an `AlbumStream`, prices them one at a time
//! through a `PriceLookup` and pushes one event per album into a
//! `DeliveryChannel`, followed by exactly one terminal event unless the consumer
//! disconnects first.

mod bulk;
mod events;
mod pipeline;
mod sink;

pub use bulk::{price_albums, BulkAlbum, BulkPriceRequest, BulkPriceResponse, BulkPricedAlbum};
pub use events::{AggregationResult, AppraisalEvent, FailureReason, PricedAlbum};
pub use pipeline::{AppraisalOutcome, AppraisalPipeline, PipelineState};
pub use sink::{ChannelClosed, ChannelSink, CollectingSink, DeliveryChannel};
