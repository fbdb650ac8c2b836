use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use super::events::{AggregationResult, AppraisalEvent};

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Delivery channel closed")]
pub struct ChannelClosed;

/// Where a pipeline run sends its events. Transport agnostic.
#[async_trait]
pub trait DeliveryChannel: Send {
    /// Fails once the consumer has gone away; the run stops at that point.
    async fn deliver(&mut self, event: AppraisalEvent) -> Result<(), ChannelClosed>;
}

/// Forwards events to a task owning the actual transport.
///
/// Over a channel of capacity 1, `deliver` returns only once the receiver has
/// taken the event, so the run never gets ahead of the transport.
pub struct ChannelSink {
    tx: mpsc::Sender<AppraisalEvent>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::Sender<AppraisalEvent>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl DeliveryChannel for ChannelSink {
    async fn deliver(&mut self, event: AppraisalEvent) -> Result<(), ChannelClosed> {
        self.tx.send(event).await.map_err(|_| ChannelClosed)?;
        // Capacity frees up when the receiver takes the event.
        self.tx.reserve().await.map(drop).map_err(|_| ChannelClosed)
    }
}

/// Keeps every event in memory, for callers that answer in one response.
pub struct CollectingSink {
    pub events: Vec<AppraisalEvent>,
    pub result: AggregationResult,
}

impl CollectingSink {
    pub fn new(currency: impl Into<String>) -> Self {
        Self {
            events: Vec::new(),
            result: AggregationResult::new(currency),
        }
    }
}

#[async_trait]
impl DeliveryChannel for CollectingSink {
    async fn deliver(&mut self, event: AppraisalEvent) -> Result<(), ChannelClosed> {
        if let AppraisalEvent::Album { album, .. } = &event {
            self.result.push(album.clone());
        }
        self.events.push(event);
        Ok(())
    }
}
