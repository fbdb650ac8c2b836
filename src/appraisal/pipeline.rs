//! Sequential appraisal of an album sequence.
//!
//! One album is looked up at a time, in source order, so event indices and the
//! running total follow the provider's listing exactly.

use rust_decimal::Decimal;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use super::events::{AppraisalEvent, FailureReason, PricedAlbum};
use super::sink::{ChannelClosed, DeliveryChannel};
use crate::library::AlbumStream;
use crate::pricing::PriceLookup;
use crate::server::metrics;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Streaming,
    Completed,
    Failed,
    /// The consumer went away; no terminal event was sent.
    Cancelled,
}

impl PipelineState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineState::Idle => "idle",
            PipelineState::Streaming => "streaming",
            PipelineState::Completed => "completed",
            PipelineState::Failed => "failed",
            PipelineState::Cancelled => "cancelled",
        }
    }
}

/// Summary of a finished run.
#[derive(Debug, Clone, PartialEq)]
pub struct AppraisalOutcome {
    pub state: PipelineState,
    /// Albums priced, found or not.
    pub albums: usize,
    /// Albums whose lookup failed.
    pub failures: usize,
    pub total: Decimal,
}

pub struct AppraisalPipeline {
    lookup: Arc<dyn PriceLookup>,
    cancel: CancellationToken,
    state: PipelineState,
}

struct Progress {
    index: usize,
    albums: usize,
    failures: usize,
    total: Decimal,
    /// Album count sent in the `Total` event; album events repeat it unchanged.
    announced_total: Option<usize>,
}

impl AppraisalPipeline {
    /// `cancel` stops the run between or during outbound calls, as when the
    /// consumer disconnects.
    pub fn new(lookup: Arc<dyn PriceLookup>, cancel: CancellationToken) -> Self {
        Self {
            lookup,
            cancel,
            state: PipelineState::Idle,
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub async fn run<S, C>(&mut self, source: &mut S, channel: &mut C) -> AppraisalOutcome
    where
        S: AlbumStream + ?Sized,
        C: DeliveryChannel + ?Sized,
    {
        let span = info_span!("appraisal", run_id = %Uuid::new_v4());
        let outcome = self.run_inner(source, channel).instrument(span).await;
        metrics::record_appraisal_run(outcome.state.as_str());
        outcome
    }

    async fn run_inner<S, C>(&mut self, source: &mut S, channel: &mut C) -> AppraisalOutcome
    where
        S: AlbumStream + ?Sized,
        C: DeliveryChannel + ?Sized,
    {
        self.state = PipelineState::Streaming;
        info!("Appraisal started");

        let mut progress = Progress {
            index: 0,
            albums: 0,
            failures: 0,
            total: Decimal::ZERO,
            announced_total: None,
        };

        let final_state = match self.stream(source, channel, &mut progress).await {
            Ok(state) => state,
            Err(ChannelClosed) => {
                debug!("Consumer went away after {} album(s)", progress.index);
                PipelineState::Cancelled
            }
        };
        self.state = final_state;

        info!(
            "Appraisal {}: {} priced, {} failed, total {}",
            final_state.as_str(),
            progress.albums,
            progress.failures,
            progress.total
        );

        AppraisalOutcome {
            state: final_state,
            albums: progress.albums,
            failures: progress.failures,
            total: progress.total,
        }
    }

    async fn stream<S, C>(
        &self,
        source: &mut S,
        channel: &mut C,
        progress: &mut Progress,
    ) -> Result<PipelineState, ChannelClosed>
    where
        S: AlbumStream + ?Sized,
        C: DeliveryChannel + ?Sized,
    {
        loop {
            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(ChannelClosed),
                next = source.next_album() => next,
            };

            if progress.announced_total.is_none() {
                if let Some(total_albums) = source.total_hint() {
                    channel
                        .deliver(AppraisalEvent::Total { total_albums })
                        .await?;
                    progress.announced_total = Some(total_albums);
                }
            }

            let record = match next {
                None => {
                    channel.deliver(AppraisalEvent::Complete).await?;
                    return Ok(PipelineState::Completed);
                }
                Some(Err(e)) => {
                    warn!("Album source failed: {}", e);
                    channel
                        .deliver(AppraisalEvent::Failed(FailureReason::from(e)))
                        .await?;
                    return Ok(PipelineState::Failed);
                }
                Some(Ok(record)) => record,
            };

            progress.index += 1;
            let index = progress.index;

            let lookup = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(ChannelClosed),
                lookup = self.lookup.lookup(&record.identity) => lookup,
            };

            let event = match lookup {
                Ok(quote) => {
                    progress.albums += 1;
                    progress.total += quote.amount;
                    AppraisalEvent::Album {
                        album: PricedAlbum {
                            index,
                            record,
                            quote,
                        },
                        total: progress.announced_total,
                    }
                }
                Err(e) => {
                    progress.failures += 1;
                    warn!("Price lookup failed for {}: {}", record.identity, e);
                    AppraisalEvent::Error {
                        index,
                        message: format!("Failed to price {}: {}", record.identity, e),
                    }
                }
            };
            channel.deliver(event).await?;
        }
    }
}
