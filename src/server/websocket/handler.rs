//! WebSocket route handler.
//!
//! Handles the upgrade, runs one appraisal per connection and tears the
//! connection down once the run is over or the client goes away.

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    response::Response,
};
use futures::{stream::SplitSink, stream::SplitStream, SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::messages::{ClientMessage, ControlMessage};
use crate::appraisal::{AppraisalEvent, AppraisalPipeline, ChannelSink, FailureReason};
use crate::library::{PageLimit, SavedAlbumSource};
use crate::server::library_routes::{resolve_limit, LimitQuery};
use crate::server::metrics;
use crate::server::session::SpotifySession;
use crate::server::state::ServerState;

/// One slot: the pipeline waits for the writer before pricing the next album.
const EVENT_BUFFER: usize = 1;
const CONTROL_BUFFER: usize = 8;

/// Route handler for `GET /v1/appraisal/ws`.
///
/// The upgrade is accepted without a credential so the client gets the fatal
/// error as a frame rather than an HTTP status.
pub async fn appraisal_ws_handler(
    ws: WebSocketUpgrade,
    session: Option<SpotifySession>,
    State(state): State<ServerState>,
    Query(query): Query<LimitQuery>,
) -> Response {
    let limit = match resolve_limit(query.limit, state.config.stream_page_limit) {
        Ok(limit) => limit,
        Err(response) => return response,
    };

    ws.on_upgrade(move |socket| async move {
        match session {
            Some(session) => handle_socket(socket, session.access_token, limit, state).await,
            None => reject_socket(socket).await,
        }
    })
}

async fn reject_socket(mut socket: WebSocket) {
    debug!("WebSocket opened without credential");
    let event = AppraisalEvent::Failed(FailureReason::AuthRequired);
    if let Ok(json) = serde_json::to_string(&event) {
        let _ = socket.send(Message::Text(json.into())).await;
    }
    let _ = socket.send(Message::Close(None)).await;
}

/// Handle an established WebSocket connection.
async fn handle_socket(socket: WebSocket, access_token: String, limit: PageLimit, state: ServerState) {
    metrics::appraisal_stream_opened();
    debug!("WebSocket appraisal connected ({:?})", limit);

    let cancel = CancellationToken::new();
    let (event_tx, event_rx) = mpsc::channel(EVENT_BUFFER);
    let (control_tx, control_rx) = mpsc::channel(CONTROL_BUFFER);
    let (ws_sink, ws_stream) = socket.split();

    let writer = tokio::spawn(forward_outgoing(ws_sink, event_rx, control_rx, cancel.clone()));
    let reader = tokio::spawn(process_incoming(ws_stream, control_tx, cancel.clone()));

    let mut source = SavedAlbumSource::new(state.library.clone(), access_token, limit);
    let mut sink = ChannelSink::new(event_tx);
    let mut pipeline = AppraisalPipeline::new(state.price_lookup.clone(), cancel.clone());
    let outcome = pipeline.run(&mut source, &mut sink).await;

    // Closing the event channel lets the writer flush and send the close frame.
    drop(sink);
    if let Err(e) = writer.await {
        error!("WebSocket writer task failed: {}", e);
    }
    cancel.cancel();
    reader.abort();

    info!(
        "WebSocket appraisal finished: {} ({} albums, {} failures)",
        outcome.state.as_str(),
        outcome.albums,
        outcome.failures
    );
    metrics::appraisal_stream_closed();
}

/// Serialises events and control replies to text frames until the event
/// channel closes, then closes the socket.
async fn forward_outgoing(
    mut ws_sink: SplitSink<WebSocket, Message>,
    mut event_rx: mpsc::Receiver<AppraisalEvent>,
    mut control_rx: mpsc::Receiver<ControlMessage>,
    cancel: CancellationToken,
) {
    loop {
        let json = tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            event = event_rx.recv() => match event {
                Some(event) => serde_json::to_string(&event),
                None => break,
            },
            Some(control) = control_rx.recv() => serde_json::to_string(&control),
        };

        match json {
            Ok(json) => {
                if ws_sink.send(Message::Text(json.into())).await.is_err() {
                    debug!("WebSocket send failed, cancelling run");
                    cancel.cancel();
                    return;
                }
            }
            Err(e) => {
                error!("Failed to serialize WebSocket message: {}", e);
            }
        }
    }

    let _ = ws_sink.send(Message::Close(None)).await;
}

/// Answers pings and cancels the run when the client closes or the transport fails.
async fn process_incoming(
    mut ws_stream: SplitStream<WebSocket>,
    control_tx: mpsc::Sender<ControlMessage>,
    cancel: CancellationToken,
) {
    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientMessage>(&text) {
                Ok(ClientMessage::Ping) => {
                    if control_tx.send(ControlMessage::Pong).await.is_err() {
                        break;
                    }
                }
                Err(e) => debug!("Ignoring client message: {}", e),
            },
            Ok(Message::Close(_)) => {
                debug!("Client closed the WebSocket");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                debug!("WebSocket receive error: {}", e);
                break;
            }
        }
    }
    cancel.cancel();
}
