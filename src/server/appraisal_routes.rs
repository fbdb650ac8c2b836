use axum::{
    extract::State,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use tracing::debug;

use super::state::ServerState;
use super::websocket::appraisal_ws_handler;
use crate::appraisal::{price_albums, BulkPriceRequest};

async fn post_bulk_price(
    State(state): State<ServerState>,
    Json(request): Json<BulkPriceRequest>,
) -> impl IntoResponse {
    debug!("Bulk pricing {} album(s)", request.albums.len());
    let response = price_albums(
        state.price_lookup.clone(),
        request,
        &state.config.currency,
    )
    .await;
    Json(response)
}

pub fn make_appraisal_routes(state: ServerState) -> Router {
    Router::new()
        .route("/price", post(post_bulk_price))
        .route("/ws", get(appraisal_ws_handler))
        .with_state(state)
}
