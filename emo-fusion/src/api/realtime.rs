//! Real-time WebSocket endpoint
//!
//! `GET /ws/realtime` upgrades to a WebSocket carrying JSON messages. The
//! socket is split: a writer task drains the session's outbound queue while
//! the dispatcher consumes inbound frames.

use axum::{
    extract::{
        ws::{WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
    routing::get,
    Router,
};
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::realtime::{write_outbound, Session};
use crate::AppState;

/// GET /ws/realtime
pub async fn realtime_socket(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (sink, stream) = socket.split();
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
    let cancel = CancellationToken::new();

    let session = Session::new(outbound_tx, cancel.clone());
    let writer = tokio::spawn(write_outbound(sink, outbound_rx, cancel));

    state.dispatcher.run(&state.registry, session, stream).await;

    // Every session handle is gone now; the writer flushes and closes
    if let Err(e) = writer.await {
        warn!(error = %e, "WebSocket writer task failed");
    }
}

/// Build real-time routes
pub fn realtime_routes() -> Router<AppState> {
    Router::new().route("/ws/realtime", get(realtime_socket))
}
