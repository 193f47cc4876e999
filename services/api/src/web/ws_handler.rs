//! services/api/src/web/ws_handler.rs
//!
//! Live search over a WebSocket. Keystrokes are debounced so the catalog is
//! searched once per typing burst, and only for its last query.

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use bookrec_core::search::{Debouncer, SEARCH_QUIET_PERIOD};
use futures::{
    stream::{SplitSink, StreamExt},
    SinkExt,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::web::{
    protocol::{ClientMessage, ServerMessage},
    state::AppState,
};

/// The handler for upgrading HTTP requests to WebSocket connections.
pub async fn ws_search_handler(
    ws: WebSocketUpgrade,
    State(app_state): State<Arc<AppState>>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, app_state))
}

async fn handle_socket(socket: WebSocket, app_state: Arc<AppState>) {
    info!("Search WebSocket connection established");
    let (mut sender, mut receiver) = socket.split();
    let (mut debouncer, mut queries) = Debouncer::new(SEARCH_QUIET_PERIOD);

    loop {
        tokio::select! {
            incoming = receiver.next() => {
                let Some(Ok(msg)) = incoming else {
                    info!("Client disconnected.");
                    break;
                };
                match msg {
                    Message::Text(text) => match serde_json::from_str::<ClientMessage>(&text) {
                        Ok(ClientMessage::Search { query }) => debouncer.submit(query),
                        Err(e) => {
                            warn!("Failed to deserialize client message: {}", e);
                            let reply = ServerMessage::Error {
                                message: "Expected {\"type\":\"search\",\"query\":...}".to_string(),
                            };
                            if send(&mut sender, &reply).await.is_err() {
                                break;
                            }
                        }
                    },
                    Message::Close(_) => {
                        info!("Client sent close message.");
                        break;
                    }
                    _ => {}
                }
            }
            Some(query) = queries.recv() => {
                let books = app_state.catalog().await.search(&query).unwrap_or_default();
                debug!(%query, hits = books.len(), "Search executed");
                if send(&mut sender, &ServerMessage::SearchResults { query, books }).await.is_err() {
                    break;
                }
            }
        }
    }

    info!("WebSocket connection closed.");
}

async fn send(
    sender: &mut SplitSink<WebSocket, Message>,
    msg: &ServerMessage,
) -> Result<(), ()> {
    let json = serde_json::to_string(msg).map_err(|e| warn!("Failed to encode message: {}", e))?;
    sender
        .send(Message::Text(json.into()))
        .await
        .map_err(|e| debug!("Failed to send message: {}", e))
}
