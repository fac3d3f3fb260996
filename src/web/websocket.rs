//! WebSocket streaming of dashboard snapshots.

use super::AppState;
use axum::extract::ws::{Message, WebSocket};
use axum::{
    extract::{State, WebSocketUpgrade},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use futures_util::{SinkExt, StreamExt};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_stream::wrappers::WatchStream;
use tracing::{debug, error, info, warn};

/// A connected WebSocket client.
#[derive(Debug, Clone)]
pub struct Client {
    pub id: String,
    pub connected_at: Instant,
}

/// WebSocket upgrade handler.
pub async fn websocket_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    if state.client_count().await >= state.max_connections {
        warn!("Rejecting WebSocket client, connection limit reached");
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }
    ws.on_upgrade(move |socket| handle_websocket(socket, state))
}

async fn handle_websocket(socket: WebSocket, state: AppState) {
    let client_id = uuid::Uuid::new_v4().to_string();
    info!("WebSocket client connected: {}", client_id);

    state.clients.write().await.insert(
        client_id.clone(),
        Client {
            id: client_id.clone(),
            connected_at: Instant::now(),
        },
    );

    let (mut sender, mut receiver) = socket.split();

    // Sends the current snapshot first, then every update
    let mut snapshots = WatchStream::new(state.snapshots.clone());

    let client_id_recv = client_id.clone();
    let recv_task = tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            match msg {
                Ok(Message::Close(_)) => break,
                Ok(_) => debug!("Ignoring message from {}", client_id_recv),
                Err(e) => {
                    warn!("WebSocket error for client {}: {}", client_id_recv, e);
                    break;
                }
            }
        }
    });

    let client_id_send = client_id.clone();
    let send_task = tokio::spawn(async move {
        while let Some(snapshot) = snapshots.next().await {
            match serde_json::to_string(&snapshot) {
                Ok(json) => {
                    if let Err(e) = sender.send(Message::Text(json)).await {
                        debug!("Client {} went away: {}", client_id_send, e);
                        break;
                    }
                }
                Err(e) => error!("Failed to serialize snapshot: {}", e),
            }
        }
    });

    first_to_finish(recv_task, send_task).await;

    if let Some(client) = state.clients.write().await.remove(&client_id) {
        info!(
            "WebSocket client disconnected: {} after {}s",
            client.id,
            client.connected_at.elapsed().as_secs()
        );
    }
}

/// Wait for either task to end, then abort the other.
async fn first_to_finish(mut a: JoinHandle<()>, mut b: JoinHandle<()>) {
    tokio::select! {
        _ = &mut a => b.abort(),
        _ = &mut b => a.abort(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::sync::oneshot;

    #[tokio::test]
    async fn test_losing_task_is_aborted() {
        let (alive_tx, alive_rx) = oneshot::channel::<()>();
        let pending = tokio::spawn(async move {
            let _alive = alive_tx;
            std::future::pending::<()>().await;
        });
        let done = tokio::spawn(async {});

        first_to_finish(pending, done).await;

        // Dropping the aborted task drops its sender
        let closed = tokio::time::timeout(Duration::from_secs(1), alive_rx).await;
        assert!(matches!(closed, Ok(Err(_))));
    }
}
