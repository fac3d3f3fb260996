//! Read-only status server: JSON snapshot, health check and a live WebSocket feed.
//!
//! The monitor loop publishes [`DashboardSnapshot`]s on a `watch` channel;
//! handlers only ever read from it.

pub mod config;
pub mod handlers;
pub mod router;
pub mod websocket;

pub use config::WebConfig;
pub use router::create_app;

use crate::error::{MonitorError, Result};
use crate::metrics::data::DashboardSnapshot;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::{watch, RwLock};
use tracing::info;
use websocket::Client;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub snapshots: watch::Receiver<DashboardSnapshot>,
    pub clients: Arc<RwLock<HashMap<String, Client>>>,
    pub max_connections: usize,
}

impl AppState {
    pub fn new(snapshots: watch::Receiver<DashboardSnapshot>, max_connections: usize) -> Self {
        Self {
            snapshots,
            clients: Arc::new(RwLock::new(HashMap::new())),
            max_connections,
        }
    }

    pub async fn client_count(&self) -> usize {
        self.clients.read().await.len()
    }
}

/// Serve the status endpoints until `shutdown` flips to true.
pub async fn start_web_server(
    config: WebConfig,
    snapshots: watch::Receiver<DashboardSnapshot>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let state = AppState::new(snapshots, config.max_websocket_connections);
    let app = create_app(&config, state);

    let addr = config
        .bind_address()
        .parse::<SocketAddr>()
        .map_err(|e| MonitorError::config_error(format!("Invalid bind address: {}", e)))?;

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| MonitorError::web_server_error(format!("Failed to bind to address: {}", e)))?;

    info!("Status page available at http://{}/", addr);
    info!("API endpoint: http://{}/api/snapshot", addr);
    info!("WebSocket endpoint: ws://{}/ws", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.wait_for(|stop| *stop).await;
        })
        .await
        .map_err(|e| MonitorError::web_server_error(format!("Server error: {}", e)))?;

    Ok(())
}
