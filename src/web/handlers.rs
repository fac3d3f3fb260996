//! HTTP handlers for the status endpoints.

use super::AppState;
use crate::metrics::data::DashboardSnapshot;
use axum::{
    extract::State,
    response::{Html, Json},
};
use serde_json::json;

/// Latest dashboard snapshot as JSON.
pub async fn get_snapshot(State(state): State<AppState>) -> Json<DashboardSnapshot> {
    Json(state.snapshots.borrow().clone())
}

/// Health check endpoint.
pub async fn health_check(State(state): State<AppState>) -> Json<serde_json::Value> {
    let app = state.snapshots.borrow().app.clone();
    Json(json!({
        "status": "ok",
        "service": "pif451",
        "app": app,
        "version": env!("CARGO_PKG_VERSION"),
        "websocket_clients": state.client_count().await,
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

pub async fn default_index() -> Html<&'static str> {
    Html(DEFAULT_INDEX_HTML)
}

const DEFAULT_INDEX_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>piF451</title>
    <style>
        body { font-family: monospace; background: #111; color: #ddd; padding: 20px; }
        table { border-collapse: collapse; }
        td, th { padding: 4px 12px; text-align: left; }
        .low { color: #4aa3ff; }
        .normal { color: #4caf50; }
        .high { color: #ff5252; }
        #status { margin-top: 16px; color: #888; }
    </style>
</head>
<body>
    <h1 id="app">piF451</h1>
    <table>
        <thead><tr><th>Metric</th><th>Value</th><th>Trend</th><th>Min</th><th>Max</th></tr></thead>
        <tbody id="rows"></tbody>
    </table>
    <div id="uploads"></div>
    <div id="status">Connecting...</div>
    <script>
        const glyphs = { up: '▲', down: '▼', flat: '►' };
        const fmt = (v, unit) => v === null ? '--' : `${v.toFixed(1)} ${unit}`;

        function render(snap) {
            document.getElementById('app').textContent = snap.app;
            document.getElementById('rows').innerHTML = snap.series.map(s => `
                <tr>
                    <td>${s.label}</td>
                    <td class="${s.band || ''}">${fmt(s.latest, s.unit)}</td>
                    <td>${glyphs[s.trend]}</td>
                    <td>${fmt(s.min, s.unit)}</td>
                    <td>${fmt(s.max, s.unit)}</td>
                </tr>`).join('');
            const u = snap.uploads;
            document.getElementById('uploads').textContent =
                `Uploads: ${u.count}${u.max ? ' of ' + u.max : ''} | next in ${u.next_upload_in_secs}s`;
        }

        function connect() {
            const protocol = window.location.protocol === 'https:' ? 'wss:' : 'ws:';
            const ws = new WebSocket(`${protocol}//${window.location.host}/ws`);
            ws.onopen = () => document.getElementById('status').textContent = 'Live';
            ws.onmessage = (event) => render(JSON.parse(event.data));
            ws.onclose = () => {
                document.getElementById('status').textContent = 'Disconnected, retrying...';
                setTimeout(connect, 3000);
            };
        }

        fetch('/api/snapshot').then(r => r.json()).then(render);
        connect();
    </script>
</body>
</html>
"#;
