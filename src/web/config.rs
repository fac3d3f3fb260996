//! Web server configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the status web server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebConfig {
    /// Host to bind the server to
    pub host: String,
    /// Port to bind the server to
    pub port: u16,
    /// Whether to enable CORS
    pub enable_cors: bool,
    /// Maximum number of WebSocket connections
    pub max_websocket_connections: usize,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            host: crate::DEFAULT_WEB_HOST.to_string(),
            port: crate::DEFAULT_WEB_PORT,
            enable_cors: true,
            max_websocket_connections: 16,
        }
    }
}

impl WebConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    pub fn with_cors(mut self, enable_cors: bool) -> Self {
        self.enable_cors = enable_cors;
        self
    }

    pub fn with_max_websocket_connections(mut self, max: usize) -> Self {
        self.max_websocket_connections = max;
        self
    }

    /// Get the full bind address.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let config = WebConfig::new("127.0.0.1", 9451)
            .with_cors(false)
            .with_max_websocket_connections(2);
        assert_eq!(config.bind_address(), "127.0.0.1:9451");
        assert!(!config.enable_cors);
        assert_eq!(config.max_websocket_connections, 2);
    }

    #[test]
    fn test_defaults() {
        let config = WebConfig::default();
        assert_eq!(config.port, crate::DEFAULT_WEB_PORT);
        assert!(config.enable_cors);
    }
}
