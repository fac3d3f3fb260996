//! Error handling for the piF451 monitor crate.

/// A specialized `Result` type for monitor operations.
pub type Result<T> = std::result::Result<T, MonitorError>;

/// The main error type for the monitor.
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Settings file could not be parsed
    #[error("Invalid settings file: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Parsing sensor or tool output failed
    #[error("Failed to parse data: {0}")]
    Parse(String),

    /// The cloud service rejected a request or could not be reached.
    /// Treated as fatal by the monitor loop.
    #[error("Request error: {0}")]
    Request(String),

    /// The cloud service asked us to slow down.
    #[error("Throttled by cloud service: {0}")]
    Throttled(String),

    /// Sensor, LED or joystick access failed
    #[error("Device error: {0}")]
    Device(String),

    /// Web server error
    #[error("Web server error: {0}")]
    WebServer(String),
}

impl MonitorError {
    /// Create a new configuration error
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new parse error
    pub fn parse_error(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    /// Create a new request error
    pub fn request_error(msg: impl Into<String>) -> Self {
        Self::Request(msg.into())
    }

    /// Create a new throttling error
    pub fn throttled(msg: impl Into<String>) -> Self {
        Self::Throttled(msg.into())
    }

    /// Create a new device error
    pub fn device_error(msg: impl Into<String>) -> Self {
        Self::Device(msg.into())
    }

    /// Create a new web server error
    pub fn web_server_error(msg: impl Into<String>) -> Self {
        Self::WebServer(msg.into())
    }

    /// Whether this error is a recoverable rate-limit signal.
    pub fn is_throttling(&self) -> bool {
        matches!(self, Self::Throttled(_))
    }
}

impl From<reqwest::Error> for MonitorError {
    fn from(err: reqwest::Error) -> Self {
        Self::Request(err.to_string())
    }
}
