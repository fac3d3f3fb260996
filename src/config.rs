//! Runtime settings loaded from `settings.toml`.

use crate::error::{MonitorError, Result};
use crate::metrics::collector::{DEFAULT_CPU_TEMPS_MAXLEN, DEFAULT_TEMP_COMP_FACTOR};
use crate::metrics::data::MetricKind;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::Level;

/// Default settings file name, looked up in the working directory.
pub const DEFAULT_SETTINGS_FILE: &str = "settings.toml";

/// Default delay between uploads in seconds
pub const DEF_FREQ: u64 = 600;
/// Default delay before the first upload in seconds
pub const DEF_DELAY: u64 = 300;
/// Default delay between sensor reads in seconds
pub const DEF_WAIT: u64 = 1;
/// Default additional delay on throttling in seconds
pub const DEF_THROTTLE: u64 = 120;
/// Default rounding precision for uploaded data
pub const DEF_ROUNDING: u32 = 2;
/// Default LED idle time before sleeping, in seconds
pub const DEF_SLEEP: u64 = 600;

/// Settings file contents. Every key is optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "SCREAMING_SNAKE_CASE")]
pub struct Settings {
    pub freq: u64,
    pub delay: u64,
    pub wait: u64,
    pub throttle: u64,
    pub rounding: u32,

    pub aio_username: Option<String>,
    pub aio_key: Option<String>,

    pub feed_temps: Option<String>,
    pub feed_press: Option<String>,
    pub feed_humid: Option<String>,
    pub feed_dwnld: Option<String>,
    pub feed_upld: Option<String>,
    pub feed_ping: Option<String>,

    pub loglvl: Option<String>,

    pub rotation: u16,
    pub display: usize,
    pub progress: bool,
    pub sleep: u64,

    pub temp_comp: f64,
    pub cpu_temps_maxlen: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            freq: DEF_FREQ,
            delay: DEF_DELAY,
            wait: DEF_WAIT,
            throttle: DEF_THROTTLE,
            rounding: DEF_ROUNDING,
            aio_username: None,
            aio_key: None,
            feed_temps: None,
            feed_press: None,
            feed_humid: None,
            feed_dwnld: None,
            feed_upld: None,
            feed_ping: None,
            loglvl: None,
            rotation: 0,
            display: 0,
            progress: false,
            sleep: DEF_SLEEP,
            temp_comp: DEFAULT_TEMP_COMP_FACTOR,
            cpu_temps_maxlen: DEFAULT_CPU_TEMPS_MAXLEN,
        }
    }
}

impl Settings {
    /// Parse and validate settings from TOML text.
    pub fn from_toml(text: &str) -> Result<Self> {
        let settings: Settings = toml::from_str(text)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            MonitorError::config_error(format!("Cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&text)
    }

    /// Load settings from `path` if it exists, defaults otherwise.
    ///
    /// The flag is true when the file was missing, so callers can report it
    /// once logging is set up.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<(Self, bool)> {
        let path = path.as_ref();
        if path.exists() {
            Ok((Self::load(path)?, false))
        } else {
            Ok((Self::default(), true))
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.freq == 0 {
            return Err(MonitorError::config_error("FREQ must be greater than zero"));
        }
        if self.rounding > 10 {
            return Err(MonitorError::config_error("ROUNDING must be between 0 and 10"));
        }
        if !matches!(self.rotation, 0 | 90 | 180 | 270) {
            return Err(MonitorError::config_error(format!(
                "ROTATION must be 0, 90, 180 or 270 (got {})",
                self.rotation
            )));
        }
        if !self.temp_comp.is_finite() || self.temp_comp < 0.0 {
            return Err(MonitorError::config_error("TEMP_COMP must be zero or positive"));
        }
        if let Some(level) = &self.loglvl {
            parse_log_level(level)?;
        }
        Ok(())
    }

    pub fn upload_interval(&self) -> Duration {
        Duration::from_secs(self.freq)
    }

    pub fn initial_delay(&self) -> Duration {
        Duration::from_secs(self.delay)
    }

    pub fn throttle_increment(&self) -> Duration {
        Duration::from_secs(self.throttle)
    }

    pub fn sleep_after(&self) -> Duration {
        Duration::from_secs(self.sleep)
    }

    /// Wait between readings, never shorter than `min_wait`.
    pub fn read_wait(&self, min_wait: Duration) -> Duration {
        Duration::from_secs(self.wait).max(min_wait)
    }

    /// Configured log level, if any.
    pub fn log_level(&self) -> Result<Option<Level>> {
        self.loglvl.as_deref().map(parse_log_level).transpose()
    }

    /// Feed key configured for a metric.
    pub fn feed_for(&self, kind: MetricKind) -> Option<&str> {
        match kind {
            MetricKind::Temperature => self.feed_temps.as_deref(),
            MetricKind::Pressure => self.feed_press.as_deref(),
            MetricKind::Humidity => self.feed_humid.as_deref(),
            MetricKind::Download => self.feed_dwnld.as_deref(),
            MetricKind::Upload => self.feed_upld.as_deref(),
            MetricKind::Ping => self.feed_ping.as_deref(),
            MetricKind::Number1 | MetricKind::Number2 => Some(kind.key()),
        }
    }

    /// Feed keys for every metric in `kinds`; all of them must be configured.
    pub fn feeds_for(&self, kinds: &[MetricKind]) -> Result<Vec<(MetricKind, String)>> {
        kinds
            .iter()
            .map(|kind| {
                self.feed_for(*kind)
                    .map(|feed| (*kind, feed.to_string()))
                    .ok_or_else(|| {
                        MonitorError::config_error(format!("No feed configured for {}", kind))
                    })
            })
            .collect()
    }

    /// Adafruit IO credentials.
    pub fn aio_credentials(&self) -> Result<(&str, &str)> {
        match (self.aio_username.as_deref(), self.aio_key.as_deref()) {
            (Some(user), Some(key)) if !user.is_empty() && !key.is_empty() => Ok((user, key)),
            _ => Err(MonitorError::config_error(
                "AIO_USERNAME and AIO_KEY are required for uploads",
            )),
        }
    }
}

/// Accepts the usual level names, including `WARNING` and `CRITICAL`.
pub fn parse_log_level(level: &str) -> Result<Level> {
    match level.trim().to_ascii_uppercase().as_str() {
        "TRACE" => Ok(Level::TRACE),
        "DEBUG" => Ok(Level::DEBUG),
        "INFO" => Ok(Level::INFO),
        "WARN" | "WARNING" => Ok(Level::WARN),
        "ERROR" | "CRITICAL" => Ok(Level::ERROR),
        other => Err(MonitorError::config_error(format!(
            "Unknown log level: {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_gives_defaults() {
        let settings = Settings::from_toml("").unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.upload_interval(), Duration::from_secs(600));
        assert_eq!(settings.initial_delay(), Duration::from_secs(300));
        assert_eq!(settings.throttle_increment(), Duration::from_secs(120));
        assert_eq!(settings.rounding, 2);
    }

    #[test]
    fn test_uppercase_keys() {
        let settings = Settings::from_toml(
            r#"
            FREQ = 60
            DELAY = 10
            THROTTLE = 30
            ROUNDING = 1
            AIO_USERNAME = "f451"
            AIO_KEY = "aio_secret"
            FEED_TEMPS = "pif451.temperature"
            LOGLVL = "DEBUG"
            ROTATION = 180
            PROGRESS = true
            UNKNOWN_KEY = "ignored"
            "#,
        )
        .unwrap();

        assert_eq!(settings.freq, 60);
        assert_eq!(settings.delay, 10);
        assert_eq!(settings.throttle, 30);
        assert_eq!(settings.rounding, 1);
        assert_eq!(settings.rotation, 180);
        assert!(settings.progress);
        assert_eq!(settings.wait, DEF_WAIT);
        assert_eq!(settings.log_level().unwrap(), Some(Level::DEBUG));
        assert_eq!(settings.aio_credentials().unwrap(), ("f451", "aio_secret"));
        assert_eq!(
            settings.feed_for(MetricKind::Temperature),
            Some("pif451.temperature")
        );
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(Settings::from_toml("FREQ = 0").is_err());
        assert!(Settings::from_toml("ROTATION = 45").is_err());
        assert!(Settings::from_toml("LOGLVL = \"LOUD\"").is_err());
        assert!(Settings::from_toml("TEMP_COMP = -1.0").is_err());
        assert!(Settings::from_toml("FREQ = \"often\"").is_err());
    }

    #[test]
    fn test_read_wait_respects_minimum() {
        let settings = Settings::default();
        assert_eq!(
            settings.read_wait(Duration::from_secs(300)),
            Duration::from_secs(300)
        );
        assert_eq!(settings.read_wait(Duration::from_secs(1)), Duration::from_secs(1));
    }

    #[test]
    fn test_missing_feeds_reported() {
        let settings = Settings::from_toml("FEED_DWNLD = \"dl\"\nFEED_UPLD = \"ul\"").unwrap();
        let err = settings.feeds_for(&MetricKind::SPEED).unwrap_err();
        assert!(err.to_string().contains("ping"));

        let demo = settings.feeds_for(&MetricKind::DEMO).unwrap();
        assert_eq!(demo[0].1, "number1");
    }

    #[test]
    fn test_missing_credentials() {
        assert!(Settings::default().aio_credentials().is_err());
    }

    #[test]
    fn test_log_level_names() {
        assert_eq!(parse_log_level("warning").unwrap(), Level::WARN);
        assert_eq!(parse_log_level("CRITICAL").unwrap(), Level::ERROR);
        assert_eq!(parse_log_level(" info ").unwrap(), Level::INFO);
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let (settings, missing) = Settings::load_or_default("/nonexistent/settings.toml").unwrap();
        assert_eq!(settings, Settings::default());
        assert!(missing);
        assert!(Settings::load("/nonexistent/settings.toml").is_err());
    }

    #[test]
    fn test_existing_file_is_loaded() {
        let path = std::env::temp_dir().join(format!("pif451-settings-{}.toml", std::process::id()));
        std::fs::write(&path, "FREQ = 900\nROTATION = 180\n").unwrap();

        let (settings, missing) = Settings::load_or_default(&path).unwrap();
        assert!(!missing);
        assert_eq!(settings.freq, 900);
        assert_eq!(settings.rotation, 180);
        std::fs::remove_file(&path).unwrap();
    }
}
