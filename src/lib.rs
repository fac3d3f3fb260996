//! # piF451 - Raspberry Pi Sense HAT monitor
//!
//! Samples environment readings from a Sense HAT (or internet speed tests,
//! or random demo data), keeps a short rolling history per metric, draws it
//! on the 8x8 LED matrix and a terminal dashboard, and uploads readings to
//! Adafruit IO feeds on a schedule that backs off when the service
//! throttles.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pif451::{
//!     device::{Device, DisplayState, HeadlessMatrix},
//!     metrics::DemoSampler,
//!     upload::{FeedUploader, LoggingFeedClient, UploadScheduler},
//!     Monitor, MonitorOptions, Settings,
//! };
//! use std::sync::Arc;
//! use tokio::time::Instant;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let settings = Settings::default();
//!     let now = Instant::now();
//!     let feeds = settings.feeds_for(&pif451::MetricKind::DEMO)?;
//!     let uploader = FeedUploader::new(Arc::new(LoggingFeedClient), feeds, settings.rounding);
//!     let scheduler = UploadScheduler::new(
//!         settings.upload_interval(),
//!         settings.initial_delay(),
//!         settings.throttle_increment(),
//!         3,
//!         now,
//!     );
//!     let state = DisplayState::new(2, 0, 0, settings.sleep_after(), false, now);
//!     let device = Device::new(state, Box::new(HeadlessMatrix), false);
//!
//!     let (_stop_tx, stop_rx) = tokio::sync::watch::channel(false);
//!     let mut monitor = Monitor::new(
//!         DemoSampler::new(),
//!         uploader,
//!         scheduler,
//!         device,
//!         settings.read_wait(std::time::Duration::ZERO),
//!         MonitorOptions::default(),
//!     );
//!     println!("{}", monitor.run(stop_rx).await?);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod dashboard;
pub mod device;
pub mod error;
pub mod metrics;
pub mod monitor;
pub mod upload;
pub mod web;

use std::time::Duration;

// Re-export public API
pub use config::Settings;
pub use dashboard::TerminalDashboard;
pub use error::{MonitorError, Result};
pub use metrics::{
    DashboardSnapshot, EnvironmentSampler, MetricKind, MetricSeries, Reading, Sampler,
};
pub use monitor::{Monitor, MonitorOptions, RunSummary};
pub use web::{start_web_server, WebConfig};

/// Pause between monitor loop iterations.
pub const LOOP_WAIT: Duration = Duration::from_secs(1);

/// Default status server bind address
pub const DEFAULT_WEB_HOST: &str = "0.0.0.0";

/// Default status server port
pub const DEFAULT_WEB_PORT: u16 = 8451;
