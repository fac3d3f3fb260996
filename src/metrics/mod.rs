//! Metric samplers, rolling series and the data structures built on them.
//!
//! This module provides everything between a raw reading and a display:
//! samplers for the Sense HAT environment sensors, the internet speed test
//! and the demo generator, plus the bounded series each reading is
//! buffered into.

pub mod collector;
pub mod data;
pub mod demo;
pub mod series;
pub mod speedtest;
pub mod traits;

// Re-export commonly used items
pub use collector::EnvironmentSampler;
pub use data::{DashboardSnapshot, MetricKind, MetricSet, Reading};
pub use demo::DemoSampler;
pub use series::{Band, Limits, MetricSeries, Trend, ValidRange};
pub use speedtest::SpeedTestSampler;
pub use traits::{EnvironmentSensors, Sampler};
