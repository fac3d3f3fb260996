//! Traits for metric sampling.

use crate::error::Result;
use crate::metrics::data::{MetricKind, Reading};
use async_trait::async_trait;
use std::time::Duration;

/// Source of readings for the monitor loop.
///
/// Implementations wrap a sensor board, an external measurement tool or a
/// generator. Each call to [`Sampler::sample`] produces one value for every
/// kind listed by [`Sampler::kinds`].
#[async_trait]
pub trait Sampler: Send {
    /// Metric kinds produced, in display order.
    fn kinds(&self) -> &[MetricKind];

    /// Take one reading.
    async fn sample(&mut self) -> Result<Reading>;

    /// Shortest allowed pause between two readings.
    fn min_wait(&self) -> Duration {
        Duration::from_secs(1)
    }
}

/// Raw environment sensors, as found on the Sense HAT.
pub trait EnvironmentSensors: Send {
    /// Temperature in degrees Celsius
    fn temperature(&mut self) -> Result<f64>;

    /// Barometric pressure in hPa
    fn pressure(&mut self) -> Result<f64>;

    /// Relative humidity in percent
    fn humidity(&mut self) -> Result<f64>;
}
