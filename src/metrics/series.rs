//! Bounded rolling series of recent samples with validity ranges,
//! display limits and trend detection.

use crate::error::{MonitorError, Result};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Default number of samples kept per metric.
pub const DEFAULT_CAPACITY: usize = 120;

/// Any relative change below this factor is shown as a flat trend.
pub const DEFAULT_DELTA_FACTOR: f64 = 0.02;

/// Inclusive range of plausible values. Either side may be open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidRange {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl ValidRange {
    pub const UNBOUNDED: ValidRange = ValidRange {
        min: None,
        max: None,
    };

    pub const fn new(min: Option<f64>, max: Option<f64>) -> Self {
        Self { min, max }
    }

    /// Check whether `value` lies inside the range.
    pub fn contains(&self, value: f64) -> bool {
        if value.is_nan() {
            return false;
        }
        self.min.map_or(true, |min| value >= min) && self.max.map_or(true, |max| value <= max)
    }
}

/// Band a value falls into relative to its [`Limits`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Band {
    Low,
    Normal,
    High,
}

/// Four ordered thresholds `[A, B, C, D]`.
///
/// The outer thresholds mark the "dangerously" low/high zones, but only
/// `B` and `C` take part in classification:
///
/// ```text
///      value <= B  -> Low
/// B <  value <= C  -> Normal
/// C <  value       -> High
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Limits([f64; 4]);

impl Limits {
    /// Create limits, rejecting unordered or non-finite thresholds.
    pub fn new(limits: [f64; 4]) -> Result<Self> {
        if limits.iter().any(|l| !l.is_finite()) {
            return Err(MonitorError::config_error(format!(
                "Limits must be finite numbers: {:?}",
                limits
            )));
        }
        if limits.windows(2).any(|pair| pair[0] > pair[1]) {
            return Err(MonitorError::config_error(format!(
                "Limits must be in ascending order: {:?}",
                limits
            )));
        }
        Ok(Self(limits))
    }

    pub fn as_array(&self) -> [f64; 4] {
        self.0
    }

    /// Classify a value. Every value maps to exactly one band.
    pub fn classify(&self, value: f64) -> Band {
        if value > self.0[2] {
            Band::High
        } else if value <= self.0[1] {
            Band::Low
        } else {
            Band::Normal
        }
    }
}

/// Direction of change between two consecutive samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Up,
    Down,
    Flat,
}

/// Compare the current and previous sample.
///
/// Missing values and relative changes below `threshold` are `Flat`.
pub fn trend(current: Option<f64>, previous: Option<f64>, threshold: f64) -> Trend {
    let (Some(current), Some(previous)) = (current, previous) else {
        return Trend::Flat;
    };

    let delta = current - previous;
    if previous != 0.0 && (delta / previous).abs() < threshold {
        return Trend::Flat;
    }

    if delta > 0.0 {
        Trend::Up
    } else if delta < 0.0 {
        Trend::Down
    } else {
        Trend::Flat
    }
}

/// Fixed-capacity FIFO of recent samples for one metric.
#[derive(Debug, Clone)]
pub struct MetricSeries {
    samples: VecDeque<Option<f64>>,
    capacity: usize,
    valid_range: ValidRange,
    limits: Option<Limits>,
    unit: String,
    label: String,
}

impl MetricSeries {
    /// Create a series pre-filled with `default` so it is never empty.
    ///
    /// A zero capacity is bumped to one.
    pub fn new(
        capacity: usize,
        default: Option<f64>,
        label: impl Into<String>,
        unit: impl Into<String>,
    ) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: std::iter::repeat(default).take(capacity).collect(),
            capacity,
            valid_range: ValidRange::UNBOUNDED,
            limits: None,
            unit: unit.into(),
            label: label.into(),
        }
    }

    pub fn with_valid_range(mut self, range: ValidRange) -> Self {
        self.valid_range = range;
        self
    }

    pub fn with_limits(mut self, limits: Option<Limits>) -> Self {
        self.limits = limits;
        self
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn unit(&self) -> &str {
        &self.unit
    }

    pub fn valid_range(&self) -> ValidRange {
        self.valid_range
    }

    pub fn limits(&self) -> Option<Limits> {
        self.limits
    }

    /// Push a new sample, dropping the oldest one.
    pub fn append(&mut self, value: f64) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(Some(value));
    }

    /// Raw samples, oldest first.
    pub fn samples(&self) -> impl DoubleEndedIterator<Item = Option<f64>> + ExactSizeIterator + '_ {
        self.samples.iter().copied()
    }

    /// The last `k` raw samples, oldest first.
    pub fn recent_slice(&self, k: usize) -> Vec<Option<f64>> {
        let skip = self.samples.len().saturating_sub(k);
        self.samples.iter().skip(skip).copied().collect()
    }

    /// The last `k` samples with invalid values replaced by `None`.
    pub fn display_slice(&self, k: usize) -> Vec<Option<f64>> {
        self.recent_slice(k)
            .into_iter()
            .map(|sample| self.validate(sample))
            .collect()
    }

    /// Return the sample if it is present and inside the valid range.
    pub fn validate(&self, sample: Option<f64>) -> Option<f64> {
        sample.filter(|v| self.valid_range.contains(*v))
    }

    /// Most recent valid sample.
    pub fn latest(&self) -> Option<f64> {
        self.validate(self.samples.back().copied().flatten())
    }

    /// Raw most recent sample, even if it is out of range.
    pub fn latest_raw(&self) -> Option<f64> {
        self.samples.back().copied().flatten()
    }

    /// Second most recent valid sample.
    pub fn previous(&self) -> Option<f64> {
        let len = self.samples.len();
        if len < 2 {
            return None;
        }
        self.validate(self.samples[len - 2])
    }

    /// Min/max over every valid sample in the buffer.
    pub fn min_max(&self) -> Option<(f64, f64)> {
        fold_min_max(self.samples.iter().map(|s| self.validate(*s)))
    }

    /// Min/max over the last `k` display values.
    pub fn display_min_max(&self, k: usize) -> Option<(f64, f64)> {
        fold_min_max(self.display_slice(k))
    }

    /// Band for `value`, if this series has limits.
    pub fn classify(&self, value: f64) -> Option<Band> {
        self.limits.map(|limits| limits.classify(value))
    }

    /// Trend between the two most recent valid samples.
    pub fn trend(&self, threshold: f64) -> Trend {
        trend(self.latest(), self.previous(), threshold)
    }
}

fn fold_min_max(values: impl IntoIterator<Item = Option<f64>>) -> Option<(f64, f64)> {
    values
        .into_iter()
        .flatten()
        .fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
}
