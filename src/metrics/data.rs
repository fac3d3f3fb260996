//! Data structures for monitored metrics.

use super::series::{Band, Limits, MetricSeries, Trend, ValidRange};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Megabit per second divisor applied to speed test results (bits/s).
pub const MBITS_PER_SEC: f64 = 1_048_576.0;

/// Upper bound for plausible download/upload speeds in Mbps.
pub const MAX_SPEED_MB: f64 = 3000.0;

/// Every quantity the monitor knows how to sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    Temperature,
    Pressure,
    Humidity,
    Download,
    Upload,
    Ping,
    Number1,
    Number2,
}

impl MetricKind {
    pub const ENVIRONMENT: [MetricKind; 3] = [
        MetricKind::Temperature,
        MetricKind::Pressure,
        MetricKind::Humidity,
    ];
    pub const SPEED: [MetricKind; 3] = [MetricKind::Download, MetricKind::Upload, MetricKind::Ping];
    pub const DEMO: [MetricKind; 2] = [MetricKind::Number1, MetricKind::Number2];

    /// Stable key used for feeds, JSON and logs.
    pub fn key(&self) -> &'static str {
        match self {
            MetricKind::Temperature => "temperature",
            MetricKind::Pressure => "pressure",
            MetricKind::Humidity => "humidity",
            MetricKind::Download => "download",
            MetricKind::Upload => "upload",
            MetricKind::Ping => "ping",
            MetricKind::Number1 => "number1",
            MetricKind::Number2 => "number2",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            MetricKind::Temperature => "Temperature",
            MetricKind::Pressure => "Pressure",
            MetricKind::Humidity => "Humidity",
            MetricKind::Download => "Download",
            MetricKind::Upload => "Upload",
            MetricKind::Ping => "Ping",
            MetricKind::Number1 => "Number 1",
            MetricKind::Number2 => "Number 2",
        }
    }

    pub fn unit(&self) -> &'static str {
        match self {
            MetricKind::Temperature => "C",
            MetricKind::Pressure => "hPa",
            MetricKind::Humidity => "%",
            MetricKind::Download | MetricKind::Upload => "Mbps",
            MetricKind::Ping => "ms",
            MetricKind::Number1 | MetricKind::Number2 => "",
        }
    }

    /// Plausible sensor range. Values outside are hidden from displays.
    pub fn valid_range(&self) -> ValidRange {
        match self {
            // HTS221 / LPS25H operating ranges
            MetricKind::Temperature => ValidRange::new(Some(-40.0), Some(120.0)),
            MetricKind::Pressure => ValidRange::new(Some(260.0), Some(1260.0)),
            MetricKind::Humidity => ValidRange::new(Some(0.0), Some(100.0)),
            MetricKind::Download | MetricKind::Upload => {
                ValidRange::new(Some(0.0), Some(MAX_SPEED_MB))
            }
            MetricKind::Ping => ValidRange::new(Some(0.0), None),
            MetricKind::Number1 | MetricKind::Number2 => ValidRange::UNBOUNDED,
        }
    }

    /// Default display limits, if the metric has meaningful bands.
    pub fn default_limits(&self) -> Option<Limits> {
        let limits = match self {
            MetricKind::Temperature => [4.0, 18.0, 28.0, 35.0],
            MetricKind::Pressure => [250.0, 650.0, 1013.25, 1015.0],
            MetricKind::Humidity => [20.0, 30.0, 60.0, 70.0],
            _ => return None,
        };
        Limits::new(limits).ok()
    }

    /// Create an empty series for this metric.
    pub fn new_series(&self, capacity: usize) -> MetricSeries {
        MetricSeries::new(capacity, None, self.label(), self.unit())
            .with_valid_range(self.valid_range())
            .with_limits(self.default_limits())
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// One sample per metric, produced by a sampler.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub values: Vec<(MetricKind, f64)>,
}

impl Reading {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, kind: MetricKind, value: f64) -> Self {
        self.set(kind, value);
        self
    }

    /// Set (or replace) the value for `kind`.
    pub fn set(&mut self, kind: MetricKind, value: f64) {
        match self.values.iter_mut().find(|(k, _)| *k == kind) {
            Some(entry) => entry.1 = value,
            None => self.values.push((kind, value)),
        }
    }

    pub fn get(&self, kind: MetricKind) -> Option<f64> {
        self.values
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, v)| *v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (MetricKind, f64)> + '_ {
        self.values.iter().copied()
    }
}

/// Ordered collection of series for one monitor mode.
///
/// Series order defines LED display modes `1..=len`; mode 0 shows sparkles.
#[derive(Debug, Clone)]
pub struct MetricSet {
    series: Vec<(MetricKind, MetricSeries)>,
}

impl MetricSet {
    pub fn new(kinds: &[MetricKind], capacity: usize) -> Self {
        Self {
            series: kinds
                .iter()
                .map(|kind| (*kind, kind.new_series(capacity)))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    pub fn kinds(&self) -> impl Iterator<Item = MetricKind> + '_ {
        self.series.iter().map(|(kind, _)| *kind)
    }

    pub fn get(&self, kind: MetricKind) -> Option<&MetricSeries> {
        self.series
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, s)| s)
    }

    pub fn get_mut(&mut self, kind: MetricKind) -> Option<&mut MetricSeries> {
        self.series
            .iter_mut()
            .find(|(k, _)| *k == kind)
            .map(|(_, s)| s)
    }

    /// Series shown in LED display `mode` (1-based).
    pub fn for_display_mode(&self, mode: usize) -> Option<(MetricKind, &MetricSeries)> {
        mode.checked_sub(1)
            .and_then(|idx| self.series.get(idx))
            .map(|(kind, s)| (*kind, s))
    }

    /// Append every value in `reading` that belongs to this set.
    pub fn append(&mut self, reading: &Reading) {
        for (kind, value) in reading.iter() {
            if let Some(series) = self.get_mut(kind) {
                series.append(value);
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (MetricKind, &MetricSeries)> {
        self.series.iter().map(|(kind, s)| (*kind, s))
    }
}

/// Serializable view of one series for dashboards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesSnapshot {
    pub kind: MetricKind,
    pub label: String,
    pub unit: String,
    /// Latest valid value
    pub latest: Option<f64>,
    /// True if the latest sample is valid or simply missing
    pub latest_ok: bool,
    pub trend: Trend,
    pub band: Option<Band>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub limits: Option<[f64; 4]>,
    /// Recent display values, oldest first
    pub sparkline: Vec<Option<f64>>,
}

impl SeriesSnapshot {
    pub fn from_series(kind: MetricKind, series: &MetricSeries, width: usize, threshold: f64) -> Self {
        let latest = series.latest();
        let (min, max) = series.display_min_max(width).unzip();

        Self {
            kind,
            label: series.label().to_string(),
            unit: series.unit().to_string(),
            latest,
            latest_ok: latest.is_some() || series.latest_raw().is_none(),
            trend: series.trend(threshold),
            band: latest.and_then(|v| series.classify(v)),
            min,
            max,
            limits: series.limits().map(|l| l.as_array()),
            sparkline: series.display_slice(width),
        }
    }
}

/// Status of the most recent upload attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    Pending,
    Ok,
    Throttled,
}

/// Upload counters shown in dashboards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadSnapshot {
    pub count: u32,
    pub max: u32,
    pub status: UploadStatus,
    pub last_upload: Option<DateTime<Utc>>,
    pub next_upload_in_secs: u64,
    pub current_delay_secs: u64,
}

impl Default for UploadSnapshot {
    fn default() -> Self {
        Self {
            count: 0,
            max: 0,
            status: UploadStatus::Pending,
            last_upload: None,
            next_upload_in_secs: 0,
            current_delay_secs: 0,
        }
    }
}

/// Everything a dashboard needs to draw one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardSnapshot {
    pub app: String,
    pub timestamp: DateTime<Utc>,
    pub display_mode: usize,
    pub action: Option<String>,
    pub series: Vec<SeriesSnapshot>,
    pub uploads: UploadSnapshot,
}

impl DashboardSnapshot {
    /// An empty snapshot used before the first loop iteration.
    pub fn empty(app: impl Into<String>) -> Self {
        Self {
            app: app.into(),
            timestamp: Utc::now(),
            display_mode: 0,
            action: None,
            series: Vec::new(),
            uploads: UploadSnapshot::default(),
        }
    }
}
