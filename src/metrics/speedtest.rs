//! Internet speed sampling via `speedtest-cli`.

use crate::error::{MonitorError, Result};
use crate::metrics::{
    data::{MetricKind, Reading, MBITS_PER_SEC},
    traits::Sampler,
};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info};

/// Minimum pause between two speed tests.
pub const MIN_SPEEDTEST_WAIT: Duration = Duration::from_secs(300);

/// Subset of the `speedtest-cli --json` report we care about.
#[derive(Debug, Deserialize)]
struct SpeedTestReport {
    /// bits per second
    download: f64,
    /// bits per second
    upload: f64,
    /// milliseconds
    ping: f64,
}

/// Runs a full speed test (best server, download, upload) per sample.
pub struct SpeedTestSampler {
    program: String,
}

impl SpeedTestSampler {
    pub fn new() -> Self {
        Self::with_program("speedtest-cli")
    }

    /// Use a different executable, e.g. a wrapper script.
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for SpeedTestSampler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Sampler for SpeedTestSampler {
    fn kinds(&self) -> &[MetricKind] {
        &MetricKind::SPEED
    }

    async fn sample(&mut self) -> Result<Reading> {
        info!("Running speed test ...");
        let output = Command::new(&self.program)
            .args(["--json", "--secure"])
            .output()
            .await
            .map_err(|e| {
                MonitorError::device_error(format!("Failed to run {}: {}", self.program, e))
            })?;

        if !output.status.success() {
            return Err(MonitorError::device_error(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let reading = parse_report(&output.stdout)?;
        debug!(?reading, "Speed test finished");
        Ok(reading)
    }

    fn min_wait(&self) -> Duration {
        MIN_SPEEDTEST_WAIT
    }
}

/// Convert a JSON report into download/upload in Mbps and ping in ms.
fn parse_report(raw: &[u8]) -> Result<Reading> {
    let report: SpeedTestReport = serde_json::from_slice(raw)
        .map_err(|e| MonitorError::parse_error(format!("Invalid speed test report: {}", e)))?;

    Ok(Reading::new()
        .with(MetricKind::Download, report.download / MBITS_PER_SEC)
        .with(MetricKind::Upload, report.upload / MBITS_PER_SEC)
        .with(MetricKind::Ping, report.ping))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_report() {
        let raw = br#"{
            "download": 104857600.0,
            "upload": 20971520.0,
            "ping": 12.5,
            "server": {"name": "Somewhere"},
            "timestamp": "2024-01-01T00:00:00Z"
        }"#;
        let reading = parse_report(raw).unwrap();
        assert_eq!(reading.get(MetricKind::Download), Some(100.0));
        assert_eq!(reading.get(MetricKind::Upload), Some(20.0));
        assert_eq!(reading.get(MetricKind::Ping), Some(12.5));
    }

    #[test]
    fn test_parse_report_rejects_garbage() {
        let err = parse_report(b"Cannot retrieve speedtest configuration").unwrap_err();
        assert!(matches!(err, MonitorError::Parse(_)));
    }

    #[test]
    fn test_speedtest_waits_at_least_five_minutes() {
        let sampler = SpeedTestSampler::new();
        assert_eq!(sampler.min_wait(), Duration::from_secs(300));
        assert_eq!(sampler.kinds(), &MetricKind::SPEED);
    }

    #[tokio::test]
    async fn test_missing_program_is_device_error() {
        let mut sampler = SpeedTestSampler::with_program("definitely-not-a-real-speedtest-binary");
        let err = sampler.sample().await.unwrap_err();
        assert!(matches!(err, MonitorError::Device(_)));
    }
}
