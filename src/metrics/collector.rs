//! Environment sampling with CPU temperature compensation.

use crate::error::Result;
use crate::metrics::{
    data::{MetricKind, Reading},
    series::MetricSeries,
    traits::{EnvironmentSensors, Sampler},
};
use async_trait::async_trait;
use std::fs;
use tokio::process::Command;
use tracing::debug;

/// Default compensation factor for CPU heat bleeding into the temperature sensor.
pub const DEFAULT_TEMP_COMP_FACTOR: f64 = 2.25;

/// Default number of CPU temperatures averaged for compensation.
pub const DEFAULT_CPU_TEMPS_MAXLEN: usize = 5;

/// Corrects the Sense HAT temperature for heat coming off the CPU.
///
/// The board sits right on top of the SoC, so the raw reading runs warm.
/// A short rolling average of CPU temperatures smooths out jitter.
#[derive(Debug, Clone)]
pub struct TemperatureCompensation {
    factor: f64,
    cpu_temps: MetricSeries,
}

impl TemperatureCompensation {
    /// `factor` must be positive; `initial_cpu` pre-fills the average.
    pub fn new(factor: f64, window: usize, initial_cpu: f64) -> Self {
        Self {
            factor,
            cpu_temps: MetricSeries::new(window, Some(initial_cpu), "CPU", "C"),
        }
    }

    /// Add a CPU reading and return the compensated temperature.
    pub fn compensate(&mut self, raw: f64, cpu: f64) -> f64 {
        self.cpu_temps.append(cpu);
        raw - (self.cpu_average() - raw) / self.factor
    }

    pub fn cpu_average(&self) -> f64 {
        let sum: f64 = self.cpu_temps.samples().flatten().sum();
        sum / self.cpu_temps.capacity() as f64
    }
}

/// Where CPU temperatures come from.
#[async_trait]
pub trait CpuTemperatureSource: Send {
    async fn read(&mut self) -> Option<f64>;
}

/// The Raspberry Pi SoC, via sysfs or `vcgencmd`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SocTemperature;

#[async_trait]
impl CpuTemperatureSource for SocTemperature {
    async fn read(&mut self) -> Option<f64> {
        read_cpu_temperature().await
    }
}

/// Sampler for temperature, pressure and humidity.
pub struct EnvironmentSampler<S> {
    sensors: S,
    compensation: Option<TemperatureCompensation>,
    cpu_temp: Box<dyn CpuTemperatureSource>,
}

impl<S: EnvironmentSensors> EnvironmentSampler<S> {
    /// Create a sampler. A `comp_factor` of zero disables compensation.
    pub async fn new(sensors: S, comp_factor: f64, cpu_window: usize) -> Self {
        Self::with_cpu_source(sensors, comp_factor, cpu_window, SocTemperature).await
    }

    /// Create a sampler with a custom CPU temperature source.
    pub async fn with_cpu_source(
        sensors: S,
        comp_factor: f64,
        cpu_window: usize,
        mut cpu_temp: impl CpuTemperatureSource + 'static,
    ) -> Self {
        // Without a CPU temperature (e.g. not on a Pi) compensation is neutralised
        let compensation = if comp_factor > 0.0 {
            cpu_temp
                .read()
                .await
                .map(|cpu| TemperatureCompensation::new(comp_factor, cpu_window, cpu))
        } else {
            None
        };

        Self {
            sensors,
            compensation,
            cpu_temp: Box::new(cpu_temp),
        }
    }

    pub fn is_compensating(&self) -> bool {
        self.compensation.is_some()
    }
}

#[async_trait]
impl<S: EnvironmentSensors> Sampler for EnvironmentSampler<S> {
    fn kinds(&self) -> &[MetricKind] {
        &MetricKind::ENVIRONMENT
    }

    async fn sample(&mut self) -> Result<Reading> {
        let raw = self.sensors.temperature()?;
        let temperature = match self.compensation.as_mut() {
            Some(comp) => match self.cpu_temp.read().await {
                Some(cpu) => {
                    let adjusted = comp.compensate(raw, cpu);
                    debug!(raw, cpu, adjusted, "Compensated temperature");
                    adjusted
                }
                None => raw,
            },
            None => raw,
        };

        let pressure = self.sensors.pressure()?;
        let humidity = self.sensors.humidity()?;

        Ok(Reading::new()
            .with(MetricKind::Temperature, temperature)
            .with(MetricKind::Pressure, pressure)
            .with(MetricKind::Humidity, humidity))
    }
}

/// Read the SoC temperature in Celsius.
///
/// Tries the kernel thermal zone first and falls back to `vcgencmd`.
pub async fn read_cpu_temperature() -> Option<f64> {
    if let Ok(temp_str) = tokio::fs::read_to_string("/sys/class/thermal/thermal_zone0/temp").await {
        if let Some(temp) = parse_millicelsius(&temp_str) {
            return Some(temp);
        }
    }

    let output = Command::new("vcgencmd")
        .arg("measure_temp")
        .output()
        .await
        .ok()?;
    if !output.status.success() {
        return None;
    }
    parse_vcgencmd_temp(&String::from_utf8_lossy(&output.stdout))
}

/// Parse a sysfs thermal zone value (millidegrees Celsius).
fn parse_millicelsius(raw: &str) -> Option<f64> {
    raw.trim()
        .parse::<i64>()
        .ok()
        .map(|milli| milli as f64 / 1000.0)
}

/// Parse `vcgencmd measure_temp` output, e.g. `temp=48.3'C`.
fn parse_vcgencmd_temp(raw: &str) -> Option<f64> {
    raw.trim()
        .strip_prefix("temp=")
        .and_then(|s| s.strip_suffix("'C"))
        .and_then(|s| s.parse::<f64>().ok())
}

/// Read the Raspberry Pi serial number from `/proc/cpuinfo`.
pub fn read_rpi_serial() -> Option<String> {
    let cpuinfo = fs::read_to_string("/proc/cpuinfo").ok()?;
    parse_cpuinfo_serial(&cpuinfo)
}

fn parse_cpuinfo_serial(cpuinfo: &str) -> Option<String> {
    cpuinfo.lines().find_map(|line| {
        let (key, value) = line.split_once(':')?;
        (key.trim() == "Serial").then(|| value.trim().to_string())
    })
}
