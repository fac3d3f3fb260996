//! Plain terminal dashboard: one row per metric plus upload status.

use crate::metrics::data::{DashboardSnapshot, SeriesSnapshot, UploadSnapshot};
use crate::metrics::series::{Band, Trend};
use std::fmt::Write;
use std::io::{self, Write as _};

/// Number of values drawn in each sparkline.
pub const SPARKLINE_WIDTH: usize = 40;

const SPARK_CHARS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

const RESET: &str = "\x1b[0m";
const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";

pub fn trend_glyph(trend: Trend) -> char {
    match trend {
        Trend::Up => '▲',
        Trend::Down => '▼',
        Trend::Flat => '►',
    }
}

fn band_color(band: Band) -> &'static str {
    match band {
        Band::Low => "\x1b[34m",
        Band::Normal => "\x1b[32m",
        Band::High => "\x1b[31m",
    }
}

/// Sparkline over the non-missing values; missing values become spaces.
pub fn sparkline(values: &[Option<f64>]) -> String {
    let start = values.len().saturating_sub(SPARKLINE_WIDTH);
    let values = &values[start..];

    let (min, max) = values
        .iter()
        .flatten()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(*v), hi.max(*v))
        });
    let span = max - min;

    values
        .iter()
        .map(|value| match value {
            None => ' ',
            Some(_) if span <= 0.0 => SPARK_CHARS[SPARK_CHARS.len() / 2 - 1],
            Some(v) => {
                let idx = ((v - min) / span * (SPARK_CHARS.len() - 1) as f64).round() as usize;
                SPARK_CHARS[idx.min(SPARK_CHARS.len() - 1)]
            }
        })
        .collect()
}

fn format_duration(secs: u64) -> String {
    format!("{}:{:02}", secs / 60, secs % 60)
}

/// Renders [`DashboardSnapshot`]s as text.
#[derive(Debug, Clone)]
pub struct TerminalDashboard {
    color: bool,
}

impl Default for TerminalDashboard {
    fn default() -> Self {
        Self::new(true)
    }
}

impl TerminalDashboard {
    pub fn new(color: bool) -> Self {
        Self { color }
    }

    fn render_value(&self, series: &SeriesSnapshot) -> String {
        let text = match series.latest {
            Some(value) if series.unit.is_empty() => format!("{:.1}", value),
            Some(value) => format!("{:.1} {}", value, series.unit),
            None => "--".to_string(),
        };
        match (self.color, series.band) {
            (true, Some(band)) => format!("{}{:>12}{}", band_color(band), text, RESET),
            _ => format!("{:>12}", text),
        }
    }

    fn render_uploads(&self, uploads: &UploadSnapshot) -> String {
        let mut line = if uploads.max > 0 {
            format!("Uploads: {} of {}", uploads.count, uploads.max)
        } else {
            format!("Uploads: {}", uploads.count)
        };
        match uploads.last_upload {
            Some(at) => {
                let _ = write!(line, " | Last: {}", at.format("%H:%M:%S"));
            }
            None => line.push_str(" | Last: --"),
        }
        let _ = write!(
            line,
            " | Next in {}",
            format_duration(uploads.next_upload_in_secs)
        );
        line
    }

    pub fn render(&self, snapshot: &DashboardSnapshot) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "{} | {}",
            snapshot.app,
            snapshot.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
        );
        let _ = writeln!(out, "{}", "-".repeat(16 + 12 + 4 + SPARKLINE_WIDTH));

        for series in &snapshot.series {
            let flag = if series.latest_ok { ' ' } else { '!' };
            let _ = writeln!(
                out,
                "{:<14}{} {} {}  {}",
                series.label,
                flag,
                self.render_value(series),
                trend_glyph(series.trend),
                sparkline(&series.sparkline)
            );
        }

        out.push('\n');
        let _ = writeln!(out, "{}", self.render_uploads(&snapshot.uploads));
        if let Some(action) = &snapshot.action {
            let _ = writeln!(out, "{}", action);
        }
        out
    }

    /// Redraw the dashboard in place on stdout.
    pub fn draw(&self, snapshot: &DashboardSnapshot) -> io::Result<()> {
        let mut stdout = io::stdout().lock();
        write!(stdout, "{}{}", CLEAR_SCREEN, self.render(snapshot))?;
        stdout.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::data::{MetricKind, UploadStatus};
    use chrono::{TimeZone, Utc};

    fn series(latest: Option<f64>, trend: Trend) -> SeriesSnapshot {
        SeriesSnapshot {
            kind: MetricKind::Temperature,
            label: "Temperature".to_string(),
            unit: "C".to_string(),
            latest,
            latest_ok: latest.is_some(),
            trend,
            band: latest.map(|_| Band::Normal),
            min: None,
            max: None,
            limits: None,
            sparkline: vec![Some(1.0), None, Some(8.0)],
        }
    }

    fn snapshot() -> DashboardSnapshot {
        let mut snap = DashboardSnapshot::empty("SenseMon");
        snap.timestamp = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        snap.series = vec![series(Some(21.456), Trend::Up)];
        snap.uploads = UploadSnapshot {
            count: 2,
            max: 5,
            status: UploadStatus::Ok,
            last_upload: Some(Utc.with_ymd_and_hms(2024, 5, 1, 11, 50, 0).unwrap()),
            next_upload_in_secs: 125,
            current_delay_secs: 600,
        };
        snap
    }

    #[test]
    fn test_sparkline_scaling() {
        assert_eq!(sparkline(&[Some(0.0), Some(7.0)]), "▁█");
        assert_eq!(sparkline(&[Some(1.0), None, Some(8.0)]), "▁ █");
        assert_eq!(sparkline(&[Some(3.0), Some(3.0)]), "▄▄");
        assert_eq!(sparkline(&[None, None]), "  ");
    }

    #[test]
    fn test_sparkline_keeps_last_values() {
        let values: Vec<Option<f64>> = (0..100).map(|v| Some(v as f64)).collect();
        let line = sparkline(&values);
        assert_eq!(line.chars().count(), SPARKLINE_WIDTH);
        assert!(line.ends_with('█'));
    }

    #[test]
    fn test_render_rows_and_status() {
        let text = TerminalDashboard::new(false).render(&snapshot());
        assert!(text.starts_with("SenseMon | 2024-05-01 12:00:00 UTC"));
        assert!(text.contains("Temperature"));
        assert!(text.contains("21.5 C"));
        assert!(text.contains('▲'));
        assert!(text.contains("▁ █"));
        assert!(text.contains("Uploads: 2 of 5 | Last: 11:50:00 | Next in 2:05"));
        assert!(!text.contains("\x1b["));
    }

    #[test]
    fn test_render_missing_value() {
        let mut snap = snapshot();
        snap.series = vec![series(None, Trend::Flat)];
        snap.uploads = UploadSnapshot::default();
        let text = TerminalDashboard::new(true).render(&snap);
        assert!(text.contains("--"));
        assert!(text.contains('►'));
        assert!(text.contains("Uploads: 0 | Last: --"));
    }

    #[test]
    fn test_render_colors_band() {
        let text = TerminalDashboard::new(true).render(&snapshot());
        assert!(text.contains("\x1b[32m"));
    }
}
