use pif451::{
    config::Settings,
    error::MonitorError,
    metrics::{
        data::{DashboardSnapshot, MetricSet, SeriesSnapshot, UploadStatus},
        series::{trend, Band, Limits, MetricSeries, Trend, ValidRange},
        MetricKind, Reading,
    },
    upload::UploadScheduler,
    TerminalDashboard, WebConfig,
};
use std::time::Duration;
use tokio::time::Instant;

/// Buffer never grows past its capacity and keeps the newest samples
#[test]
fn test_series_capacity_and_order() {
    let mut series = MetricSeries::new(5, None, "Ping", "ms");
    for v in 1..=12 {
        series.append(v as f64);
        assert_eq!(series.len(), 5);
    }
    let samples: Vec<_> = series.samples().collect();
    assert_eq!(
        samples,
        vec![Some(8.0), Some(9.0), Some(10.0), Some(11.0), Some(12.0)]
    );
}

/// Every value maps to exactly one band, boundaries included
#[test]
fn test_three_band_classification() {
    let limits = Limits::new([250.0, 650.0, 1013.25, 1015.0]).unwrap();
    assert_eq!(limits.classify(650.0), Band::Low);
    assert_eq!(limits.classify(650.01), Band::Normal);
    assert_eq!(limits.classify(1013.25), Band::Normal);
    assert_eq!(limits.classify(1013.26), Band::High);
    assert_eq!(limits.classify(2000.0), Band::High);
    assert_eq!(limits.classify(-5.0), Band::Low);

    assert!(Limits::new([1.0, 3.0, 2.0, 4.0]).is_err());
}

#[test]
fn test_invalid_samples_hidden_from_display() {
    let mut series = MetricSeries::new(4, None, "Humidity", "%")
        .with_valid_range(ValidRange::new(Some(0.0), Some(100.0)));
    series.append(45.0);
    series.append(-3.0);
    series.append(55.0);
    series.append(100.0);

    assert_eq!(series.samples().filter(|s| s.is_some()).count(), 4);
    assert_eq!(
        series.display_slice(4),
        vec![Some(45.0), None, Some(55.0), Some(100.0)]
    );
    assert_eq!(series.min_max(), Some((45.0, 100.0)));
}

#[test]
fn test_trend_rules() {
    assert_eq!(trend(Some(10.0), Some(9.0), 0.02), Trend::Up);
    assert_eq!(trend(Some(9.0), Some(10.0), 0.02), Trend::Down);
    assert_eq!(trend(Some(10.1), Some(10.0), 0.02), Trend::Flat);
    assert_eq!(trend(None, Some(10.0), 0.02), Trend::Flat);
    assert_eq!(trend(Some(1.0), Some(0.0), 0.02), Trend::Up);
}

#[test]
fn test_scheduler_backoff_sequence() {
    let start = Instant::now();
    let base = Duration::from_secs(600);
    let mut scheduler =
        UploadScheduler::new(base, Duration::from_secs(300), Duration::from_secs(120), 0, start);

    scheduler.record_success(start);
    for n in 1..=4u32 {
        scheduler.record_throttled(start);
        assert_eq!(scheduler.current_delay(), base + Duration::from_secs(120) * n);
    }
    scheduler.record_success(start);
    assert_eq!(scheduler.current_delay(), base);
}

#[test]
fn test_settings_override_defaults() {
    let settings = Settings::from_toml(
        r#"
        FREQ = 900
        FEED_TEMPS = "temps"
        FEED_PRESS = "press"
        FEED_HUMID = "humid"
        "#,
    )
    .unwrap();
    assert_eq!(settings.upload_interval(), Duration::from_secs(900));
    assert_eq!(settings.throttle_increment(), Duration::from_secs(120));

    let feeds = settings.feeds_for(&MetricKind::ENVIRONMENT).unwrap();
    let keys: Vec<_> = feeds.iter().map(|(_, k)| k.as_str()).collect();
    assert_eq!(keys, ["temps", "press", "humid"]);
}

#[test]
fn test_error_types() {
    assert!(MonitorError::throttled("slow down").is_throttling());
    assert!(!MonitorError::request_error("nope").is_throttling());
    let err = MonitorError::config_error("bad");
    assert_eq!(err.to_string(), "Configuration error: bad");
}

#[test]
fn test_web_config() {
    let config = WebConfig::new("127.0.0.1", 3000).with_cors(false);
    assert_eq!(config.bind_address(), "127.0.0.1:3000");
    assert!(!config.enable_cors);
}

/// Snapshot JSON is what the status page consumes
#[test]
fn test_snapshot_json_shape() {
    let mut set = MetricSet::new(&MetricKind::ENVIRONMENT, 10);
    set.append(
        &Reading::new()
            .with(MetricKind::Temperature, 22.0)
            .with(MetricKind::Pressure, 1014.0)
            .with(MetricKind::Humidity, 75.0),
    );

    let mut snapshot = DashboardSnapshot::empty("SenseMon");
    snapshot.series = set
        .iter()
        .map(|(kind, series)| SeriesSnapshot::from_series(kind, series, 8, 0.02))
        .collect();

    let json = serde_json::to_value(&snapshot).unwrap();
    let series = json["series"].as_array().unwrap();
    assert_eq!(series.len(), 3);
    assert_eq!(series[0]["kind"], "temperature");
    assert_eq!(series[0]["band"], "normal");
    assert_eq!(series[1]["band"], "high");
    assert_eq!(series[2]["band"], "high");
    assert_eq!(series[0]["trend"], "flat");
    assert_eq!(series[0]["sparkline"].as_array().unwrap().len(), 8);
    assert_eq!(json["uploads"]["status"], "pending");

    let back: DashboardSnapshot = serde_json::from_value(json).unwrap();
    assert_eq!(back.uploads.status, UploadStatus::Pending);
}

#[test]
fn test_dashboard_lists_every_series() {
    let set = MetricSet::new(&MetricKind::SPEED, 10);
    let mut snapshot = DashboardSnapshot::empty("SysMon");
    snapshot.series = set
        .iter()
        .map(|(kind, series)| SeriesSnapshot::from_series(kind, series, 40, 0.02))
        .collect();

    let text = TerminalDashboard::new(false).render(&snapshot);
    for label in ["Download", "Upload", "Ping"] {
        assert!(text.contains(label), "missing {label}");
    }
    assert!(text.contains("Uploads: 0"));
}
