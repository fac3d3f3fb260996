//! The main sample / upload / display loop.

use crate::dashboard::{TerminalDashboard, SPARKLINE_WIDTH};
use crate::device::{Device, JoystickEvent};
use crate::error::Result;
use crate::metrics::data::{
    DashboardSnapshot, MetricSet, Reading, SeriesSnapshot, UploadSnapshot, UploadStatus,
};
use crate::metrics::series::{DEFAULT_CAPACITY, DEFAULT_DELTA_FACTOR};
use crate::metrics::traits::Sampler;
use crate::upload::{FeedUploader, UploadScheduler};
use chrono::{DateTime, Utc};
use std::fmt;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Knobs for one monitor run.
#[derive(Debug, Clone)]
pub struct MonitorOptions {
    /// Name shown in dashboards and the summary
    pub app_name: String,
    /// Stop after the first successful upload
    pub cron: bool,
    /// Samples kept per metric
    pub capacity: usize,
    /// Pause between loop iterations
    pub tick: Duration,
    /// Relative change below which a trend is flat
    pub delta_threshold: f64,
}

impl Default for MonitorOptions {
    fn default() -> Self {
        Self {
            app_name: "piF451".to_string(),
            cron: false,
            capacity: DEFAULT_CAPACITY,
            tick: crate::LOOP_WAIT,
            delta_threshold: DEFAULT_DELTA_FACTOR,
        }
    }
}

/// Printed when the monitor exits.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub app_name: String,
    pub work_start: DateTime<Utc>,
    pub work_end: DateTime<Utc>,
    pub uploads: u32,
    pub max_uploads: u32,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const TIME_FMT: &str = "%a %b %d, %Y at %H:%M:%S";
        writeln!(f, "{} - Summary", self.app_name)?;
        writeln!(f, "Work start:  {}", self.work_start.format(TIME_FMT))?;
        writeln!(f, "Work end:    {}", self.work_end.format(TIME_FMT))?;
        if self.max_uploads > 0 {
            write!(f, "Num uploads: {} of {}", self.uploads, self.max_uploads)
        } else {
            write!(f, "Num uploads: {}", self.uploads)
        }
    }
}

/// Owns the buffers and drives one sampler until told to stop.
pub struct Monitor<S> {
    sampler: S,
    metrics: MetricSet,
    scheduler: UploadScheduler,
    uploader: FeedUploader,
    device: Device,
    read_wait: Duration,
    options: MonitorOptions,
    dashboard: Option<TerminalDashboard>,
    publisher: Option<watch::Sender<DashboardSnapshot>>,
    joystick: Option<mpsc::UnboundedReceiver<JoystickEvent>>,
    upload_status: UploadStatus,
    last_upload_at: Option<DateTime<Utc>>,
    last_action: Option<String>,
}

impl<S: Sampler> Monitor<S> {
    pub fn new(
        sampler: S,
        uploader: FeedUploader,
        scheduler: UploadScheduler,
        device: Device,
        read_wait: Duration,
        options: MonitorOptions,
    ) -> Self {
        let metrics = MetricSet::new(sampler.kinds(), options.capacity);
        Self {
            sampler,
            metrics,
            scheduler,
            uploader,
            device,
            read_wait,
            options,
            dashboard: None,
            publisher: None,
            joystick: None,
            upload_status: UploadStatus::Pending,
            last_upload_at: None,
            last_action: None,
        }
    }

    pub fn with_dashboard(mut self, dashboard: TerminalDashboard) -> Self {
        self.dashboard = Some(dashboard);
        self
    }

    pub fn with_publisher(mut self, publisher: watch::Sender<DashboardSnapshot>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    pub fn with_joystick(mut self, events: mpsc::UnboundedReceiver<JoystickEvent>) -> Self {
        self.joystick = Some(events);
        self
    }

    pub fn metrics(&self) -> &MetricSet {
        &self.metrics
    }

    pub fn scheduler(&self) -> &UploadScheduler {
        &self.scheduler
    }

    /// Current state as a dashboard snapshot.
    pub fn snapshot(&self, now: Instant) -> DashboardSnapshot {
        DashboardSnapshot {
            app: self.options.app_name.clone(),
            timestamp: Utc::now(),
            display_mode: self.device.state().mode(),
            action: self.last_action.clone(),
            series: self
                .metrics
                .iter()
                .map(|(kind, series)| {
                    SeriesSnapshot::from_series(
                        kind,
                        series,
                        SPARKLINE_WIDTH,
                        self.options.delta_threshold,
                    )
                })
                .collect(),
            uploads: UploadSnapshot {
                count: self.scheduler.upload_count(),
                max: self.scheduler.max_uploads(),
                status: self.upload_status,
                last_upload: self.last_upload_at,
                next_upload_in_secs: self.scheduler.next_upload_in(now).as_secs(),
                current_delay_secs: self.scheduler.current_delay().as_secs(),
            },
        }
    }

    fn apply_joystick(&mut self, now: Instant) {
        let Some(events) = self.joystick.as_mut() else {
            return;
        };
        while let Ok(event) = events.try_recv() {
            let action = self.device.handle(event, now);
            self.last_action = Some(action.describe());
        }
    }

    fn refresh(&mut self, now: Instant) {
        if let Err(e) = self.device.render(&self.metrics, self.scheduler.progress(now)) {
            warn!("LED update failed: {}", e);
        }

        if self.dashboard.is_none() && self.publisher.is_none() {
            return;
        }
        let snapshot = self.snapshot(now);
        if let Some(dashboard) = &self.dashboard {
            if let Err(e) = dashboard.draw(&snapshot) {
                warn!("Dashboard update failed: {}", e);
            }
        }
        if let Some(publisher) = &self.publisher {
            publisher.send_replace(snapshot);
        }
    }

    /// Upload `reading` if due. Returns true after a successful upload.
    ///
    /// The schedule is stamped with `now`, the start of the iteration.
    async fn maybe_upload(&mut self, reading: &Reading, now: Instant) -> Result<bool> {
        if !self.scheduler.is_due(now) {
            return Ok(false);
        }

        match self.uploader.upload(reading).await {
            Ok(sent) => {
                self.scheduler.record_success(now);
                self.upload_status = UploadStatus::Ok;
                self.last_upload_at = Some(Utc::now());
                info!(
                    count = self.scheduler.upload_count(),
                    values = ?sent,
                    "Uploaded readings"
                );
                Ok(true)
            }
            Err(e) if e.is_throttling() => {
                self.scheduler.record_throttled(now);
                self.upload_status = UploadStatus::Throttled;
                warn!(
                    "Throttled, next upload in {}s: {}",
                    self.scheduler.current_delay().as_secs(),
                    e
                );
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Run until shutdown, the upload cap, or (with `cron`) the first upload.
    ///
    /// A non-throttling upload failure ends the run with that error.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) -> Result<RunSummary> {
        let work_start = Utc::now();
        let mut last_read: Option<Instant> = None;
        info!("-- START Data Logging --");

        let outcome = loop {
            if *shutdown.borrow() {
                info!("Shutdown requested");
                break Ok(());
            }

            let now = Instant::now();
            self.apply_joystick(now);
            self.device.update_sleep(now);

            let mut uploaded = false;
            if last_read.map_or(true, |at| now.saturating_duration_since(at) >= self.read_wait) {
                last_read = Some(now);
                match self.sampler.sample().await {
                    Ok(reading) => {
                        debug!(?reading, "New reading");
                        match self.maybe_upload(&reading, now).await {
                            Ok(done) => uploaded = done,
                            Err(e) => {
                                error!("Application terminated: {}", e);
                                break Err(e);
                            }
                        }
                        self.metrics.append(&reading);
                    }
                    Err(e) => warn!("Failed to read sensors: {}", e),
                }
            }

            self.refresh(now);

            if (self.options.cron && uploaded) || self.scheduler.is_finished() {
                break Ok(());
            }

            tokio::select! {
                _ = tokio::time::sleep(self.options.tick) => {}
                Ok(()) = shutdown.changed() => {}
            }
        };

        info!("-- END Data Logging --");
        if let Err(e) = self.device.clear() {
            warn!("Failed to clear LED: {}", e);
        }

        outcome.map(|()| RunSummary {
            app_name: self.options.app_name.clone(),
            work_start,
            work_end: Utc::now(),
            uploads: self.scheduler.upload_count(),
            max_uploads: self.scheduler.max_uploads(),
        })
    }
}
