//! piF451 - Sense HAT environment / internet speed monitor.
//!
//! Reads sensors on a loop, shows the data on the Sense HAT LED matrix and
//! in the terminal, and uploads it to Adafruit IO.

use anyhow::Context;
use clap::{Parser, Subcommand};
use pif451::{
    config::{Settings, DEFAULT_SETTINGS_FILE},
    device::{
        self, joystick, led, DisplayState, FramebufferMatrix, SenseHatSensors,
    },
    metrics::{
        collector::{read_cpu_temperature, read_rpi_serial},
        DemoSampler, SpeedTestSampler,
    },
    upload::{AdafruitClient, FeedClient, FeedUploader, LoggingFeedClient, UploadScheduler},
    DashboardSnapshot, EnvironmentSampler, Monitor, MonitorOptions, Sampler, TerminalDashboard,
    WebConfig, DEFAULT_WEB_HOST, DEFAULT_WEB_PORT,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tracing::{debug, info, level_filters::LevelFilter, warn, Level};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "pif451")]
#[command(about = "piF451 - Sense HAT monitor with Adafruit IO uploads")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Settings file [default: settings.toml]
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Also write logs to this file
    #[arg(long, global = true)]
    log: Option<PathBuf>,

    /// Stop after this many uploads
    #[arg(long, global = true, default_value_t = 0)]
    uploads: u32,

    /// Show upload progress bar on the LED
    #[arg(long, global = true)]
    progress: bool,

    /// Do not show the terminal dashboard
    #[arg(long, global = true)]
    no_cli: bool,

    /// Start with the LED turned off
    #[arg(long, global = true)]
    no_led: bool,

    /// Exit after the first successful upload
    #[arg(long, global = true)]
    cron: bool,

    /// Serve a status page and JSON API
    #[arg(long, global = true)]
    web: bool,

    /// Status server bind address
    #[arg(long, global = true, default_value = DEFAULT_WEB_HOST)]
    host: String,

    /// Status server port
    #[arg(short, long, global = true, default_value_t = DEFAULT_WEB_PORT)]
    port: u16,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Commands {
    /// Monitor Sense HAT temperature, pressure and humidity
    Sensemon,
    /// Monitor internet download/upload speed and ping
    Sysmon,
    /// Random numbers, no hardware or cloud account needed
    Demo,
    /// Show device and configuration information
    Info,
}

impl Commands {
    fn app_name(self) -> &'static str {
        match self {
            Commands::Sensemon => "SenseMon",
            Commands::Sysmon => "SysMon",
            Commands::Demo => "DemoMon",
            Commands::Info => "piF451",
        }
    }
}

/// Settings plus whether the default file was missing, reported once logging is up.
fn load_settings(cli: &Cli) -> anyhow::Result<(Settings, bool)> {
    match &cli.config {
        Some(path) => Ok((
            Settings::load(path).with_context(|| format!("Loading {}", path.display()))?,
            false,
        )),
        None => Ok(Settings::load_or_default(DEFAULT_SETTINGS_FILE)?),
    }
}

fn log_level(cli: &Cli, settings: &Settings) -> anyhow::Result<Level> {
    if cli.debug {
        return Ok(Level::DEBUG);
    }
    Ok(settings.log_level()?.unwrap_or(Level::WARN))
}

fn init_logging(cli: &Cli, level: Level) -> anyhow::Result<Option<WorkerGuard>> {
    let filter = || {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(LevelFilter::from_level(level).to_string()))
    };

    // Console logs go to stderr so the dashboard owns stdout
    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .with_filter(filter());

    let (file_layer, guard) = match &cli.log {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("."));
            let file_name = path
                .file_name()
                .context("Log path has no file name")?;
            let appender = tracing_appender::rolling::never(dir, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_file(true)
                .with_line_number(true)
                .with_filter(filter());
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .context("Unable to set a global subscriber")?;

    Ok(guard)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let (settings, missing_default) = load_settings(&cli)?;
    let _guard = init_logging(&cli, log_level(&cli, &settings)?)?;

    if missing_default {
        warn!("{} not found, using default settings", DEFAULT_SETTINGS_FILE);
    }
    debug!(?settings, "Settings loaded");

    match cli.command {
        Commands::Info => info_command(&settings).await,
        Commands::Sensemon => {
            let sensors = SenseHatSensors::new().context("Sense HAT sensors unavailable")?;
            let sampler = EnvironmentSampler::new(
                sensors,
                settings.temp_comp,
                settings.cpu_temps_maxlen.max(1),
            )
            .await;
            run_monitor(&cli, &settings, sampler).await
        }
        Commands::Sysmon => run_monitor(&cli, &settings, SpeedTestSampler::new()).await,
        Commands::Demo => run_monitor(&cli, &settings, DemoSampler::new()).await,
    }
}

async fn run_monitor<S: Sampler>(cli: &Cli, settings: &Settings, sampler: S) -> anyhow::Result<()> {
    let app_name = cli.command.app_name();
    info!("Starting {} v{}", app_name, env!("CARGO_PKG_VERSION"));

    let client: Arc<dyn FeedClient> = if cli.command == Commands::Demo {
        Arc::new(LoggingFeedClient)
    } else {
        let (username, key) = settings.aio_credentials()?;
        Arc::new(AdafruitClient::new(username, key)?)
    };
    let feeds = settings.feeds_for(sampler.kinds())?;
    let uploader = FeedUploader::new(client, feeds, settings.rounding);
    uploader
        .verify_feeds()
        .await
        .context("Unable to reach Adafruit IO feeds")?;

    let now = Instant::now();
    let scheduler = UploadScheduler::new(
        settings.upload_interval(),
        settings.initial_delay(),
        settings.throttle_increment(),
        cli.uploads,
        now,
    );

    let state = DisplayState::new(
        sampler.kinds().len(),
        settings.display,
        settings.rotation,
        settings.sleep_after(),
        cli.no_led,
        now,
    );
    let device = device::Device::new(
        state,
        device::default_matrix(),
        cli.progress || settings.progress,
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let shutdown_tx = Arc::new(shutdown_tx);
    {
        let shutdown_tx = shutdown_tx.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Interrupted, shutting down");
                shutdown_tx.send_replace(true);
            }
        });
    }

    let read_wait = settings.read_wait(sampler.min_wait());
    let options = MonitorOptions {
        app_name: app_name.to_string(),
        cron: cli.cron,
        ..Default::default()
    };
    let mut monitor = Monitor::new(sampler, uploader, scheduler, device, read_wait, options);

    let (joy_tx, joy_rx) = mpsc::unbounded_channel();
    match joystick::spawn_joystick_reader(joy_tx) {
        Ok(_) => monitor = monitor.with_joystick(joy_rx),
        Err(e) => debug!("Joystick disabled: {}", e),
    }

    if !cli.no_cli {
        monitor = monitor.with_dashboard(TerminalDashboard::default());
    }

    let web_task = if cli.web {
        let (snap_tx, snap_rx) = watch::channel(DashboardSnapshot::empty(app_name));
        monitor = monitor.with_publisher(snap_tx);
        let config = WebConfig::new(&cli.host, cli.port);
        let shutdown = shutdown_rx.clone();
        Some(tokio::spawn(async move {
            if let Err(e) = pif451::start_web_server(config, snap_rx, shutdown).await {
                warn!("Status server stopped: {}", e);
            }
        }))
    } else {
        None
    };

    let result = monitor.run(shutdown_rx).await;

    shutdown_tx.send_replace(true);
    if let Some(task) = web_task {
        let _ = task.await;
    }

    let summary = result?;
    println!();
    println!("{}", summary);
    Ok(())
}

async fn info_command(settings: &Settings) -> anyhow::Result<()> {
    use sysinfo::System;

    println!("piF451 Device Information");
    println!("=========================");
    println!();

    println!("System:");
    println!(
        "  Hostname: {}",
        System::host_name().unwrap_or_else(|| "unknown".to_string())
    );
    println!(
        "  OS: {}",
        System::long_os_version().unwrap_or_else(|| "unknown".to_string())
    );
    println!(
        "  Kernel: {}",
        System::kernel_version().unwrap_or_else(|| "unknown".to_string())
    );
    if let Some(serial) = read_rpi_serial() {
        println!("  Pi serial: {}", serial);
    }
    if let Some(temp) = read_cpu_temperature().await {
        println!("  CPU temperature: {:.1}°C", temp);
    }
    println!();

    println!("Sense HAT:");
    match FramebufferMatrix::detect() {
        Some(Ok(fb)) => println!("  LED matrix: {}", fb.path().display()),
        Some(Err(e)) => println!("  LED matrix: {}", e),
        None => println!("  LED matrix: not found"),
    }
    match joystick::find_event_device(
        std::path::Path::new("/sys/class/input"),
        joystick::JOYSTICK_NAME,
    ) {
        Some(path) => println!("  Joystick: {}", path.display()),
        None => println!("  Joystick: not found"),
    }
    match SenseHatSensors::new() {
        Ok(_) => println!("  Sensors: ok"),
        Err(e) => println!("  Sensors: {}", e),
    }
    println!("  LED size: {}x{}", led::WIDTH, led::HEIGHT);
    println!();

    println!("Settings:");
    println!("  Upload every: {}s (first after {}s)", settings.freq, settings.delay);
    println!("  Throttle backoff: +{}s", settings.throttle);
    println!(
        "  Adafruit IO user: {}",
        settings.aio_username.as_deref().unwrap_or("(not set)")
    );
    println!();

    println!("Features compiled:");
    #[cfg(feature = "sensehat")]
    println!("  - Sense HAT sensors: ✓");
    #[cfg(not(feature = "sensehat"))]
    println!("  - Sense HAT sensors: ✗");

    Ok(())
}
