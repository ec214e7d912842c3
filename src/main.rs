//! # FPV Sim Bridge
//!
//! Fly unmodified flight-control firmware against a simulated quadcopter.
//!
//! The binary runs a headless session: gamepad input feeds the built-in mixer
//! firmware, motor commands drive a kinematic body, and the firmware's UART is
//! exposed on a local TCP port for ground-station tools.
//!
//! # Control Flow
//!
//! 1. **Initialization**
//!    - Load configuration (first argument, `config/default.toml`, or defaults)
//!    - Set up logging with tracing subscriber
//!    - Open the input device and bind the serial bridge
//!
//! 2. **Main Loop**
//!    - Tick the control loop at `tick_rate_hz`
//!    - Integrate the body and record tick reports
//!    - Report tick rate and link state from a background runner
//!
//! 3. **Graceful Shutdown**
//!    - Stop the status runner
//!    - Disconnect the serial client and close the bridge
//!    - Flush the flight recording
//!
//! # Examples
//!
//! ```bash
//! cargo run --release -- config/default.toml
//! ```
//!
//! Expected output:
//! ```text
//! INFO fpv_sim_bridge: FPV Sim Bridge v0.1.0 starting...
//! INFO fpv_sim_bridge::serial::transport: Serial bridge listening on 127.0.0.1:20000
//! INFO fpv_sim_bridge: Control loop running at 100Hz
//! INFO fpv_sim_bridge: 100 ticks/s, link down
//! ```

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use fpv_sim_bridge::board::SimBoard;
use fpv_sim_bridge::config::{Config, LoggingConfig};
use fpv_sim_bridge::controller::calibration::StickCalibration;
use fpv_sim_bridge::controller::profile::ProfileRegistry;
use fpv_sim_bridge::controller::Receiver;
use fpv_sim_bridge::driver::ControlLoop;
use fpv_sim_bridge::firmware::MixerFirmware;
use fpv_sim_bridge::host::KinematicBody;
use fpv_sim_bridge::runner::{PeriodicRunner, RunnerTiming};
use fpv_sim_bridge::serial::SerialBridge;
use fpv_sim_bridge::telemetry::FlightRecorder;

/// Configuration file used when none is given on the command line
const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// A failing tick is logged again only after this many more in a row
const TICK_ERROR_REPEAT: u64 = 500;

/// Streak of consecutive tick failures, so a persistent fault is not logged
/// every frame.
#[derive(Debug, Default)]
struct TickFailures {
    streak: u64,
}

impl TickFailures {
    /// Counts a failure. Returns `true` for the first one and every
    /// `TICK_ERROR_REPEAT`th after it.
    fn fail(&mut self) -> bool {
        self.streak += 1;
        self.streak == 1 || self.streak % TICK_ERROR_REPEAT == 0
    }

    /// Ends the streak, returning how many ticks it lasted.
    fn recover(&mut self) -> u64 {
        std::mem::take(&mut self.streak)
    }

    fn streak(&self) -> u64 {
        self.streak
    }
}

/// Counters shared between the tick loop and the status runner.
#[derive(Debug, Clone, Default)]
struct LoopStats {
    ticks: Arc<AtomicU64>,
    link_up: Arc<AtomicBool>,
}

fn status_line(ticks_per_sec: f64, link_up: bool) -> String {
    format!(
        "{:.0} ticks/s, link {}",
        ticks_per_sec,
        if link_up { "up" } else { "down" }
    )
}

fn load_config() -> Result<Config> {
    if let Some(path) = std::env::args().nth(1) {
        return Config::load(&path).with_context(|| format!("Failed to load {}", path));
    }
    if Path::new(DEFAULT_CONFIG_PATH).exists() {
        return Config::load(DEFAULT_CONFIG_PATH)
            .with_context(|| format!("Failed to load {}", DEFAULT_CONFIG_PATH));
    }
    Ok(Config::default())
}

/// Installs the global subscriber. The returned guard must outlive the
/// session or buffered file output is lost.
fn init_logging(config: &LoggingConfig) -> Option<WorkerGuard> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    match &config.dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "fpv-sim-bridge.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer())
                .with(fmt::layer().with_writer(writer).with_ansi(false))
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer())
                .init();
            None
        }
    }
}

fn spawn_status_runner(config: &Config, stats: &LoopStats) -> Result<PeriodicRunner> {
    let mut runner = PeriodicRunner::new("status", RunnerTiming::from_config(&config.runner));
    let period = config.runner.report_interval_ms.max(1) as f64 / 1000.0;
    let stats = stats.clone();
    let mut last_report = 0.0_f64;
    let mut last_ticks = 0_u64;

    runner.start(move |elapsed, diagnostics| {
        if elapsed - last_report >= period {
            let ticks = stats.ticks.load(Ordering::Relaxed);
            let rate = (ticks - last_ticks) as f64 / (elapsed - last_report);
            let line = status_line(rate, stats.link_up.load(Ordering::Relaxed));
            diagnostics.set_message(format_args!("{}", line));
            info!("{}", line);
            last_report = elapsed;
            last_ticks = ticks;
        }
        Ok(())
    })?;
    Ok(runner)
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = load_config()?;
    let _log_guard = init_logging(&config.logging);

    info!("FPV Sim Bridge v{} starting...", env!("CARGO_PKG_VERSION"));

    let receiver = Receiver::open(
        &config.controller.device_path,
        &ProfileRegistry::builtin(),
        StickCalibration::from_config(
            config.controller.deadzone_stick,
            config.controller.expo_roll,
            config.controller.expo_pitch,
            config.controller.expo_yaw,
        ),
    );
    let board = SimBoard::from_config(SerialBridge::from_config(&config.serial), &config.sensors);
    let body = KinematicBody::from_config(&config.dynamics);

    let mut control = ControlLoop::new(
        receiver,
        Box::new(MixerFirmware::default()),
        board,
        body,
        config.dynamics.thrust_factor,
    );
    if let Err(e) = control.start() {
        warn!("{}; continuing without serial", e);
    }

    let mut recorder = if config.telemetry.enabled {
        match FlightRecorder::from_config(&config.telemetry) {
            Ok(recorder) => {
                info!("Recording flight to {}", recorder.dir().display());
                Some(recorder)
            }
            Err(e) => {
                warn!("{}; flight recording disabled", e);
                None
            }
        }
    } else {
        None
    };

    let stats = LoopStats::default();
    let mut status = spawn_status_runner(&config, &stats)?;

    let mut frames = interval(config.tick_period());
    frames.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    info!("Control loop running at {}Hz", config.dynamics.tick_rate_hz);
    info!("Press Ctrl+C to exit");

    let mut last_frame = Instant::now();
    let mut failures = TickFailures::default();

    loop {
        tokio::select! {
            _ = frames.tick() => {
                let now = Instant::now();
                let dt = now.duration_since(last_frame).as_secs_f32();
                last_frame = now;

                let report = match control.tick(dt) {
                    Ok(report) => {
                        let missed = failures.recover();
                        if missed > 0 {
                            info!("Tick recovered after {} failures", missed);
                        }
                        report
                    }
                    Err(e) => {
                        if failures.fail() {
                            error!("Tick failed ({} in a row): {}", failures.streak(), e);
                        }
                        continue;
                    }
                };
                control.vehicle_mut().step(report.dt);

                stats.ticks.fetch_add(1, Ordering::Relaxed);
                stats.link_up.store(report.serial_connected, Ordering::Relaxed);

                if let Some(rec) = recorder.as_mut() {
                    if let Err(e) = rec.record(&report) {
                        warn!("{}; flight recording disabled", e);
                        recorder = None;
                    }
                }
            }

            _ = &mut shutdown => {
                info!("Received Ctrl+C, shutting down...");
                break;
            }
        }
    }

    if let Err(e) = status.stop() {
        error!("Status runner: {}", e);
    }
    control.shutdown();
    if let Some(rec) = recorder.as_mut() {
        if let Err(e) = rec.flush() {
            warn!("{}", e);
        }
    }

    info!("Total ticks: {}", control.ticks());
    Ok(())
}
