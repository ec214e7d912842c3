//! # Periodic Task Runner
//!
//! Runs a step function on a dedicated OS thread at roughly fixed intervals,
//! decoupled from the host's frame loop.
//!
//! ## Lifecycle
//!
//! 1. [`PeriodicRunner::start`] spawns the thread and returns immediately.
//! 2. The thread waits out a settle delay, then loops: call the step with the
//!    seconds elapsed since `start`, bump the invocation counter, sleep for the
//!    yield interval.
//! 3. [`PeriodicRunner::stop`] clears the running flag, waits a short grace
//!    period, then joins the thread. No step runs after `stop` returns.
//!
//! ## Failure Policy
//!
//! A step that returns `Err` terminates the runner. The error is logged, written
//! into the diagnostic slot, and handed back by the next call to `stop`. A step
//! that panics is reported the same way as [`SimBridgeError::TaskFailed`].
//!
//! ## Usage
//!
//! ```
//! use fpv_sim_bridge::runner::{PeriodicRunner, RunnerTiming};
//! use std::time::Duration;
//!
//! let timing = RunnerTiming {
//!     settle: Duration::ZERO,
//!     yield_interval: Duration::from_millis(1),
//!     grace: Duration::from_millis(5),
//! };
//! let mut runner = PeriodicRunner::new("status", timing);
//! runner.start(|elapsed, diag| {
//!     diag.set_message(format_args!("t={:.2}", elapsed));
//!     Ok(())
//! })?;
//! runner.stop()?;
//! # Ok::<(), fpv_sim_bridge::error::SimBridgeError>(())
//! ```

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

use crate::config::RunnerConfig;
use crate::error::{Result, SimBridgeError};

/// Maximum length of the diagnostic message in bytes.
pub const MAX_MESSAGE_LEN: usize = 1000;

/// Slice used to keep the settle delay interruptible.
const SETTLE_SLICE: Duration = Duration::from_millis(5);

/// Timing parameters for a [`PeriodicRunner`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunnerTiming {
    /// Delay between `start` and the first step.
    pub settle: Duration,
    /// Sleep between consecutive steps.
    pub yield_interval: Duration,
    /// Wait applied by `stop` before joining.
    pub grace: Duration,
}

impl Default for RunnerTiming {
    fn default() -> Self {
        Self {
            settle: Duration::from_millis(500),
            yield_interval: Duration::from_micros(100),
            grace: Duration::from_millis(30),
        }
    }
}

impl RunnerTiming {
    /// Timing for the `[runner]` section.
    #[must_use]
    pub fn from_config(config: &RunnerConfig) -> Self {
        Self {
            settle: Duration::from_millis(config.settle_ms),
            yield_interval: Duration::from_micros(config.yield_us),
            grace: Duration::from_millis(config.grace_ms),
        }
    }
}

/// Debug state shared between a runner thread and any observer.
///
/// Cloning is cheap; all clones see the same slot and counter. Values are
/// advisory only.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    message: Arc<Mutex<String>>,
    count: Arc<AtomicU32>,
}

impl Diagnostics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the diagnostic message, truncated to [`MAX_MESSAGE_LEN`] bytes.
    pub fn set_message(&self, args: fmt::Arguments<'_>) {
        let mut text = args.to_string();
        if text.len() > MAX_MESSAGE_LEN {
            let mut cut = MAX_MESSAGE_LEN;
            while !text.is_char_boundary(cut) {
                cut -= 1;
            }
            text.truncate(cut);
        }

        let mut slot = self.message.lock().unwrap_or_else(|e| e.into_inner());
        *slot = text;
    }

    /// Returns a copy of the current diagnostic message.
    #[must_use]
    pub fn message(&self) -> String {
        self.message.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Number of completed step invocations.
    #[must_use]
    pub fn count(&self) -> u32 {
        self.count.load(Ordering::Relaxed)
    }

    fn increment(&self) {
        self.count.fetch_add(1, Ordering::Relaxed);
    }
}

/// Background runner invoking a step function until stopped.
#[derive(Debug)]
pub struct PeriodicRunner {
    name: String,
    timing: RunnerTiming,
    diagnostics: Diagnostics,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<Result<()>>>,
}

impl PeriodicRunner {
    /// Creates an idle runner. Nothing is spawned until [`start`](Self::start).
    #[must_use]
    pub fn new(name: impl Into<String>, timing: RunnerTiming) -> Self {
        Self {
            name: name.into(),
            timing,
            diagnostics: Diagnostics::new(),
            running: Arc::new(AtomicBool::new(false)),
            handle: None,
        }
    }

    /// Spawns the runner thread.
    ///
    /// The step receives the wall-clock seconds elapsed since this call and a
    /// handle to the diagnostic slot.
    ///
    /// # Errors
    ///
    /// - `TaskFailed` if the runner is already started
    /// - `Io` if the OS refuses to spawn the thread
    pub fn start<F>(&mut self, mut step: F) -> Result<()>
    where
        F: FnMut(f64, &Diagnostics) -> Result<()> + Send + 'static,
    {
        if self.handle.is_some() {
            return Err(SimBridgeError::TaskFailed(format!(
                "{} already started",
                self.name
            )));
        }

        let started_at = Instant::now();
        let running = Arc::clone(&self.running);
        let diagnostics = self.diagnostics.clone();
        let timing = self.timing;
        let name = self.name.clone();

        running.store(true, Ordering::Release);

        let handle = thread::Builder::new()
            .name(self.name.clone())
            .spawn(move || {
                settle(&running, timing.settle);

                while running.load(Ordering::Acquire) {
                    let elapsed = started_at.elapsed().as_secs_f64();

                    if let Err(e) = step(elapsed, &diagnostics) {
                        error!("{} step failed: {}", name, e);
                        diagnostics.set_message(format_args!("{} failed: {}", name, e));
                        running.store(false, Ordering::Release);
                        return Err(e);
                    }

                    diagnostics.increment();
                    thread::sleep(timing.yield_interval);
                }

                debug!("{} loop exited after {} steps", name, diagnostics.count());
                Ok(())
            });

        match handle {
            Ok(handle) => {
                self.handle = Some(handle);
                debug!("{} started", self.name);
                Ok(())
            }
            Err(e) => {
                self.running.store(false, Ordering::Release);
                Err(SimBridgeError::Io(e))
            }
        }
    }

    /// Stops the runner and joins its thread.
    ///
    /// Idempotent: stopping an idle runner returns `Ok(())`.
    ///
    /// # Errors
    ///
    /// Returns the error that terminated the step loop, or `TaskFailed` if the
    /// step panicked.
    pub fn stop(&mut self) -> Result<()> {
        let Some(handle) = self.handle.take() else {
            return Ok(());
        };

        self.running.store(false, Ordering::Release);
        thread::sleep(self.timing.grace);

        match handle.join() {
            Ok(result) => {
                debug!("{} stopped", self.name);
                result
            }
            Err(_) => Err(SimBridgeError::TaskFailed(format!(
                "{} step panicked",
                self.name
            ))),
        }
    }

    /// True while the step loop is live.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
            && self.running.load(Ordering::Acquire)
    }

    /// Handle to this runner's diagnostic slot and invocation counter.
    #[must_use]
    pub fn diagnostics(&self) -> Diagnostics {
        self.diagnostics.clone()
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for PeriodicRunner {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            warn!("{} stopped with error: {}", self.name, e);
        }
    }
}

/// Sleeps for `total`, returning early once `running` is cleared.
fn settle(running: &AtomicBool, total: Duration) {
    let deadline = Instant::now() + total;
    while running.load(Ordering::Acquire) {
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        thread::sleep(SETTLE_SLICE.min(deadline - now));
    }
}
