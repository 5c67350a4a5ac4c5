//! Server-side auto-test timer.
//!
//! [`AutoTester`] owns at most one background task that calls
//! [`TestRunner::run`] once per interval until stopped. The task awaits each
//! probe before waiting for the next tick, so probes never overlap; ticks
//! missed while a slow probe was running are delayed rather than bunched.

use std::time::Duration;

use thiserror::Error;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};

use crate::runner::TestRunner;
use crate::storage::{LogRecord, StorageError, TestMode};

/// Default timeout for graceful shutdown.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors that can occur while controlling the timer.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Interval is zero or too large to schedule.
    #[error("interval must be greater than zero and schedulable")]
    InvalidInterval,

    /// The immediate probe on start could not be logged.
    #[error("failed to record probe: {0}")]
    Storage(#[from] StorageError),
}

/// Snapshot of the timer state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutoStatus {
    pub running: bool,
    /// Current interval, or the one the next start will use.
    pub interval: Duration,
}

/// Result of [`AutoTester::start`].
#[derive(Debug, Clone)]
pub struct StartReport {
    /// The timer was already running; only its interval was updated.
    pub already_running: bool,
    pub interval: Duration,
    /// Outcome of the immediate probe run on a fresh start.
    pub first_result: Option<LogRecord>,
}

struct AutoTask {
    stop_tx: watch::Sender<bool>,
    interval_tx: watch::Sender<Duration>,
    handle: JoinHandle<()>,
}

impl AutoTask {
    fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }
}

struct State {
    interval: Duration,
    task: Option<AutoTask>,
    generation: u64,
}

/// Start/stop controller for periodic probing.
pub struct AutoTester {
    runner: TestRunner,
    state: Mutex<State>,
}

impl AutoTester {
    /// Create a stopped timer. `default_interval` is reported by
    /// [`status`](Self::status) until the first start.
    pub fn new(runner: TestRunner, default_interval: Duration) -> Self {
        Self {
            runner,
            state: Mutex::new(State {
                interval: default_interval,
                task: None,
                generation: 0,
            }),
        }
    }

    /// Start the timer, or update its interval if it is already running.
    ///
    /// A fresh start probes once immediately and returns that record; the
    /// following probes run once per `interval`. If that first record cannot
    /// be written the timer is stopped again and the error returned.
    pub async fn start(&self, interval: Duration) -> Result<StartReport, SchedulerError> {
        if interval.is_zero() || Instant::now().checked_add(interval).is_none() {
            return Err(SchedulerError::InvalidInterval);
        }

        let generation = {
            let mut state = self.state.lock().await;
            state.interval = interval;

            if let Some(task) = state.task.as_ref().filter(|t| t.is_running()) {
                // Receiver only goes away when the task exits.
                let _ = task.interval_tx.send(interval);
                tracing::info!(interval = ?interval, "Auto test already running, interval updated");
                return Ok(StartReport {
                    already_running: true,
                    interval,
                    first_result: None,
                });
            }

            let (stop_tx, stop_rx) = watch::channel(false);
            let (interval_tx, interval_rx) = watch::channel(interval);
            let handle = tokio::spawn(run_loop(self.runner.clone(), interval_rx, stop_rx));
            state.generation += 1;
            state.task = Some(AutoTask {
                stop_tx,
                interval_tx,
                handle,
            });
            tracing::info!(interval = ?interval, "Auto test started");
            state.generation
        };

        match self.runner.run(TestMode::Auto).await {
            Ok(record) => Ok(StartReport {
                already_running: false,
                interval,
                first_result: Some(record),
            }),
            Err(e) => {
                let mut state = self.state.lock().await;
                if state.generation == generation {
                    if let Some(task) = state.task.take() {
                        let _ = task.stop_tx.send(true);
                    }
                }
                tracing::error!(error = %e, "Auto test start aborted");
                Err(e.into())
            }
        }
    }

    /// Stop future probes. A probe already in progress completes and is
    /// logged. Returns whether the timer was running.
    pub async fn stop(&self) -> bool {
        let task = self.state.lock().await.task.take();
        match task {
            Some(task) => {
                let was_running = task.is_running();
                let _ = task.stop_tx.send(true);
                tracing::info!(was_running, "Auto test stopped");
                was_running
            }
            None => false,
        }
    }

    pub async fn status(&self) -> AutoStatus {
        let state = self.state.lock().await;
        AutoStatus {
            running: state.task.as_ref().is_some_and(AutoTask::is_running),
            interval: state.interval,
        }
    }

    /// Stop the timer and wait for an in-flight probe to finish.
    pub async fn shutdown(&self) {
        self.shutdown_with_timeout(DEFAULT_SHUTDOWN_TIMEOUT).await;
    }

    /// Shutdown with custom timeout.
    pub async fn shutdown_with_timeout(&self, timeout: Duration) {
        let Some(task) = self.state.lock().await.task.take() else {
            return;
        };
        let _ = task.stop_tx.send(true);

        match tokio::time::timeout(timeout, task.handle).await {
            Ok(Ok(())) => tracing::info!("Auto test shutdown complete"),
            Ok(Err(e)) => tracing::error!(error = %e, "Auto test task failed"),
            Err(_) => tracing::warn!("Auto test shutdown timed out"),
        }
    }
}

impl std::fmt::Debug for AutoTester {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AutoTester")
            .field("runner", &self.runner)
            .finish_non_exhaustive()
    }
}

/// `None` when the first deadline would overflow the clock.
fn new_ticker(period: Duration) -> Option<Interval> {
    let start = Instant::now().checked_add(period)?;
    let mut ticker = tokio::time::interval_at(start, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    Some(ticker)
}

async fn run_loop(
    runner: TestRunner,
    mut interval_rx: watch::Receiver<Duration>,
    mut stop_rx: watch::Receiver<bool>,
) {
    let Some(mut ticker) = new_ticker(*interval_rx.borrow_and_update()) else {
        tracing::error!("Auto test interval out of range, loop not started");
        return;
    };

    loop {
        tokio::select! {
            _ = stop_rx.changed() => break,
            changed = interval_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let period = *interval_rx.borrow_and_update();
                match new_ticker(period) {
                    Some(next) => ticker = next,
                    None => tracing::warn!(interval = ?period, "Ignoring out-of-range interval"),
                }
                continue;
            }
            _ = ticker.tick() => {}
        }

        if *stop_rx.borrow() {
            break;
        }

        // Not raced against stop: an in-flight probe always completes.
        if let Err(e) = runner.run(TestMode::Auto).await {
            tracing::error!(error = %e, "Scheduled connectivity test failed");
        }
    }

    tracing::debug!("Auto test loop exited");
}
