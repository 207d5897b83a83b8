//! Poll scheduler
//!
//! Runs poll cycles at a fixed interval on a Tokio task. The stop signal is
//! observed between cycles, so a cycle in progress always finishes.

use crate::poller::{CycleReport, Poller};
use crate::ports::http::HttpTransport;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Notify;
use tracing::{error, info, warn};

/// Errors that can occur during scheduler operations
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Scheduler is already running
    #[error("Scheduler is already running")]
    AlreadyRunning,

    /// Scheduler is not running
    #[error("Scheduler is not running")]
    NotRunning,
}

/// Consecutive failing cycles before a warning is logged
pub const DEFAULT_MAX_CONSECUTIVE_FAILURES: u64 = 5;

/// Scheduler driving a [`Poller`] at a fixed interval
///
/// The first cycle runs immediately after `start()`; each later one follows
/// the previous by `interval`.
pub struct PollScheduler<T>
where
    T: HttpTransport + 'static,
{
    poller: Arc<Poller<T>>,
    interval: Duration,
    /// Flag to indicate if scheduler is running
    running: Arc<AtomicBool>,
    /// Signal to stop the scheduler
    stop_signal: Arc<Notify>,
    /// Cycles in a row with at least one failing source
    consecutive_failures: Arc<AtomicU64>,
    /// Total cycles run since start
    cycles_completed: Arc<AtomicU64>,
    max_consecutive_failures: u64,
}

impl<T> PollScheduler<T>
where
    T: HttpTransport + 'static,
{
    /// Creates a new scheduler
    ///
    /// # Arguments
    /// * `poller` - The poller executing each cycle
    /// * `interval` - Pause between the end of one cycle and the next
    pub fn new(poller: Arc<Poller<T>>, interval: Duration) -> Self {
        Self {
            poller,
            interval,
            running: Arc::new(AtomicBool::new(false)),
            stop_signal: Arc::new(Notify::new()),
            consecutive_failures: Arc::new(AtomicU64::new(0)),
            cycles_completed: Arc::new(AtomicU64::new(0)),
            max_consecutive_failures: DEFAULT_MAX_CONSECUTIVE_FAILURES,
        }
    }

    /// Returns whether the scheduler is currently running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Returns the number of consecutive failing cycles
    pub fn consecutive_failures(&self) -> u64 {
        self.consecutive_failures.load(Ordering::SeqCst)
    }

    /// Returns the number of cycles run so far
    pub fn cycles_completed(&self) -> u64 {
        self.cycles_completed.load(Ordering::SeqCst)
    }

    /// Returns the pause between cycles
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Starts the polling loop
    ///
    /// Spawns a background task that runs until `stop()` is called.
    ///
    /// # Errors
    /// Returns `SchedulerError::AlreadyRunning` if scheduler is already active
    pub async fn start(&self) -> Result<(), SchedulerError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(SchedulerError::AlreadyRunning);
        }

        let poller = Arc::clone(&self.poller);
        let interval = self.interval;
        let running = Arc::clone(&self.running);
        let stop_signal = Arc::clone(&self.stop_signal);
        let consecutive_failures = Arc::clone(&self.consecutive_failures);
        let cycles_completed = Arc::clone(&self.cycles_completed);
        let max_failures = self.max_consecutive_failures;

        if poller.sources().is_empty() {
            warn!("No sensor source configured; cycles will only sleep");
        }

        tokio::spawn(async move {
            info!("Starting polling with interval: {:?}", interval);

            loop {
                let report = poller.poll_once().await;
                cycles_completed.fetch_add(1, Ordering::SeqCst);

                if report.is_success() {
                    consecutive_failures.store(0, Ordering::SeqCst);
                } else {
                    let failures = consecutive_failures.fetch_add(1, Ordering::SeqCst) + 1;
                    error!(
                        "{} of {} sources failed this cycle",
                        report.failures(),
                        report.sources.len()
                    );

                    if failures >= max_failures {
                        warn!("Polling has failed {} consecutive cycles", failures);
                    }
                }

                info!("Sleeping for {:?}", interval);
                tokio::select! {
                    _ = stop_signal.notified() => {
                        info!("Received stop signal, shutting down scheduler");
                        break;
                    }
                    _ = tokio::time::sleep(interval) => {}
                }
            }

            running.store(false, Ordering::SeqCst);
            info!("Scheduler stopped");
        });

        Ok(())
    }

    /// Stops the polling loop
    ///
    /// Sends a stop signal and waits for the background task to finish its
    /// current cycle.
    ///
    /// # Errors
    /// Returns `SchedulerError::NotRunning` if scheduler is not active
    pub async fn stop(&self) -> Result<(), SchedulerError> {
        if !self.running.load(Ordering::SeqCst) {
            return Err(SchedulerError::NotRunning);
        }

        info!("Stopping scheduler...");
        self.stop_signal.notify_one();

        while self.running.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        Ok(())
    }

    /// Runs a single cycle immediately, outside the loop
    pub async fn poll_now(&self) -> CycleReport {
        self.poller.poll_once().await
    }
}
