//! # Polling Loop
//!
//! Background thread that keeps the most recent input report available.
//!
//! The loop only reads and publishes; decoding happens when the caller asks
//! for state. Reports are published through a `tokio::sync::watch` channel,
//! so a reader always copies out a complete 49-byte report and never a
//! half-written one.
//!
//! ## Shutdown
//!
//! Stopping is cooperative: [`PollingLoop::stop`] sets a flag the loop checks
//! between reads. Every read is bounded by the configured read timeout, so
//! shutdown latency is at most one read timeout on a healthy transport.
//! [`PollingLoop::join`] waits up to a deadline and detaches the thread if
//! it has not finished, so callers can always go on and close the handle.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::error::Result;
use crate::protocol::report::{RawReport, INPUT_REPORT_SIZE};
use crate::transport::Transport;

/// Granularity of the join deadline check
const JOIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Lifecycle of the background loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollStatus {
    Running,
    Stopped,
    /// Terminated by a transport read failure
    Failed(String),
}

/// Handle to a running polling thread
pub struct PollingLoop {
    name: String,
    stop: Arc<AtomicBool>,
    received: Arc<AtomicU64>,
    reports: watch::Receiver<RawReport>,
    status: watch::Receiver<PollStatus>,
    handle: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for PollingLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollingLoop")
            .field("name", &self.name)
            .field("status", &*self.status.borrow())
            .field("received", &self.received())
            .finish_non_exhaustive()
    }
}

impl PollingLoop {
    /// Start polling `transport` on a dedicated thread
    ///
    /// # Arguments
    ///
    /// * `name` - Controller name, used for the thread name and logs
    /// * `transport` - Open device handle shared with the caller
    /// * `read_timeout` - Upper bound on each blocking read
    ///
    /// # Errors
    ///
    /// Returns `Io` if the thread cannot be spawned.
    pub fn spawn(name: &str, transport: Arc<dyn Transport>, read_timeout: Duration) -> Result<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let received = Arc::new(AtomicU64::new(0));
        let (report_tx, reports) = watch::channel(RawReport::default());
        let (status_tx, status) = watch::channel(PollStatus::Running);

        let worker = Worker {
            name: name.to_string(),
            stop: Arc::clone(&stop),
            received: Arc::clone(&received),
            transport,
            read_timeout,
            report_tx,
            status_tx,
        };

        let handle = std::thread::Builder::new()
            .name(format!("{}-poll", name.to_lowercase().replace(' ', "-")))
            .spawn(move || worker.run())?;

        Ok(Self {
            name: name.to_string(),
            stop,
            received,
            reports,
            status,
            handle: Some(handle),
        })
    }

    /// Most recent complete report, all zeros before the first one arrives
    pub fn latest(&self) -> RawReport {
        *self.reports.borrow()
    }

    /// Number of reports published so far
    pub fn received(&self) -> u64 {
        self.received.load(Ordering::Acquire)
    }

    pub fn status(&self) -> PollStatus {
        self.status.borrow().clone()
    }

    /// Ask the loop to exit after its current read
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    /// Wait up to `timeout` for the thread to exit
    ///
    /// Returns `true` if the thread finished. On timeout the thread is
    /// detached and `false` is returned.
    pub fn join(&mut self, timeout: Duration) -> bool {
        let Some(handle) = self.handle.take() else {
            return true;
        };

        let deadline = Instant::now() + timeout;
        while !handle.is_finished() {
            if Instant::now() >= deadline {
                warn!(
                    "Polling loop for {} did not stop within {:?}, detaching",
                    self.name, timeout
                );
                return false;
            }
            std::thread::sleep(JOIN_POLL_INTERVAL);
        }

        if handle.join().is_err() {
            error!("Polling loop for {} panicked", self.name);
        }
        true
    }
}

impl Drop for PollingLoop {
    fn drop(&mut self) {
        self.stop();
    }
}

/// State moved onto the polling thread
struct Worker {
    name: String,
    stop: Arc<AtomicBool>,
    received: Arc<AtomicU64>,
    transport: Arc<dyn Transport>,
    read_timeout: Duration,
    report_tx: watch::Sender<RawReport>,
    status_tx: watch::Sender<PollStatus>,
}

impl Worker {
    fn run(self) {
        info!("Start listening {}", self.name);
        let mut buf = [0u8; INPUT_REPORT_SIZE];

        while !self.stop.load(Ordering::Acquire) {
            match self.transport.read_timeout(&mut buf, self.read_timeout) {
                Ok(0) => continue,
                Ok(INPUT_REPORT_SIZE) => {
                    self.report_tx.send_replace(RawReport::new(buf));
                    self.received.fetch_add(1, Ordering::Release);
                }
                Ok(n) => {
                    debug!("{}: dropping {}-byte report", self.name, n);
                }
                Err(e) => {
                    error!("{}: read failed, polling stopped: {}", self.name, e);
                    self.status_tx.send_replace(PollStatus::Failed(e.to_string()));
                    return;
                }
            }
        }

        self.status_tx.send_replace(PollStatus::Stopped);
        info!("Stop listening {}", self.name);
    }
}
