//! Rotating progress messages shown while a generation is outstanding.
//!
//! The ticker says nothing about real backend progress; it only cycles
//! through a fixed list so the user sees that work is happening.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Progress labels, in display order.
pub const STATUS_MESSAGES: [&str; 5] = [
    "Analyzing prompt semantics...",
    "Sampling latent space...",
    "Synthesizing high-res textures...",
    "Rendering visual composition...",
    "Applying final artistic polish...",
];

/// Time between message changes.
pub const TICK_PERIOD: Duration = Duration::from_secs(3);

/// Index displayed after `ticks` periods.
pub fn phase_index(ticks: u64) -> usize {
    (ticks % STATUS_MESSAGES.len() as u64) as usize
}

/// Snapshot published by a running ticker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickerStatus {
    /// Index into [`STATUS_MESSAGES`].
    pub step: usize,
}

impl TickerStatus {
    fn after(ticks: u64) -> Self {
        Self {
            step: phase_index(ticks),
        }
    }

    /// The label for this step.
    pub fn message(&self) -> &'static str {
        STATUS_MESSAGES[self.step]
    }

    /// Fraction of the progress bar to fill, in `(0, 1]`.
    pub fn progress(&self) -> f32 {
        (self.step + 1) as f32 / STATUS_MESSAGES.len() as f32
    }
}

/// Publishes a rotating [`TickerStatus`], or `None` while idle.
#[derive(Debug)]
pub struct StatusTicker {
    tx: Arc<watch::Sender<Option<TickerStatus>>>,
    period: Duration,
}

impl Default for StatusTicker {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusTicker {
    /// Creates an idle ticker with the standard period.
    pub fn new() -> Self {
        Self::with_period(TICK_PERIOD)
    }

    /// Creates an idle ticker that advances every `period`.
    pub fn with_period(period: Duration) -> Self {
        let (tx, _rx) = watch::channel(None);
        Self {
            tx: Arc::new(tx),
            period,
        }
    }

    /// Returns a receiver that observes status changes.
    pub fn subscribe(&self) -> watch::Receiver<Option<TickerStatus>> {
        self.tx.subscribe()
    }

    /// Current status, `None` when no ticker task is running.
    pub fn current(&self) -> Option<TickerStatus> {
        *self.tx.borrow()
    }

    /// Starts the periodic task. It runs until the returned guard is dropped.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(&self) -> TickerGuard {
        self.tx.send_replace(Some(TickerStatus::after(0)));

        let stopped = Arc::new(AtomicBool::new(false));
        let tx = Arc::clone(&self.tx);
        let task_stopped = Arc::clone(&stopped);
        let period = self.period;
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            let mut ticks: u64 = 0;
            loop {
                interval.tick().await;
                ticks += 1;
                // `abort()` cannot interrupt a poll that is already running on
                // another worker, so the stop flag is checked under the
                // channel's write lock.
                let published = tx.send_if_modified(|status| {
                    if task_stopped.load(Ordering::Acquire) {
                        return false;
                    }
                    *status = Some(TickerStatus::after(ticks));
                    true
                });
                if !published {
                    break;
                }
            }
        });

        TickerGuard {
            tx: Arc::clone(&self.tx),
            stopped,
            handle,
        }
    }
}

/// Keeps a ticker task alive; dropping it stops the task and resets status.
#[must_use = "the ticker stops as soon as the guard is dropped"]
#[derive(Debug)]
pub struct TickerGuard {
    tx: Arc<watch::Sender<Option<TickerStatus>>>,
    stopped: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl Drop for TickerGuard {
    fn drop(&mut self) {
        self.stopped.store(true, Ordering::Release);
        self.handle.abort();
        self.tx.send_replace(None);
    }
}
