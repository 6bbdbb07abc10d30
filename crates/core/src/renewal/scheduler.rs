use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Handles of the active periodic check.
struct ActiveCheck {
    cancel: CancellationToken,
    ticker: JoinHandle<()>,
    consumer: Option<JoinHandle<()>>,
}

/// Emits ticks on a fixed period until stopped.
///
/// At most one check is active; the scheduler keeps its handles so callers
/// can ask whether one is running.
#[derive(Default)]
pub struct IntervalScheduler {
    active: Mutex<Option<ActiveCheck>>,
}

/// Receiving side of a periodic check.
pub struct Ticks {
    rx: mpsc::Receiver<Instant>,
    cancel: CancellationToken,
}

impl Ticks {
    /// Wait for the next tick. `None` once the check was stopped.
    pub async fn next(&mut self) -> Option<Instant> {
        tokio::select! {
            () = self.cancel.cancelled() => None,
            tick = self.rx.recv() => tick,
        }
    }
}

impl IntervalScheduler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start ticking every `period`, first tick one period from now.
    ///
    /// Returns `None` if a check is already running. Ticks that arrive while
    /// the previous one is still being processed are dropped, not queued.
    pub fn start_periodic_token_check(&self, period: Duration) -> Option<Ticks> {
        let mut active = self.active.lock();
        if active.as_ref().is_some_and(|check| !check.cancel.is_cancelled()) {
            debug!("periodic token check already running");
            return None;
        }

        let cancel = CancellationToken::new();
        let (tx, rx) = mpsc::channel(1);
        let ticker_cancel = cancel.clone();
        let ticker = tokio::spawn(async move {
            let mut interval = interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    () = ticker_cancel.cancelled() => break,
                    tick = interval.tick() => {
                        if tx.try_send(tick).is_err() {
                            debug!("previous tick still pending, dropping tick");
                        }
                    }
                }
            }
        });

        info!(period_secs = period.as_secs_f64(), "periodic token check started");
        *active = Some(ActiveCheck { cancel: cancel.clone(), ticker, consumer: None });
        Some(Ticks { rx, cancel })
    }

    /// Tie the task that consumes the ticks to the active check so that
    /// stopping the check also ends it.
    pub fn attach_consumer(&self, consumer: JoinHandle<()>) {
        match self.active.lock().as_mut() {
            Some(check) => check.consumer = Some(consumer),
            None => consumer.abort(),
        }
    }

    #[must_use]
    pub fn is_token_validation_running(&self) -> bool {
        self.active.lock().as_ref().is_some_and(|check| !check.cancel.is_cancelled())
    }

    /// Stop ticking. Safe to call from inside the consumer task.
    pub fn stop_periodic_token_check(&self) {
        if let Some(check) = self.active.lock().take() {
            check.cancel.cancel();
            check.ticker.abort();
            info!("periodic token check stopped");
            // The consumer exits on cancellation; it may be the caller.
            drop(check.consumer);
        }
    }
}

impl Drop for IntervalScheduler {
    fn drop(&mut self) {
        if let Some(check) = self.active.get_mut().take() {
            check.cancel.cancel();
            check.ticker.abort();
        }
    }
}
