//! Interval scheduling and cancellation
//!
//! Polling loops run through [`Schedule::run`], which ticks on a fixed
//! interval until a [`CancelToken`] fires or an optional duration elapses.
//! A tick is never dropped mid-way. When the duration elapses during a tick
//! the token is cancelled, and the tick is expected to check it between
//! units of work and return early.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};

/// Cloneable, level-triggered stop signal
#[derive(Debug, Clone)]
pub struct CancelToken {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelToken {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Signal every holder of this token. Idempotent.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once [`cancel`](Self::cancel) has been called
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives in self, so the channel cannot close under us
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

/// Why a scheduled loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Cancelled,
    DurationElapsed,
}

/// Fixed-interval ticker with an optional total duration
#[derive(Debug, Clone)]
pub struct Schedule {
    pub interval: Duration,
    /// None runs until cancelled
    pub duration: Option<Duration>,
}

impl Schedule {
    pub fn new(interval: Duration, duration: Option<Duration>) -> Self {
        Self { interval, duration }
    }

    /// Call `on_tick` with the tick number (from 0) every interval. The first
    /// tick fires immediately. A slow tick delays the next one rather than
    /// causing a burst. Reaching the duration cancels `cancel`.
    pub async fn run<F, Fut>(&self, cancel: &CancelToken, mut on_tick: F) -> StopReason
    where
        F: FnMut(u64) -> Fut,
        Fut: Future<Output = ()>,
    {
        let deadline = self.duration.map(|d| Instant::now() + d);
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut ticks = 0u64;

        let reason = loop {
            if cancel.is_cancelled() {
                break StopReason::Cancelled;
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => break StopReason::Cancelled,
                _ = expired(deadline) => break StopReason::DurationElapsed,
                _ = ticker.tick() => {}
            }

            let mut tick = std::pin::pin!(on_tick(ticks));
            let expired_mid_tick = tokio::select! {
                biased;
                _ = expired(deadline) => true,
                _ = &mut tick => false,
            };
            if expired_mid_tick {
                tracing::debug!(tick = ticks, "Duration elapsed during tick, cancelling");
                cancel.cancel();
                tick.await;
                ticks += 1;
                break StopReason::DurationElapsed;
            }
            ticks += 1;
        };

        if reason == StopReason::DurationElapsed {
            cancel.cancel();
        }
        tracing::debug!(ticks, reason = ?reason, "Schedule stopped");
        reason
    }
}

async fn expired(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending::<()>().await,
    }
}
