//! Process-wide request spacing
//!
//! Every collector stream and the fluctuation monitor share one limiter, so
//! total throughput towards the venue never exceeds `1 / min_interval`.
//!
//! Callers reserve a grant slot while holding the lock and sleep outside it.
//! Concurrent callers therefore get distinct slots, each at least
//! `min_interval` after the previous one.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::telemetry;

/// Enforces a minimum spacing between outbound calls
#[derive(Debug)]
pub struct RateLimiter {
    /// Time of the most recently reserved grant
    last_granted: Mutex<Option<Instant>>,
    min_interval: Duration,
    total_grants: AtomicU64,
    delayed_grants: AtomicU64,
}

/// Usage counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimiterStats {
    pub total_grants: u64,
    pub delayed_grants: u64,
    pub min_interval: Duration,
}

impl RateLimiter {
    /// Create a limiter with the given minimum interval between grants
    pub fn new(min_interval: Duration) -> Self {
        Self {
            last_granted: Mutex::new(None),
            min_interval,
            total_grants: AtomicU64::new(0),
            delayed_grants: AtomicU64::new(0),
        }
    }

    /// Create a shareable limiter
    pub fn shared(min_interval: Duration) -> Arc<Self> {
        Arc::new(Self::new(min_interval))
    }

    /// Wait until at least `min_interval` has passed since the previous grant.
    ///
    /// Returns how long the caller was suspended.
    pub async fn acquire(&self) -> Duration {
        let grant_no = self.total_grants.fetch_add(1, Ordering::Relaxed) + 1;

        let slot = {
            let mut last = self.last_granted.lock().await;
            let now = Instant::now();
            let slot = match *last {
                Some(prev) => (prev + self.min_interval).max(now),
                None => now,
            };
            *last = Some(slot);
            slot
        };

        let wait = slot.saturating_duration_since(Instant::now());
        if !wait.is_zero() {
            self.delayed_grants.fetch_add(1, Ordering::Relaxed);
            tracing::trace!(grant_no, wait_ms = wait.as_millis() as u64, "Rate limiter delaying request");
            tokio::time::sleep_until(slot).await;
        }

        telemetry::record_rate_limit_wait(wait);
        wait
    }

    /// Whether a call made now would be granted without waiting
    pub async fn is_ready(&self) -> bool {
        match *self.last_granted.lock().await {
            Some(prev) => Instant::now() >= prev + self.min_interval,
            None => true,
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    pub fn stats(&self) -> RateLimiterStats {
        RateLimiterStats {
            total_grants: self.total_grants.load(Ordering::Relaxed),
            delayed_grants: self.delayed_grants.load(Ordering::Relaxed),
            min_interval: self.min_interval,
        }
    }
}
