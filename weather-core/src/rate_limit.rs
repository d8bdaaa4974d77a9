//! Requests-per-window gate placed in front of every upstream call.
//!
//! The window is reset lazily: only when the threshold has been reached does
//! the limiter look at the clock. A burst just under the threshold followed by
//! a long idle period keeps its count until the next time the threshold is hit.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::clock::{Clock, Sleeper};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
    /// Calls allowed before the window has to be checked.
    pub threshold: u32,
    pub window: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateWindow {
    request_count: u32,
    window_start: Instant,
}

impl RateWindow {
    pub fn new(now: Instant) -> Self {
        Self { request_count: 0, window_start: now }
    }

    pub fn request_count(&self) -> u32 {
        self.request_count
    }

    pub fn window_start(&self) -> Instant {
        self.window_start
    }

    /// Admit one call at `now`.
    ///
    /// Returns the next state and how long the caller has to wait before
    /// dispatching. When a wait is required the new window starts once it is
    /// over and already counts the admitted call.
    pub fn admit(self, limit: &RateLimit, now: Instant) -> (RateWindow, Duration) {
        if self.request_count < limit.threshold {
            let next = RateWindow { request_count: self.request_count + 1, ..self };
            return (next, Duration::ZERO);
        }

        let elapsed = now.saturating_duration_since(self.window_start);
        let wait = limit.window.saturating_sub(elapsed);
        let next = RateWindow { request_count: 1, window_start: now + wait };
        (next, wait)
    }
}

/// Owns the window state of one client.
///
/// The lock is held across the wait, so callers sharing a client go through
/// the gate one at a time.
#[derive(Debug)]
pub struct RateLimiter {
    limit: RateLimit,
    state: Mutex<RateWindow>,
    clock: Arc<dyn Clock>,
    sleeper: Arc<dyn Sleeper>,
}

impl RateLimiter {
    pub fn new(limit: RateLimit, clock: Arc<dyn Clock>, sleeper: Arc<dyn Sleeper>) -> Self {
        let state = Mutex::new(RateWindow::new(clock.now()));
        Self { limit, state, clock, sleeper }
    }

    pub fn limit(&self) -> RateLimit {
        self.limit
    }

    /// Wait for a slot, then count the call. Returns the time spent waiting.
    pub async fn acquire(&self) -> Duration {
        let mut state = self.state.lock().await;
        let (next, wait) = state.admit(&self.limit, self.clock.now());

        if !wait.is_zero() {
            info!(
                wait_ms = wait.as_millis() as u64,
                threshold = self.limit.threshold,
                "rate limit reached, waiting for the window to close"
            );
            self.sleeper.sleep(wait).await;
        }

        *state = next;
        debug!(request_count = next.request_count, "rate limit slot acquired");
        wait
    }

    pub async fn snapshot(&self) -> RateWindow {
        *self.state.lock().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn limit(threshold: u32, window_secs: u64) -> RateLimit {
        RateLimit { threshold, window: Duration::from_secs(window_secs) }
    }

    fn limiter(limit: RateLimit, clock: &ManualClock) -> RateLimiter {
        RateLimiter::new(limit, Arc::new(clock.clone()), Arc::new(clock.clone()))
    }

    #[test]
    fn admit_counts_up_to_threshold_without_waiting() {
        let start = Instant::now();
        let limit = limit(3, 60);
        let mut window = RateWindow::new(start);

        for expected in 1..=3 {
            let (next, wait) = window.admit(&limit, start);
            assert_eq!(wait, Duration::ZERO);
            assert_eq!(next.request_count(), expected);
            window = next;
        }
    }

    #[test]
    fn admit_over_threshold_waits_for_remainder_of_window() {
        let start = Instant::now();
        let limit = limit(2, 60);
        let window = RateWindow { request_count: 2, window_start: start };

        let now = start + Duration::from_secs(15);
        let (next, wait) = window.admit(&limit, now);

        assert_eq!(wait, Duration::from_secs(45));
        assert_eq!(next.request_count(), 1);
        assert_eq!(next.window_start(), start + Duration::from_secs(60));
    }

    #[test]
    fn admit_over_threshold_after_window_resets_without_waiting() {
        let start = Instant::now();
        let limit = limit(2, 60);
        let window = RateWindow { request_count: 2, window_start: start };

        let now = start + Duration::from_secs(90);
        let (next, wait) = window.admit(&limit, now);

        assert_eq!(wait, Duration::ZERO);
        assert_eq!(next.request_count(), 1);
        assert_eq!(next.window_start(), now);
    }

    #[test]
    fn reset_is_lazy_under_threshold() {
        let start = Instant::now();
        let limit = limit(5, 1);
        let window = RateWindow { request_count: 3, window_start: start };

        let (next, wait) = window.admit(&limit, start + Duration::from_secs(3600));

        assert_eq!(wait, Duration::ZERO);
        assert_eq!(next.request_count(), 4);
        assert_eq!(next.window_start(), start);
    }

    #[tokio::test]
    async fn call_past_threshold_blocks_until_window_elapsed() {
        let clock = ManualClock::new();
        let limiter = limiter(limit(3, 10), &clock);
        let start = clock.now();

        for _ in 0..3 {
            assert_eq!(limiter.acquire().await, Duration::ZERO);
            clock.advance(Duration::from_secs(1));
        }

        let waited = limiter.acquire().await;

        assert_eq!(waited, Duration::from_secs(7));
        assert_eq!(clock.now() - start, Duration::from_secs(10));
        let window = limiter.snapshot().await;
        assert_eq!(window.request_count(), 1);
        assert_eq!(window.window_start(), clock.now());
    }

    #[tokio::test]
    async fn spaced_calls_never_wait() {
        let clock = ManualClock::new();
        let limiter = limiter(limit(1, 5), &clock);

        for _ in 0..5 {
            clock.advance(Duration::from_secs(6));
            assert_eq!(limiter.acquire().await, Duration::ZERO);
            assert_eq!(limiter.snapshot().await.request_count(), 1);
        }

        assert!(clock.sleeps().is_empty());
    }
}
