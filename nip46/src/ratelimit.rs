//! Per-client multi-tier rate limiting.
//!
//! A sliding-window tracker with three tiers (burst/minute/hour) keyed by
//! client pubkey hex, using simple event counts rather than weighted token
//! counts.

use std::collections::VecDeque;
use rustc_hash::FxHashMap;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;

/// A sliding-window event counter.
struct SlidingWindow {
    window_secs: i64,
    max_count: usize,
    events: VecDeque<DateTime<Utc>>,
}

impl SlidingWindow {
    fn new(window_secs: i64, max_count: usize) -> Self {
        Self {
            window_secs,
            max_count,
            events: VecDeque::new(),
        }
    }

    fn evict(&mut self, now: DateTime<Utc>) {
        let cutoff = now - Duration::seconds(self.window_secs);
        while self.events.front().is_some_and(|t| *t <= cutoff) {
            self.events.pop_front();
        }
    }

    fn is_limited(&mut self, now: DateTime<Utc>) -> bool {
        self.evict(now);
        self.events.len() >= self.max_count
    }

    fn record(&mut self, now: DateTime<Utc>) {
        self.evict(now);
        self.events.push_back(now);
    }
}

const BURST_WINDOW_SECS: i64 = 10;
const BURST_MAX: usize = 10;
const MINUTE_WINDOW_SECS: i64 = 60;
const MINUTE_MAX: usize = 60;
const HOUR_WINDOW_SECS: i64 = 3600;
const HOUR_MAX: usize = 1000;

struct ClientWindows {
    burst: SlidingWindow,
    minute: SlidingWindow,
    hour: SlidingWindow,
}

impl ClientWindows {
    fn new() -> Self {
        Self {
            burst: SlidingWindow::new(BURST_WINDOW_SECS, BURST_MAX),
            minute: SlidingWindow::new(MINUTE_WINDOW_SECS, MINUTE_MAX),
            hour: SlidingWindow::new(HOUR_WINDOW_SECS, HOUR_MAX),
        }
    }
}

/// Tracks the three independent sliding windows per client pubkey hex.
pub struct RateLimiter {
    clients: Mutex<FxHashMap<String, ClientWindows>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self {
            clients: Mutex::new(FxHashMap::default()),
        }
    }

    /// Returns `true` (and records the event) iff the client is under all
    /// three budgets. A rejected call is not recorded, so a client stuck at
    /// its ceiling does not keep extending its own window.
    pub async fn check_and_record(&self, client_pubkey: &str, now: DateTime<Utc>) -> bool {
        let mut clients = self.clients.lock().await;
        let windows = clients
            .entry(client_pubkey.to_string())
            .or_insert_with(ClientWindows::new);

        if windows.burst.is_limited(now) || windows.minute.is_limited(now) || windows.hour.is_limited(now) {
            return false;
        }
        windows.burst.record(now);
        windows.minute.record(now);
        windows.hour.record(now);
        true
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn allows_requests_under_the_burst_budget() {
        let limiter = RateLimiter::new();
        let now = Utc::now();
        for _ in 0..BURST_MAX {
            assert!(limiter.check_and_record("client-a", now).await);
        }
        assert!(!limiter.check_and_record("client-a", now).await);
    }

    #[tokio::test]
    async fn burst_budget_recovers_after_the_window_elapses() {
        let limiter = RateLimiter::new();
        let t0 = Utc::now();
        for _ in 0..BURST_MAX {
            assert!(limiter.check_and_record("client-b", t0).await);
        }
        let later = t0 + Duration::seconds(BURST_WINDOW_SECS + 1);
        assert!(limiter.check_and_record("client-b", later).await);
    }

    #[tokio::test]
    async fn clients_are_tracked_independently() {
        let limiter = RateLimiter::new();
        let now = Utc::now();
        for _ in 0..BURST_MAX {
            assert!(limiter.check_and_record("client-a", now).await);
        }
        assert!(limiter.check_and_record("client-c", now).await);
    }
}
