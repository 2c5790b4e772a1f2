//! Fixed-window request quota per client

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Default number of requests a client may make per window
pub const DEFAULT_MAX_REQUESTS: u32 = 10;

/// Default window length
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);

/// Table size above which expired windows are purged
pub const DEFAULT_MAX_TRACKED_CLIENTS: usize = 10_000;

/// Outcome of a quota check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitDecision {
    /// The request counts against the window
    Allowed { remaining: u32 },
    /// The window is exhausted until `retry_after` elapses
    Limited { retry_after: Duration },
}

#[derive(Debug, Clone, Copy)]
struct Window {
    count: u32,
    reset_at: Instant,
}

/// Per-client fixed window counter
///
/// State lives in process memory, so a multi-instance deployment needs a
/// shared store instead; the decision logic does not change.
#[derive(Debug)]
pub struct RateLimiter {
    max_requests: u32,
    window: Duration,
    max_tracked: usize,
    windows: Mutex<HashMap<String, Window>>,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            max_tracked: DEFAULT_MAX_TRACKED_CLIENTS,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Purge expired windows once more than `max_tracked` clients are held
    pub fn with_max_tracked(mut self, max_tracked: usize) -> Self {
        self.max_tracked = max_tracked.max(1);
        self
    }

    pub fn max_requests(&self) -> u32 {
        self.max_requests
    }

    /// Count a request from `key` against its current window
    pub fn check(&self, key: &str) -> RateLimitDecision {
        self.check_at(key, Instant::now())
    }

    pub fn check_at(&self, key: &str, now: Instant) -> RateLimitDecision {
        let mut windows = self.windows.lock().unwrap_or_else(|e| e.into_inner());

        if windows.len() >= self.max_tracked && !windows.contains_key(key) {
            windows.retain(|_, w| now <= w.reset_at);
        }

        match windows.get_mut(key) {
            Some(w) if now <= w.reset_at => {
                if w.count >= self.max_requests {
                    return RateLimitDecision::Limited {
                        retry_after: w.reset_at.saturating_duration_since(now),
                    };
                }
                w.count += 1;
                RateLimitDecision::Allowed {
                    remaining: self.max_requests - w.count,
                }
            }
            _ => {
                // First request, or the previous window has elapsed
                windows.insert(
                    key.to_string(),
                    Window {
                        count: 1,
                        reset_at: now + self.window,
                    },
                );
                RateLimitDecision::Allowed {
                    remaining: self.max_requests.saturating_sub(1),
                }
            }
        }
    }

    /// Forget the window for `key`
    pub fn reset(&self, key: &str) {
        self.windows
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(key);
    }

    /// Number of clients currently held in the table
    pub fn tracked_clients(&self) -> usize {
        self.windows.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_REQUESTS, DEFAULT_WINDOW)
    }
}
