//! Fixed-window admission guard, keyed by client+route.
//!
//! Sits in front of the orchestrator as an external check. Counters are
//! updated under a lock so concurrent bursts are never undercounted.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
struct Window {
    started_at: u64,
    count: u32,
}

pub struct RateLimiter {
    limit: u32,
    period: Duration,
    windows: Mutex<HashMap<String, Window>>,
}

impl RateLimiter {
    pub fn new(limit: u32, period: Duration) -> Self {
        Self {
            limit,
            period,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Admit or reject one request for `key` at epoch second `now`.
    pub fn check_at(&self, key: &str, now: u64) -> bool {
        let period = self.period.as_secs().max(1);
        let window_start = now - now % period;

        let mut windows = self.windows.lock();
        let window = windows.entry(key.to_string()).or_insert(Window {
            started_at: window_start,
            count: 0,
        });
        if window.started_at != window_start {
            window.started_at = window_start;
            window.count = 0;
        }
        if window.count >= self.limit {
            return false;
        }
        window.count += 1;
        true
    }

    pub fn check(&self, key: &str) -> bool {
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        self.check_at(key, now)
    }
}

/// Admission key for one client+route pair.
pub fn admission_key(client: &str, path: &str) -> String {
    format!("{client}:{path}")
}
