use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration as StdDuration;

use time::{Duration, OffsetDateTime};
use tracing::debug;
use uuid::Uuid;

use crate::config::RateLimitConfig;

/// Outcome of an admission check. `reset_at` is the expiry of the caller's
/// current window whether or not the request was allowed.
#[derive(Debug, Clone, Copy)]
pub struct Admission {
    pub allowed: bool,
    pub remaining: u32,
    pub reset_at: OffsetDateTime,
}

#[derive(Debug)]
struct Window {
    count: u32,
    expires_at: OffsetDateTime,
}

/// Per-caller request counter with fixed-window semantics: a window resets
/// entirely once its expiry passes. The map is only ever touched under the
/// mutex, so two concurrent admissions for the same caller cannot both read a
/// stale count.
pub struct RateLimiter {
    windows: Mutex<HashMap<Uuid, Window>>,
    window: Duration,
    max_requests: u32,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            windows: Mutex::new(HashMap::new()),
            window: Duration::seconds(config.window_seconds),
            max_requests: config.max_requests,
        }
    }

    /// Count one request for `identity`. Never errors: an unknown identity
    /// simply starts a fresh window.
    pub fn admit(&self, identity: Uuid) -> Admission {
        self.admit_at(identity, OffsetDateTime::now_utc())
    }

    fn admit_at(&self, identity: Uuid, now: OffsetDateTime) -> Admission {
        let mut windows = self.lock();
        match windows.get_mut(&identity) {
            Some(window) if window.expires_at > now => {
                if window.count >= self.max_requests {
                    // Denials do not consume quota or extend the window.
                    Admission {
                        allowed: false,
                        remaining: 0,
                        reset_at: window.expires_at,
                    }
                } else {
                    window.count += 1;
                    Admission {
                        allowed: true,
                        remaining: self.max_requests - window.count,
                        reset_at: window.expires_at,
                    }
                }
            }
            _ => {
                let expires_at = now + self.window;
                windows.insert(identity, Window { count: 1, expires_at });
                Admission {
                    allowed: true,
                    remaining: self.max_requests.saturating_sub(1),
                    reset_at: expires_at,
                }
            }
        }
    }

    /// Drop windows that have already expired, bounding memory growth.
    /// Returns how many were removed.
    pub fn sweep(&self) -> usize {
        self.sweep_at(OffsetDateTime::now_utc())
    }

    fn sweep_at(&self, now: OffsetDateTime) -> usize {
        let mut windows = self.lock();
        let before = windows.len();
        windows.retain(|_, window| window.expires_at > now);
        before - windows.len()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Uuid, Window>> {
        // A poisoned lock only means another thread panicked mid-admission;
        // the counter map itself is still usable.
        self.windows.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Periodically sweep expired windows. Runs until the server shuts down.
pub fn spawn_sweeper(limiter: Arc<RateLimiter>, every: StdDuration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        // interval fires immediately; skip that tick so the first sweep
        // happens one full period after startup.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let removed = limiter.sweep();
            if removed > 0 {
                debug!(removed, "swept expired rate limit windows");
            }
        }
    })
}
