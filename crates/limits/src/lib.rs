//! Fixed-window rate limiting keyed by an arbitrary identifier.
//!
//! State is process-local. Multiple concurrent instances do not share
//! limits; for horizontal scale-out, swap in an external shared counter
//! behind the same API.

use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::{Duration, Instant},
};

use {
    dashmap::DashMap,
    tracing::{debug, warn},
};

const CLEANUP_EVERY_CHECKS: u64 = 512;

/// Cap for one identifier: `max_requests` per `window`.
#[derive(Debug, Clone, Copy)]
pub struct RateLimit {
    pub max_requests: usize,
    pub window: Duration,
}

#[derive(Debug, Clone, Copy)]
struct WindowState {
    started_at: Instant,
    count: usize,
}

/// Outcome of one limiter check.
#[derive(Debug, Clone, Copy)]
pub struct Decision {
    pub allowed: bool,
    /// Requests left in the current window (0 when denied).
    pub remaining: usize,
    /// How long until the window resets and a fresh cap is available.
    pub retry_after: Duration,
}

/// Fixed-window request limiter.
///
/// Windows reset lazily on the first check after expiry. Every
/// `CLEANUP_EVERY_CHECKS` checks, stale buckets are evicted to bound memory.
#[derive(Clone)]
pub struct FixedWindowLimiter {
    limit: RateLimit,
    buckets: Arc<DashMap<String, WindowState>>,
    checks_seen: Arc<AtomicU64>,
}

impl FixedWindowLimiter {
    #[must_use]
    pub fn new(limit: RateLimit) -> Self {
        Self {
            limit,
            buckets: Arc::new(DashMap::new()),
            checks_seen: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn check(&self, identifier: &str) -> Decision {
        self.check_at(identifier, Instant::now())
    }

    fn check_at(&self, identifier: &str, now: Instant) -> Decision {
        let limit = self.limit;
        let decision = if limit.max_requests == 0 {
            Decision {
                allowed: false,
                remaining: 0,
                retry_after: limit.window.max(Duration::from_secs(1)),
            }
        } else {
            match self.buckets.entry(identifier.to_string()) {
                dashmap::mapref::entry::Entry::Occupied(mut occupied) => {
                    let state = occupied.get_mut();
                    let elapsed = now.duration_since(state.started_at);
                    if elapsed >= limit.window {
                        state.started_at = now;
                        state.count = 1;
                        Decision {
                            allowed: true,
                            remaining: limit.max_requests - 1,
                            retry_after: limit.window,
                        }
                    } else if state.count < limit.max_requests {
                        state.count += 1;
                        Decision {
                            allowed: true,
                            remaining: limit.max_requests - state.count,
                            retry_after: limit.window.saturating_sub(elapsed),
                        }
                    } else {
                        Decision {
                            allowed: false,
                            remaining: 0,
                            retry_after: limit.window.saturating_sub(elapsed),
                        }
                    }
                },
                dashmap::mapref::entry::Entry::Vacant(vacant) => {
                    vacant.insert(WindowState {
                        started_at: now,
                        count: 1,
                    });
                    Decision {
                        allowed: true,
                        remaining: limit.max_requests - 1,
                        retry_after: limit.window,
                    }
                },
            }
        };

        self.cleanup_if_needed(now);
        decision
    }

    /// Wait until the identifier is allowed, then consume one slot.
    ///
    /// Used on the outbound path, where hitting the cap means waiting for
    /// the window to reset rather than failing the send.
    pub async fn acquire(&self, identifier: &str) {
        // A zero cap never opens, so waiting on it would never end. Send
        // unpaced instead; config validation flags the misconfiguration.
        if self.limit.max_requests == 0 {
            warn!(identifier, "outbound cap is zero, sending unpaced");
            return;
        }
        loop {
            let decision = self.check(identifier);
            if decision.allowed {
                return;
            }
            debug!(
                identifier,
                wait_ms = decision.retry_after.as_millis() as u64,
                "outbound window full, waiting for reset"
            );
            tokio::time::sleep(decision.retry_after.max(Duration::from_millis(10))).await;
        }
    }

    /// Drop buckets whose window expired long ago.
    pub fn evict_expired(&self) {
        let now = Instant::now();
        let stale_after = self.limit.window.saturating_mul(3);
        self.buckets
            .retain(|_, state| now.duration_since(state.started_at) <= stale_after);
    }

    fn cleanup_if_needed(&self, now: Instant) {
        let seen = self.checks_seen.fetch_add(1, Ordering::Relaxed) + 1;
        if !seen.is_multiple_of(CLEANUP_EVERY_CHECKS) {
            return;
        }
        let stale_after = self.limit.window.saturating_mul(3);
        self.buckets
            .retain(|_, state| now.duration_since(state.started_at) <= stale_after);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn limiter(max_requests: usize, window_secs: u64) -> FixedWindowLimiter {
        FixedWindowLimiter::new(RateLimit {
            max_requests,
            window: Duration::from_secs(window_secs),
        })
    }

    #[test]
    fn allows_exactly_the_cap_within_one_window() {
        let l = limiter(3, 60);
        let now = Instant::now();
        for i in 0..3 {
            let d = l.check_at("user", now);
            assert!(d.allowed, "request {i} should be allowed");
            assert_eq!(d.remaining, 2 - i);
        }
        let d = l.check_at("user", now);
        assert!(!d.allowed);
        assert_eq!(d.remaining, 0);
        assert_eq!(d.retry_after, Duration::from_secs(60));
    }

    #[test]
    fn fresh_cap_after_window_elapses() {
        let l = limiter(2, 10);
        let now = Instant::now();
        assert!(l.check_at("user", now).allowed);
        assert!(l.check_at("user", now).allowed);
        assert!(!l.check_at("user", now).allowed);

        let later = now + Duration::from_secs(11);
        let d = l.check_at("user", later);
        assert!(d.allowed);
        assert_eq!(d.remaining, 1);
    }

    #[test]
    fn identifiers_are_independent() {
        let l = limiter(1, 60);
        let now = Instant::now();
        assert!(l.check_at("alice", now).allowed);
        assert!(l.check_at("bob", now).allowed);
        assert!(!l.check_at("alice", now).allowed);
    }

    #[test]
    fn zero_cap_denies_everything() {
        let l = limiter(0, 60);
        let d = l.check_at("user", Instant::now());
        assert!(!d.allowed);
        assert!(d.retry_after >= Duration::from_secs(1));
    }

    #[test]
    fn evict_keeps_recent_buckets() {
        let l = limiter(1, 1);
        l.check("recent");
        std::thread::sleep(Duration::from_millis(10));
        // Window is 1s; buckets only become stale after 3s.
        l.evict_expired();
        assert!(!l.buckets.is_empty());
    }

    #[test]
    fn evict_drops_buckets_past_the_stale_threshold() {
        let l = FixedWindowLimiter::new(RateLimit {
            max_requests: 1,
            window: Duration::from_millis(10),
        });
        l.check("old");
        // Past window * 3, the bucket is stale.
        std::thread::sleep(Duration::from_millis(50));
        l.evict_expired();
        assert!(l.buckets.is_empty());
    }

    #[tokio::test]
    async fn acquire_returns_instead_of_waiting_on_a_zero_cap() {
        let l = limiter(0, 60);
        // Must complete: a zero cap never opens, so there is nothing to
        // wait for and the send proceeds unpaced.
        tokio::time::timeout(Duration::from_secs(1), l.acquire("chat"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn acquire_waits_for_window_reset() {
        let l = FixedWindowLimiter::new(RateLimit {
            max_requests: 1,
            window: Duration::from_millis(40),
        });
        l.acquire("chat").await;
        let before = Instant::now();
        l.acquire("chat").await;
        assert!(before.elapsed() >= Duration::from_millis(30));
    }
}
