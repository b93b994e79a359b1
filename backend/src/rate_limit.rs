//! Fixed one-minute window request limiting per client key.

use std::time::{Duration, Instant};

use dashmap::DashMap;

pub struct RateLimiter {
    window: Duration,
    limit: u32,
    buckets: DashMap<String, (u32, Instant)>,
}

impl RateLimiter {
    pub fn per_minute(limit: u32) -> Self {
        Self::new(limit, Duration::from_secs(60))
    }

    pub fn new(limit: u32, window: Duration) -> Self {
        RateLimiter {
            window,
            limit,
            buckets: DashMap::new(),
        }
    }

    /// Count one request for `client`. Returns false once the client has
    /// used up its budget for the current window.
    pub fn check(&self, client: &str) -> bool {
        self.check_at(client, Instant::now())
    }

    fn check_at(&self, client: &str, now: Instant) -> bool {
        let mut entry = self
            .buckets
            .entry(client.to_string())
            .or_insert_with(|| (0, now));

        if now.duration_since(entry.1) > self.window {
            *entry = (0, now);
        }

        if entry.0 >= self.limit {
            return false;
        }
        entry.0 += 1;
        true
    }

    /// Drop buckets whose window has expired.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.buckets.len();
        self.buckets
            .retain(|_, (_, started)| now.duration_since(*started) <= self.window);
        before - self.buckets.len()
    }
}
