//! Request counters reported by `/stats`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use serde::Serialize;

use crate::error::EvalError;

pub struct Stats {
    started: Instant,
    requests: AtomicU64,
    predictions: AtomicU64,
    invalid_inputs: AtomicU64,
    unavailable: AtomicU64,
    rate_limited: AtomicU64,
    internal_errors: AtomicU64,
    reloads: AtomicU64,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatsSnapshot {
    pub uptime_secs: u64,
    pub requests: u64,
    pub predictions: u64,
    pub invalid_inputs: u64,
    pub unavailable: u64,
    pub rate_limited: u64,
    pub internal_errors: u64,
    pub reloads: u64,
}

impl Default for Stats {
    fn default() -> Self {
        Stats {
            started: Instant::now(),
            requests: AtomicU64::new(0),
            predictions: AtomicU64::new(0),
            invalid_inputs: AtomicU64::new(0),
            unavailable: AtomicU64::new(0),
            rate_limited: AtomicU64::new(0),
            internal_errors: AtomicU64::new(0),
            reloads: AtomicU64::new(0),
        }
    }
}

impl Stats {
    pub fn record_request(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    /// Count every sample scored, so a batch of n adds n.
    pub fn record_predictions(&self, n: usize) {
        self.predictions.fetch_add(n as u64, Ordering::Relaxed);
    }

    pub fn record_error(&self, err: &EvalError) {
        let counter = match err {
            EvalError::InvalidInput(_) => &self.invalid_inputs,
            EvalError::ModelUnavailable(_) => &self.unavailable,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rate_limited(&self) {
        self.rate_limited.fetch_add(1, Ordering::Relaxed);
    }

    /// A request that failed outside the model, e.g. a panicked worker.
    pub fn record_internal_error(&self) {
        self.internal_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_reload(&self) {
        self.reloads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            uptime_secs: self.started.elapsed().as_secs(),
            requests: self.requests.load(Ordering::Relaxed),
            predictions: self.predictions.load(Ordering::Relaxed),
            invalid_inputs: self.invalid_inputs.load(Ordering::Relaxed),
            unavailable: self.unavailable.load(Ordering::Relaxed),
            rate_limited: self.rate_limited.load(Ordering::Relaxed),
            internal_errors: self.internal_errors.load(Ordering::Relaxed),
            reloads: self.reloads.load(Ordering::Relaxed),
        }
    }
}
