//! Application state management.
//!
//! This module manages the shared state across HTTP request handlers.

use crate::service::AlarmService;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Shared application state.
pub struct AppState {
    /// The alarm service all handlers delegate to.
    pub service: AlarmService,
    /// Application start time.
    pub start_time: Instant,
    /// Statistics counters.
    pub stats: Stats,
}

impl AppState {
    /// Creates the application state around an alarm service.
    pub fn new(service: AlarmService) -> Self {
        Self {
            service,
            start_time: Instant::now(),
            stats: Stats::default(),
        }
    }

    /// Returns the uptime in seconds.
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Increments the total request counter.
    pub fn increment_requests(&self) {
        self.stats.requests_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Increments the successful request counter.
    pub fn increment_success(&self) {
        self.stats.requests_success.fetch_add(1, Ordering::Relaxed);
    }

    /// Increments the failed request counter.
    pub fn increment_failed(&self) {
        self.stats.requests_failed.fetch_add(1, Ordering::Relaxed);
    }
}

/// Statistics counters.
#[derive(Default)]
pub struct Stats {
    /// Total requests received.
    pub requests_total: AtomicU64,
    /// Successful requests.
    pub requests_success: AtomicU64,
    /// Failed requests.
    pub requests_failed: AtomicU64,
}

impl Stats {
    /// Gets the current statistics as a snapshot.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            requests_total: self.requests_total.load(Ordering::Relaxed),
            requests_success: self.requests_success.load(Ordering::Relaxed),
            requests_failed: self.requests_failed.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of statistics counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Total requests received.
    pub requests_total: u64,
    /// Successful requests.
    pub requests_success: u64,
    /// Failed requests.
    pub requests_failed: u64,
}
