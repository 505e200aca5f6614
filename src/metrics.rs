use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Counters for one console session
#[derive(Clone)]
pub struct Metrics {
    pub requests_sent: Arc<AtomicU64>,
    pub requests_failed: Arc<AtomicU64>,
    pub content_loads: Arc<AtomicU64>,
    pub poll_ticks: Arc<AtomicU64>,
    pub flashes_shown: Arc<AtomicU64>,
    pub start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            requests_sent: Arc::new(AtomicU64::new(0)),
            requests_failed: Arc::new(AtomicU64::new(0)),
            content_loads: Arc::new(AtomicU64::new(0)),
            poll_ticks: Arc::new(AtomicU64::new(0)),
            flashes_shown: Arc::new(AtomicU64::new(0)),
            start_time: Instant::now(),
        }
    }

    pub fn inc_requests_sent(&self) {
        self.requests_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_requests_failed(&self) {
        self.requests_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_content_loads(&self) {
        self.content_loads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_poll_ticks(&self) {
        self.poll_ticks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_flashes_shown(&self) {
        self.flashes_shown.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            requests_sent: self.requests_sent.load(Ordering::Relaxed),
            requests_failed: self.requests_failed.load(Ordering::Relaxed),
            content_loads: self.content_loads.load(Ordering::Relaxed),
            poll_ticks: self.poll_ticks.load(Ordering::Relaxed),
            flashes_shown: self.flashes_shown.load(Ordering::Relaxed),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Serialize)]
pub struct MetricsSnapshot {
    pub requests_sent: u64,
    pub requests_failed: u64,
    pub content_loads: u64,
    pub poll_ticks: u64,
    pub flashes_shown: u64,
    pub uptime_seconds: u64,
}
