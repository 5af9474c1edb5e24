//! Metrics for processing submissions

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Submission counters, shareable across screens
#[derive(Debug, Default)]
pub struct Metrics {
    pub total_submissions: AtomicU64,
    pub succeeded: AtomicU64,
    pub failed: AtomicU64,
    /// Responses that arrived for a superseded asset
    pub discarded_stale: AtomicU64,
    /// `submit` calls ignored (in flight or nothing to send)
    pub skipped: AtomicU64,
    pub total_latency_ms: AtomicU64,
}

impl Metrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn record_submission(&self) {
        self.total_submissions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_outcome(&self, success: bool, latency_ms: u64) {
        if success {
            self.succeeded.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed.fetch_add(1, Ordering::Relaxed);
        }
        self.total_latency_ms.fetch_add(latency_ms, Ordering::Relaxed);
    }

    pub fn record_discarded(&self) {
        self.discarded_stale.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_skipped(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let total = self.total_submissions.load(Ordering::Relaxed);
        let succeeded = self.succeeded.load(Ordering::Relaxed);
        let failed = self.failed.load(Ordering::Relaxed);
        let total_latency = self.total_latency_ms.load(Ordering::Relaxed);
        let completed = succeeded + failed;

        MetricsSnapshot {
            total_submissions: total,
            succeeded,
            failed,
            discarded_stale: self.discarded_stale.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            error_rate: if completed > 0 { failed as f64 / completed as f64 } else { 0.0 },
            avg_latency_ms: if completed > 0 { total_latency / completed } else { 0 },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub total_submissions: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub discarded_stale: u64,
    pub skipped: u64,
    pub error_rate: f64,
    pub avg_latency_ms: u64,
}

/// Timer for tracking submission latency
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}
