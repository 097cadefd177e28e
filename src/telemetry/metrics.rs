//! Metric instruments for herd transitions.
//!
//! Uses the OTel Meter API with the globally-registered `MeterProvider`.
//! Each counter is mirrored by an in-process atomic so a herd can report
//! its own totals without querying an exporter.

use std::sync::atomic::{AtomicU64, Ordering};

use opentelemetry::metrics::{Counter, Meter};
use serde::{Deserialize, Serialize};

/// Returns the shared meter for workherd instruments.
fn meter() -> Meter {
    opentelemetry::global::meter("workherd")
}

/// Counter: work items that reached output with status success.
pub fn work_success() -> Counter<u64> {
    meter()
        .u64_counter("workherd.work.success")
        .with_description("Number of work items processed successfully")
        .build()
}

/// Counter: work items that reached output with status failure,
/// including those that exhausted their retries.
pub fn work_failure() -> Counter<u64> {
    meter()
        .u64_counter("workherd.work.failure")
        .with_description("Number of work items that failed")
        .build()
}

/// Counter: loopbacks through the retry queue.
pub fn work_retry() -> Counter<u64> {
    meter()
        .u64_counter("workherd.work.retry")
        .with_description("Number of retry loopbacks")
        .build()
}

/// Point-in-time totals for one herd.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub success: u64,
    pub failure: u64,
    pub retry: u64,
}

/// Success / failure / retry counters owned by a single herd.
pub struct HerdMetrics {
    success: Counter<u64>,
    failure: Counter<u64>,
    retry: Counter<u64>,
    success_total: AtomicU64,
    failure_total: AtomicU64,
    retry_total: AtomicU64,
}

impl HerdMetrics {
    pub fn new() -> Self {
        Self {
            success: work_success(),
            failure: work_failure(),
            retry: work_retry(),
            success_total: AtomicU64::new(0),
            failure_total: AtomicU64::new(0),
            retry_total: AtomicU64::new(0),
        }
    }

    pub fn record_success(&self) {
        self.success.add(1, &[]);
        self.success_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.failure.add(1, &[]);
        self.failure_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_retry(&self) {
        self.retry.add(1, &[]);
        self.retry_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            success: self.success_total.load(Ordering::Relaxed),
            failure: self.failure_total.load(Ordering::Relaxed),
            retry: self.retry_total.load(Ordering::Relaxed),
        }
    }
}

impl Default for HerdMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for HerdMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("HerdMetrics").field(&self.snapshot()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn each_record_bumps_exactly_one_counter() {
        let metrics = HerdMetrics::new();
        metrics.record_success();
        metrics.record_retry();
        metrics.record_retry();
        metrics.record_failure();

        assert_eq!(
            metrics.snapshot(),
            MetricsSnapshot {
                success: 1,
                failure: 1,
                retry: 2,
            }
        );
    }

    #[test]
    fn separate_herds_do_not_share_totals() {
        let a = HerdMetrics::new();
        let b = HerdMetrics::new();
        a.record_success();
        assert_eq!(a.snapshot().success, 1);
        assert_eq!(b.snapshot().success, 0);
    }
}
