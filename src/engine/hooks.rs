//! Transition hooks: caller callbacks plus the herd's own counters.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use tracing::error;

use super::worker::panic_message;
use crate::model::WorkItem;
use crate::telemetry::metrics::HerdMetrics;

/// Observer invoked synchronously on a transition. Must not block.
///
/// A panicking callback is logged and skipped; the item carries on.
pub type Callback<P, R> = Arc<dyn Fn(&WorkItem<P, R>) + Send + Sync>;

pub(crate) struct Hooks<P, R> {
    pub(crate) success: Vec<Callback<P, R>>,
    pub(crate) retry: Vec<Callback<P, R>>,
    pub(crate) failure: Vec<Callback<P, R>>,
    pub(crate) metrics: HerdMetrics,
}

impl<P, R> Hooks<P, R> {
    pub(crate) fn new() -> Self {
        Self {
            success: Vec::new(),
            retry: Vec::new(),
            failure: Vec::new(),
            metrics: HerdMetrics::new(),
        }
    }

    /// Terminal success.
    pub(crate) fn register_success(&self, item: &WorkItem<P, R>) {
        notify(&self.success, item, "success");
        self.metrics.record_success();
    }

    /// One loopback through the retry queue.
    pub(crate) fn register_retry(&self, item: &WorkItem<P, R>) {
        notify(&self.retry, item, "retry");
        self.metrics.record_retry();
    }

    /// Terminal failure, including exhausted retries.
    pub(crate) fn register_failure(&self, item: &WorkItem<P, R>) {
        notify(&self.failure, item, "failure");
        self.metrics.record_failure();
    }
}

fn notify<P, R>(callbacks: &[Callback<P, R>], item: &WorkItem<P, R>, transition: &'static str) {
    for callback in callbacks {
        if let Err(panic) = std::panic::catch_unwind(AssertUnwindSafe(|| callback(item))) {
            error!(
                id = %item.id,
                transition,
                panic = panic_message(&*panic),
                "callback panicked"
            );
        }
    }
}
