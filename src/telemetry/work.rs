//! Work attempt span helpers.
//!
//! Provides span creation and transition recording for work items
//! flowing through a herd.

use tracing::Span;

use crate::model::{Status, WorkId};

/// Start a span for one processing attempt.
///
/// The `work.status` field is declared empty and is filled via
/// [`record_attempt_status`] once the processing function returns.
pub fn start_work_span(work_id: &WorkId, retry_count: u32, worker: usize) -> Span {
    tracing::info_span!(
        "herd.work",
        "work.id" = %work_id,
        "work.retry_count" = retry_count,
        "work.worker" = worker,
        "work.status" = tracing::field::Empty,
    )
}

/// Record the status an attempt ended with.
pub fn record_attempt_status(span: &Span, status: Status) {
    span.record("work.status", tracing::field::display(status));
}

/// Record a routing decision as an event scoped to the given span.
pub fn record_state_transition(span: &Span, from: Status, to: &str) {
    span.in_scope(|| {
        tracing::debug!(from = %from, to = to, "state_transition");
    });
}
