//! The worker loop and per-attempt status routing.
//!
//! Every worker waits on three events at once (a quit signal, an input
//! item, a retry item) and takes whichever is ready first. Once input is
//! closed and drained the worker only serves retries and quit signals.
//! When retry closes, the worker closes output and exits.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::Utc;
use tracing::{Instrument, Span, debug, error};

use super::Shared;
use crate::model::{Status, WorkItem};
use crate::telemetry::work::{record_attempt_status, record_state_transition, start_work_span};

/// Keeps the live-worker count honest even if the task unwinds.
struct LiveGuard<'a>(&'a AtomicUsize);

impl<'a> LiveGuard<'a> {
    fn enter(live: &'a AtomicUsize) -> Self {
        live.fetch_add(1, Ordering::SeqCst);
        Self(live)
    }
}

impl Drop for LiveGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

pub(super) async fn run<P, R>(shared: Arc<Shared<P, R>>, worker: usize)
where
    P: Send + 'static,
    R: Send + 'static,
{
    let _live = LiveGuard::enter(&shared.live);
    let mut input_open = true;
    debug!(worker, "worker started");

    loop {
        tokio::select! {
            _ = shared.quit.pop() => {
                debug!(worker, "received quit");
                return;
            }
            item = shared.input.pop(), if input_open => match item {
                Some(item) => {
                    debug!(worker, id = %item.id, "received work from input");
                    shared.handle(item, worker).await;
                }
                None => {
                    debug!(worker, "input drained, serving retries only");
                    input_open = false;
                }
            },
            item = shared.retry.pop() => match item {
                Some(item) => {
                    debug!(worker, id = %item.id, "received work from retry");
                    shared.handle(item, worker).await;
                }
                None => {
                    shared.close_output();
                    debug!(worker, "retry closed, worker exiting");
                    return;
                }
            },
        }
    }
}

impl<P, R> Shared<P, R>
where
    P: Send + 'static,
    R: Send + 'static,
{
    /// Run one attempt and send the item wherever its status says.
    async fn handle(self: &Arc<Self>, item: WorkItem<P, R>, worker: usize) {
        let span = start_work_span(&item.id, item.retry_count(), worker);
        async {
            let Some((mut item, status)) = self.attempt(item).await else {
                return;
            };
            record_attempt_status(&span, status);
            item.set_status(status);

            match status {
                Status::Success | Status::Failure => {
                    record_state_transition(&span, status, "output");
                    self.push_output(item).await;
                }
                Status::Retry if item.retry_count() < self.max_retries => {
                    record_state_transition(&span, status, "retry");
                    self.push_retry(item);
                }
                _ => {
                    record_state_transition(&span, status, "output");
                    debug!(
                        id = %item.id,
                        retries = item.retry_count(),
                        "retries exhausted, marking failure"
                    );
                    item.set_status(Status::Failure);
                    self.push_output(item).await;
                }
            }
        }
        .instrument(span.clone())
        .await
    }

    /// Invoke the processing function on the blocking pool.
    ///
    /// A panic inside the function is contained and the attempt counts as a
    /// failure. `None` only if the blocking task was cancelled, which happens
    /// when the runtime itself is shutting down.
    async fn attempt(&self, item: WorkItem<P, R>) -> Option<(WorkItem<P, R>, Status)> {
        let process = Arc::clone(&self.process);
        let span = Span::current();
        let id = item.id.clone();

        let joined = tokio::task::spawn_blocking(move || {
            let _enter = span.enter();
            let mut item = item;
            let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| process(&mut item)));
            (item, outcome)
        })
        .await;

        match joined {
            Ok((item, Ok(outcome))) => Some((item, outcome.into())),
            Ok((item, Err(panic))) => {
                error!(
                    id = %item.id,
                    panic = panic_message(&*panic),
                    "processing function panicked, marking failure"
                );
                Some((item, Status::Failure))
            }
            Err(e) => {
                error!(%id, error = %e, "processing task did not complete, work item lost");
                None
            }
        }
    }

    async fn push_output(&self, mut item: WorkItem<P, R>) {
        match item.status() {
            Status::Success => self.hooks.register_success(&item),
            _ => self.hooks.register_failure(&item),
        }
        item.completed_at = Some(Utc::now());

        let id = item.id.clone();
        match self.output.push(item).await {
            Ok(()) => debug!(%id, "pushed to output"),
            Err(e) => error!(%id, error = %e, "could not deliver work item"),
        }
        self.maintain_retry();
    }

    /// Loop an item back through the retry queue.
    ///
    /// The push happens on its own task: with a small herd every worker may
    /// be busy here, and nobody would be left to take from retry.
    fn push_retry(self: &Arc<Self>, mut item: WorkItem<P, R>) {
        item.increment_retries();
        self.hooks.register_retry(&item);

        let shared = Arc::clone(self);
        tokio::spawn(
            async move {
                let id = item.id.clone();
                match shared.retry.push(item).await {
                    Ok(()) => debug!(%id, "pushed to retry"),
                    Err(e) => error!(%id, error = %e, "could not requeue work item"),
                }
            }
            .in_current_span(),
        );
    }
}

pub(super) fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}
