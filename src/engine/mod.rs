//! The herd: a resizable pool of workers draining input and retry queues.
//!
//! Items flow producer → input → worker → output, or loop back through
//! retry while retries remain. Retry closes exactly when input is closed
//! and every item pushed to input has reached output. The first worker to
//! see retry closed closes output, which ends the result stream.

mod hooks;
mod worker;

pub use hooks::Callback;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_channel::Receiver;
use futures::{Stream, StreamExt};
use futures::future::BoxFuture;
use tracing::{debug, info, warn};

use crate::config::HerdConfig;
use crate::error::{Error, Result};
use crate::model::{Outcome, Status, WorkItem};
use crate::queue::{Handoff, Queue};
use crate::telemetry::metrics::MetricsSnapshot;

use hooks::Hooks;

/// The caller-supplied processing function. Runs once per attempt and may
/// rewrite the item's payload and result in place.
pub type ProcessFn<P, R> = dyn Fn(&mut WorkItem<P, R>) -> Outcome + Send + Sync;

pub const NEGATIVE_HERD_SIZE: &str = "herd size cannot be negative";

/// What a resize request did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resize {
    /// `Success` if the request was applied (or already satisfied),
    /// `Retry` if it was rejected.
    pub status: Status,
    /// Herd size after the request.
    pub num: usize,
    pub msg: String,
}

impl Resize {
    pub fn is_rejected(&self) -> bool {
        self.status != Status::Success
    }
}

#[derive(Debug, Default)]
struct PoolState {
    target: usize,
    started: bool,
}

struct Shared<P, R> {
    input: Queue<WorkItem<P, R>>,
    retry: Queue<WorkItem<P, R>>,
    output: Queue<WorkItem<P, R>>,
    /// Retirement signals. Each one is consumed by exactly one worker.
    quit: Queue<()>,
    process: Arc<ProcessFn<P, R>>,
    hooks: Hooks<P, R>,
    max_retries: u32,
    pool: Mutex<PoolState>,
    resize_lock: tokio::sync::Mutex<()>,
    live: AtomicUsize,
    next_worker: AtomicUsize,
}

impl<P, R> Shared<P, R> {
    fn pool(&self) -> std::sync::MutexGuard<'_, PoolState> {
        self.pool.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Close retry once input is closed and every submitted item has
    /// reached output. Checked on every output push and on input close.
    fn maintain_retry(&self) {
        let input = &self.input;
        let output = &self.output;
        self.retry
            .close_when(|| input.is_closed() && input.count() == output.count());
    }

    fn close_output(&self) {
        if self.output.close() {
            // Every worker is on its way out; pending shrinks must not wait
            // for a receiver that will never come.
            self.quit.close();
            self.quit.discard_pending();
        }
    }
}

/// Handle to a running herd. Cheap to clone.
pub struct Herd<P, R = ()> {
    shared: Arc<Shared<P, R>>,
}

impl<P, R> Clone for Herd<P, R> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

/// Builder for a [`Herd`].
pub struct HerdBuilder<P, R = ()> {
    process: Arc<ProcessFn<P, R>>,
    config: HerdConfig,
    hooks: Hooks<P, R>,
}

impl<P, R> HerdBuilder<P, R> {
    pub fn config(mut self, config: HerdConfig) -> Self {
        self.config = config;
        self
    }

    pub fn herd_size(mut self, n: usize) -> Self {
        self.config.herd_size = n;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    /// Called once for every item that terminates with `Success`.
    pub fn on_success(mut self, f: impl Fn(&WorkItem<P, R>) + Send + Sync + 'static) -> Self {
        self.hooks.success.push(Arc::new(f));
        self
    }

    /// Called once per retry loopback, after the retry count is bumped.
    pub fn on_retry(mut self, f: impl Fn(&WorkItem<P, R>) + Send + Sync + 'static) -> Self {
        self.hooks.retry.push(Arc::new(f));
        self
    }

    /// Called once for every item that terminates with `Failure`.
    pub fn on_failure(mut self, f: impl Fn(&WorkItem<P, R>) + Send + Sync + 'static) -> Self {
        self.hooks.failure.push(Arc::new(f));
        self
    }

    pub fn build(self) -> Herd<P, R> {
        Herd {
            shared: Arc::new(Shared {
                input: Queue::new("input"),
                retry: Queue::new("retry"),
                output: Queue::new("output"),
                quit: Queue::new("quit"),
                process: self.process,
                hooks: self.hooks,
                max_retries: self.config.max_retries,
                pool: Mutex::new(PoolState {
                    target: self.config.herd_size,
                    started: false,
                }),
                resize_lock: tokio::sync::Mutex::new(()),
                live: AtomicUsize::new(0),
                next_worker: AtomicUsize::new(0),
            }),
        }
    }
}

impl<P, R> Herd<P, R>
where
    P: Send + 'static,
    R: Send + 'static,
{
    pub fn builder(
        process: impl Fn(&mut WorkItem<P, R>) -> Outcome + Send + Sync + 'static,
    ) -> HerdBuilder<P, R> {
        HerdBuilder {
            process: Arc::new(process),
            config: HerdConfig::default(),
            hooks: Hooks::new(),
        }
    }

    pub fn new(
        process: impl Fn(&mut WorkItem<P, R>) -> Outcome + Send + Sync + 'static,
        config: HerdConfig,
    ) -> Self {
        Self::builder(process).config(config).build()
    }

    /// Spawn the configured number of workers on the current tokio runtime.
    ///
    /// Resizes requested before `start` only move the target. Calling
    /// `start` twice is a no-op.
    pub fn start(&self) {
        let target = {
            let mut pool = self.shared.pool();
            if pool.started {
                warn!("herd already started");
                return;
            }
            pool.started = true;
            pool.target
        };
        info!(herd_size = target, max_retries = self.shared.max_retries, "starting herd");
        self.spawn_workers(target);
    }

    /// Hand one item to a worker, waiting until a worker has taken it.
    pub async fn submit(&self, item: WorkItem<P, R>) -> Result<()> {
        let id = item.id.clone();
        self.shared.input.push(item).await.map_err(|e| match e {
            Error::QueueClosed(_) => Error::InputClosed,
            other => other,
        })?;
        debug!(%id, "pushed to input");
        Ok(())
    }

    /// Signal that no more work will be submitted. Idempotent.
    ///
    /// Must not race a `submit`: call it after the last submit returns.
    pub fn close_input(&self) {
        if self.shared.input.close() {
            self.shared.maintain_retry();
        }
    }

    /// The completed-items stream. Ends once every submitted item has been
    /// delivered and the herd has shut down.
    pub fn results(&self) -> Results<P, R> {
        Results {
            rx: self.shared.output.receiver(),
        }
    }

    pub fn herd_size(&self) -> usize {
        self.shared.pool().target
    }

    pub fn max_retries(&self) -> u32 {
        self.shared.max_retries
    }

    /// Workers currently running their loop.
    pub fn live_workers(&self) -> usize {
        self.shared.live.load(Ordering::SeqCst)
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.shared.hooks.metrics.snapshot()
    }

    pub fn is_input_closed(&self) -> bool {
        self.shared.input.is_closed()
    }

    pub fn is_retry_closed(&self) -> bool {
        self.shared.retry.is_closed()
    }

    pub fn is_output_closed(&self) -> bool {
        self.shared.output.is_closed()
    }

    /// Add `n` workers and raise the target accordingly.
    pub async fn grow(&self, n: usize) {
        let _serial = self.shared.resize_lock.lock().await;
        let started = {
            let mut pool = self.shared.pool();
            pool.target += n;
            pool.started
        };
        if started {
            self.spawn_workers(n);
        }
    }

    /// Retire `n` workers and lower the target accordingly.
    ///
    /// Any `n` workers exit, each at its next wait. Returns once all `n`
    /// signals have been taken, so it waits while every worker is busy
    /// processing. After shutdown it returns at once.
    pub async fn shrink(&self, n: usize) {
        let _serial = self.shared.resize_lock.lock().await;
        let (n, started) = {
            let mut pool = self.shared.pool();
            let n = n.min(pool.target);
            pool.target -= n;
            (n, pool.started)
        };
        if started {
            self.retire_workers(n).await;
        }
    }

    /// Converge the herd to `num` workers.
    ///
    /// Negative sizes are rejected with status `Retry` and no state change.
    pub async fn update_herd_size(&self, num: i64) -> Resize {
        let _serial = self.shared.resize_lock.lock().await;

        let Ok(num) = usize::try_from(num) else {
            warn!(requested = num, "{NEGATIVE_HERD_SIZE}");
            return Resize {
                status: Status::Retry,
                num: self.herd_size(),
                msg: NEGATIVE_HERD_SIZE.to_string(),
            };
        };

        let (old, started) = {
            let mut pool = self.shared.pool();
            let old = pool.target;
            pool.target = num;
            (old, pool.started)
        };

        if old == num {
            let msg = format!("herd size already {num}");
            info!("{msg}");
            return Resize {
                status: Status::Success,
                num,
                msg,
            };
        }

        if started {
            if num > old {
                self.spawn_workers(num - old);
            } else {
                self.retire_workers(old - num).await;
            }
        }
        info!(from = old, to = num, "herd resized");

        Resize {
            status: Status::Success,
            num,
            msg: "success".to_string(),
        }
    }

    fn spawn_workers(&self, n: usize) {
        for _ in 0..n {
            let worker = self.shared.next_worker.fetch_add(1, Ordering::SeqCst);
            debug!(worker, "spawning worker");
            tokio::spawn(worker::run(Arc::clone(&self.shared), worker));
        }
    }

    async fn retire_workers(&self, n: usize) {
        for sent in 0..n {
            if self.shared.quit.push(()).await.is_err() {
                debug!(sent, requested = n, "herd already shut down, no workers to retire");
                break;
            }
        }
    }
}

impl<P, R> std::fmt::Debug for Herd<P, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Herd")
            .field("pool", &*self.shared.pool())
            .field("max_retries", &self.shared.max_retries)
            .field("live", &self.shared.live.load(Ordering::SeqCst))
            .field("input", &self.shared.input)
            .field("retry", &self.shared.retry)
            .field("output", &self.shared.output)
            .finish()
    }
}

/// Receiving side of the output queue.
pub struct Results<P, R = ()> {
    rx: Receiver<Handoff<WorkItem<P, R>>>,
}

impl<P, R> Clone for Results<P, R> {
    fn clone(&self) -> Self {
        Self {
            rx: self.rx.clone(),
        }
    }
}

impl<P, R> Results<P, R> {
    /// Next completed item, or `None` once the herd has shut down.
    pub async fn recv(&self) -> Option<WorkItem<P, R>> {
        self.rx.recv().await.ok().map(Handoff::take)
    }

    pub fn into_stream(self) -> impl Stream<Item = WorkItem<P, R>> {
        self.rx.map(Handoff::take)
    }
}

/// The resize/inspect surface of a herd, independent of its item types.
pub trait HerdControl: Send + Sync {
    fn herd_size(&self) -> usize;

    fn metrics(&self) -> MetricsSnapshot;

    fn update_herd_size(&self, num: i64) -> BoxFuture<'_, Resize>;
}

impl<P, R> HerdControl for Herd<P, R>
where
    P: Send + 'static,
    R: Send + 'static,
{
    fn herd_size(&self) -> usize {
        Herd::herd_size(self)
    }

    fn metrics(&self) -> MetricsSnapshot {
        Herd::metrics(self)
    }

    fn update_herd_size(&self, num: i64) -> BoxFuture<'_, Resize> {
        Box::pin(Herd::update_herd_size(self, num))
    }
}
