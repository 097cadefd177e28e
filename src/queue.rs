//! Rendezvous queue with a cumulative push counter and a one-way closed latch.
//!
//! The channel itself is MPMC and needs no external locking. The mutex only
//! guards close transitions, so that "is this queue closed, and does some
//! condition hold" can be decided as one atomic fact.
//!
//! Every push carries a one-shot acknowledgement that the consumer fires on
//! receipt. `push` returns only once a consumer holds the item, so the
//! channel's single slot never stands in for a waiting consumer.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_channel::{Receiver, Sender};
use tokio::sync::oneshot;
use tracing::{debug, info};

use crate::error::{Error, Result};

/// An item in flight between a producer and a consumer.
pub(crate) struct Handoff<T> {
    item: T,
    taken: oneshot::Sender<()>,
}

impl<T> Handoff<T> {
    /// Take the item, releasing the producer waiting in [`Queue::push`].
    pub(crate) fn take(self) -> T {
        // The producer may have stopped waiting; the item is ours either way.
        let _ = self.taken.send(());
        self.item
    }
}

pub struct Queue<T> {
    name: &'static str,
    tx: Sender<Handoff<T>>,
    rx: Receiver<Handoff<T>>,
    count: AtomicU64,
    closed: AtomicBool,
    gate: Mutex<()>,
}

impl<T> Queue<T> {
    pub fn new(name: &'static str) -> Self {
        // async-channel has no zero-capacity mode; the acknowledgement in
        // `push` supplies the rendezvous.
        let (tx, rx) = async_channel::bounded(1);
        Self {
            name,
            tx,
            rx,
            count: AtomicU64::new(0),
            closed: AtomicBool::new(false),
            gate: Mutex::new(()),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Hand an item to a consumer, waiting until one has taken it.
    ///
    /// The counter is bumped as soon as the channel accepts the item. From
    /// then on the item is committed: dropping this future still leaves it
    /// for the next consumer. Fails with `QueueClosed` if the queue was closed
    /// first, or if it was [discarded](Self::discard_pending) before anyone
    /// took the item.
    pub async fn push(&self, item: T) -> Result<()> {
        let (taken, acked) = oneshot::channel();
        self.tx
            .send(Handoff { item, taken })
            .await
            .map_err(|_| Error::QueueClosed(self.name))?;
        self.count.fetch_add(1, Ordering::SeqCst);
        acked.await.map_err(|_| Error::QueueClosed(self.name))
    }

    /// Wait for the next item. `None` once the queue is closed and drained.
    ///
    /// Cancel-safe: dropping the future never loses an item.
    pub async fn pop(&self) -> Option<T> {
        self.rx.recv().await.ok().map(Handoff::take)
    }

    /// Close the queue. Returns true only for the call that closed it.
    pub fn close(&self) -> bool {
        self.close_when(|| true)
    }

    /// Close the queue if it is still open and `condition` holds.
    ///
    /// The check and the latch write happen under the queue's mutex, so two
    /// racing callers can never both observe "open and ready to close".
    pub fn close_when(&self, condition: impl FnOnce() -> bool) -> bool {
        let _gate = self
            .gate
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if self.is_closed() || !condition() {
            return false;
        }
        self.tx.close();
        self.closed.store(true, Ordering::SeqCst);
        info!(queue = self.name, count = self.count(), "queue closed");
        true
    }

    /// Drop whatever is still waiting in the channel. Producers blocked on
    /// those items get `QueueClosed`. The counter is left as is.
    pub(crate) fn discard_pending(&self) {
        let mut dropped = 0usize;
        while self.rx.try_recv().is_ok() {
            dropped += 1;
        }
        if dropped > 0 {
            debug!(queue = self.name, dropped, "discarded pending items");
        }
    }

    /// Cumulative number of successful pushes.
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// A receiving handle that sees the same items as [`pop`](Self::pop).
    /// Items must be released with [`Handoff::take`].
    pub(crate) fn receiver(&self) -> Receiver<Handoff<T>> {
        self.rx.clone()
    }
}

impl<T> std::fmt::Debug for Queue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Queue")
            .field("name", &self.name)
            .field("count", &self.count())
            .field("closed", &self.is_closed())
            .finish()
    }
}
