//! The bounded stream primitive: a [`Writer`]/[`Reader`] pair over a tokio
//! channel with a single-assignment close reason.
//!
//! The reason cell is the one source of truth for "why did this stream stop".
//! It moves from empty to a value exactly once; every later close is a no-op
//! and every emit after that returns the stored value. Closing stores the
//! reason *before* the channel is torn down, so anybody who sees the channel
//! gone also sees a reason.

use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use futures_core::Stream;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};

struct Shared<T> {
    /// The only long-lived sender. Taken out (and dropped) on close.
    tx: Mutex<Option<mpsc::Sender<T>>>,
    rx: tokio::sync::Mutex<mpsc::Receiver<T>>,
    reason: OnceLock<Error>,
    /// Fires when the stream closes, waking emitters blocked on a full queue.
    closed: CancellationToken,
    cancel: CancellationToken,
    capacity: usize,
}

impl<T> Shared<T> {
    fn sender(&self) -> MutexGuard<'_, Option<mpsc::Sender<T>>> {
        self.tx.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn close(&self, reason: Option<Error>) -> bool {
        if self.reason.set(reason.unwrap_or(Error::Closed)).is_err() {
            return false;
        }
        self.closed.cancel();
        drop(self.sender().take());
        tracing::trace!(reason = %self.stored(), "stream closed");
        true
    }

    /// The stored reason. Only called once a close has been observed, where the
    /// cell is guaranteed to be set; falls back to closing it otherwise.
    fn stored(&self) -> Error {
        match self.reason.get() {
            Some(reason) => reason.clone(),
            None => {
                self.close(None);
                self.reason.get().cloned().unwrap_or(Error::Closed)
            }
        }
    }

    fn len(&self) -> usize {
        // A worker holding the lock is parked in `recv`, so nothing is buffered.
        self.rx.try_lock().map(|rx| rx.len()).unwrap_or(0)
    }
}

/// Create a connected writer/reader pair.
///
/// `capacity` is the number of buffered items; `0` makes every emit wait until
/// a reader has taken the item. `cancel` aborts blocked emits and closes the
/// stream with [`Error::Cancelled`].
pub fn channel<T>(capacity: usize, cancel: CancellationToken) -> (Reader<T>, Writer<T>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let shared = Arc::new(Shared {
        tx: Mutex::new(Some(tx)),
        rx: tokio::sync::Mutex::new(rx),
        reason: OnceLock::new(),
        closed: CancellationToken::new(),
        cancel,
        capacity,
    });

    let reader = Reader {
        inner: Arc::new(ReaderInner {
            shared: shared.clone(),
        }),
    };
    (reader, Writer { shared })
}

/// Producer side of a stream.
///
/// All methods take `&self`; share a writer between tasks with [`Arc`] to fan
/// in several producers. Dropping the writer closes the stream with the
/// default reason if it is still open.
pub struct Writer<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Writer<T> {
    /// Send `value` downstream.
    ///
    /// Waits for a free slot. Returns the stored close reason if the stream is
    /// already closed, gets closed while waiting, or if the cancellation token
    /// fires first (in which case [`Error::Cancelled`] is stored unless another
    /// reason got there earlier).
    pub async fn emit(&self, value: T) -> Result<()> {
        let shared = &*self.shared;
        if let Some(reason) = shared.reason.get() {
            return Err(reason.clone());
        }
        let Some(tx) = shared.sender().clone() else {
            return Err(shared.stored());
        };

        tokio::select! {
            biased;
            _ = shared.cancel.cancelled() => {
                shared.close(Some(Error::Cancelled));
                return Err(shared.stored());
            }
            _ = shared.closed.cancelled() => return Err(shared.stored()),
            sent = tx.send(value) => {
                if sent.is_err() {
                    // every reader is gone
                    return Err(shared.stored());
                }
            }
        }

        if shared.capacity == 0 {
            // The value is already accepted; this only waits for the hand-off.
            tokio::select! {
                biased;
                _ = shared.cancel.cancelled() => {}
                _ = shared.closed.cancelled() => {}
                permit = tx.reserve() => drop(permit),
            }
        }
        Ok(())
    }

    /// Close the stream. The first call stores `reason` (or [`Error::Closed`]
    /// when `None`) and returns `true`; every later call is a no-op.
    pub fn close(&self, reason: Option<Error>) -> bool {
        self.shared.close(reason)
    }

    /// Number of buffered items. Advisory only.
    pub fn len(&self) -> usize {
        self.shared.len()
    }

    /// Whether nothing is buffered. Advisory only.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Configured buffer capacity
    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    /// The close reason, if the stream is closed
    pub fn reason(&self) -> Option<Error> {
        self.shared.reason.get().cloned()
    }

    /// Whether a close reason has been stored
    pub fn is_closed(&self) -> bool {
        self.shared.reason.get().is_some()
    }
}

impl<T> Drop for Writer<T> {
    fn drop(&mut self) {
        self.shared.close(None);
    }
}

impl<T> std::fmt::Debug for Writer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Writer")
            .field("capacity", &self.shared.capacity)
            .field("reason", &self.shared.reason.get())
            .finish()
    }
}

struct ReaderInner<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Drop for ReaderInner<T> {
    fn drop(&mut self) {
        // nobody is left to drain the queue, unblock the producers
        self.shared.close(None);
    }
}

/// Consumer side of a stream.
///
/// Clones share the same queue: each item is received by exactly one of them.
/// Closing through a reader stores the reason in the paired writer, which is
/// how a downstream failure travels upstream.
pub struct Reader<T> {
    inner: Arc<ReaderInner<T>>,
}

impl<T> Clone for Reader<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> Reader<T> {
    /// Receive the next item. Returns `None` once the stream is closed and
    /// every buffered item has been taken.
    pub async fn recv(&self) -> Option<T> {
        self.inner.shared.rx.lock().await.recv().await
    }

    /// Close the paired writer with `reason`. Buffered items stay readable.
    pub fn close(&self, reason: Option<Error>) -> bool {
        self.inner.shared.close(reason)
    }

    /// The close reason, if the stream is closed
    pub fn reason(&self) -> Option<Error> {
        self.inner.shared.reason.get().cloned()
    }

    /// Whether a close reason has been stored
    pub fn is_closed(&self) -> bool {
        self.inner.shared.reason.get().is_some()
    }

    /// Number of buffered items. Advisory only.
    pub fn len(&self) -> usize {
        self.inner.shared.len()
    }

    /// Whether nothing is buffered. Advisory only.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drain the stream into a vector.
    pub async fn collect(self) -> Vec<T> {
        let mut items = Vec::new();
        while let Some(item) = self.recv().await {
            items.push(item);
        }
        items
    }

    /// Adapt the reader into a [`Stream`].
    pub fn into_stream(self) -> impl Stream<Item = T> + Send
    where
        T: Send + 'static,
    {
        futures::stream::unfold(self, |reader| async move {
            let item = reader.recv().await?;
            Some((item, reader))
        })
    }
}

impl<T> std::fmt::Debug for Reader<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reader")
            .field("capacity", &self.inner.shared.capacity)
            .field("reason", &self.inner.shared.reason.get())
            .finish()
    }
}
