//! Per-worker execution context handed to every stage callback.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

/// Identity and cancellation handle of one stage worker.
///
/// Created once per worker when the stage starts and never changed afterwards.
/// Cloning is cheap.
#[derive(Debug, Clone)]
pub struct Context {
    name: Arc<str>,
    worker_idx: usize,
    cancel: CancellationToken,
}

impl Context {
    pub(crate) fn new(name: Arc<str>, worker_idx: usize, cancel: CancellationToken) -> Self {
        Self {
            name,
            worker_idx,
            cancel,
        }
    }

    /// Name of the stage this worker belongs to
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Index of this worker in `0..parallelism`
    pub fn worker_idx(&self) -> usize {
        self.worker_idx
    }

    /// Whether the stage's cancellation token has fired
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves once the stage's cancellation token fires
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await
    }

    /// The stage's cancellation token
    pub fn token(&self) -> &CancellationToken {
        &self.cancel
    }
}
