//! The worker pool shared by every stage.
//!
//! A stage is an [`Operator`] applied to each item of an input [`Reader`] by
//! `parallelism` tokio tasks. Workers pull from the same queue, so an item goes
//! to whichever worker is ready first and output order across workers is not
//! preserved.
//!
//! Exit protocol of a worker:
//!
//! - input exhausted: nothing to close, the worker just leaves;
//! - the operator failed and the policy said [`Decision::Stop`]: close the
//!   input with the error, which unblocks upstream producers and lets sibling
//!   workers drain what is buffered and exit;
//! - the output was closed downstream: close the input with that reason.
//!
//! The output is closed once, by the last worker to leave, so items still in
//! flight in sibling workers are delivered first. Its reason is the first
//! worker failure, or else the input's close reason, so cancellation and
//! upstream failures reach the end of the pipeline.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use futures::FutureExt;
use tokio::task::JoinSet;

use crate::core::{Config, Context, Decision, Reader, Writer};
use crate::error::{Error, Result};
use crate::util::panic_message;

/// Per-item logic of a stage.
#[async_trait]
pub trait Operator: Send + Sync + 'static {
    type Input: Send + 'static;
    type Output: Send + 'static;

    /// Apply the stage to one item. `Some` is forwarded downstream, `None`
    /// produces nothing.
    async fn apply(&self, ctx: Context, item: Self::Input) -> Result<Option<Self::Output>>;
}

/// A running pool of workers.
pub struct WorkerPool {
    name: Arc<str>,
    workers: JoinSet<Result<()>>,
    first_failure: Arc<OnceLock<Error>>,
}

impl WorkerPool {
    /// Spawn `config.parallelism` workers applying `op` to `input`, forwarding
    /// results to `output` when there is one.
    pub fn spawn<O: Operator>(
        config: &Config,
        input: Reader<O::Input>,
        op: O,
        output: Option<Writer<O::Output>>,
    ) -> Self {
        let op = Arc::new(op);
        let output = output.map(Arc::new);
        let first_failure = Arc::new(OnceLock::new());
        let remaining = Arc::new(AtomicUsize::new(config.parallelism));
        let mut workers = JoinSet::new();

        tracing::debug!(stage = %config.name, workers = config.parallelism, "starting stage");
        for idx in 0..config.parallelism {
            let worker = Worker {
                ctx: Context::new(config.name.clone(), idx, config.cancel.clone()),
                config: config.clone(),
                input: input.clone(),
                op: op.clone(),
                output: output.clone(),
                first_failure: first_failure.clone(),
                remaining: remaining.clone(),
            };
            workers.spawn(worker.run());
        }

        Self {
            name: config.name.clone(),
            workers,
            first_failure,
        }
    }

    /// Let the workers run to completion in the background.
    pub fn detach(mut self) {
        self.workers.detach_all();
    }

    /// Wait for every worker to exit and return the first failure any of them
    /// hit, in time order.
    pub async fn join(mut self) -> Result<()> {
        while let Some(joined) = self.workers.join_next().await {
            if let Err(e) = joined {
                // Panics inside the operator are caught by the worker, so this is
                // an abort or a panic in the pool itself.
                let _ = self
                    .first_failure
                    .set(Error::Panicked(format!("worker task failed: {e}")));
            }
        }
        tracing::debug!(stage = %self.name, "stage finished");
        match self.first_failure.get() {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

struct Worker<O: Operator> {
    ctx: Context,
    config: Config,
    input: Reader<O::Input>,
    op: Arc<O>,
    output: Option<Arc<Writer<O::Output>>>,
    first_failure: Arc<OnceLock<Error>>,
    /// Workers of this pool that have not exited yet
    remaining: Arc<AtomicUsize>,
}

impl<O: Operator> Worker<O> {
    async fn run(self) -> Result<()> {
        let outcome = self.drive().await;

        if let Err(err) = &outcome {
            let _ = self.first_failure.set(err.clone());
        }

        if self.remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
            if let Some(output) = &self.output {
                let reason = match self.first_failure.get() {
                    Some(err) => Some(err.clone()),
                    None => self.input.reason(),
                };
                output.close(reason);
            }
        }
        tracing::trace!(
            stage = self.ctx.name(),
            worker = self.ctx.worker_idx(),
            "worker exited"
        );
        outcome
    }

    async fn drive(&self) -> Result<()> {
        while let Some(item) = self.input.recv().await {
            let applied = AssertUnwindSafe(self.op.apply(self.ctx.clone(), item))
                .catch_unwind()
                .await
                .unwrap_or_else(|panic| Err(Error::Panicked(panic_message(&*panic))));

            match applied {
                Ok(Some(out)) => {
                    if let Some(output) = &self.output {
                        if let Err(reason) = output.emit(out).await {
                            self.input.close(Some(reason.clone()));
                            return Err(reason);
                        }
                    }
                }
                Ok(None) => {}
                Err(err) => match self.config.decide(&err) {
                    Decision::Ignore => {}
                    Decision::Stop => {
                        let reason = if self.ctx.is_cancelled() {
                            Error::Cancelled
                        } else {
                            err
                        };
                        tracing::debug!(
                            stage = self.ctx.name(),
                            worker = self.ctx.worker_idx(),
                            error = %reason,
                            "stopping stage"
                        );
                        self.input.close(Some(reason.clone()));
                        return Err(reason);
                    }
                },
            }
        }
        Ok(())
    }
}
