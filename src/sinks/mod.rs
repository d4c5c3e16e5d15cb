//! The terminal stage.

use async_trait::async_trait;
use std::future::Future;
use std::marker::PhantomData;

use crate::core::{Context, Options, Reader};
use crate::error::Result;
use crate::pipeline::{Operator, WorkerPool};
use crate::util::caller;

/// Operator behind [`consume`].
pub struct ConsumeOperator<F, T> {
    side_effect: F,
    _phantom: PhantomData<fn(T)>,
}

impl<F, T> ConsumeOperator<F, T> {
    pub fn new(side_effect: F) -> Self {
        Self {
            side_effect,
            _phantom: PhantomData,
        }
    }
}

#[async_trait]
impl<F, Fut, T> Operator for ConsumeOperator<F, T>
where
    F: Fn(Context, T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send,
    T: Send + 'static,
{
    type Input = T;
    type Output = ();

    async fn apply(&self, ctx: Context, item: T) -> Result<Option<()>> {
        (self.side_effect)(ctx, item).await.map(|()| None)
    }
}

/// Apply `side_effect` to every item and wait until the input is done.
///
/// Resolves once every worker has exited: either the input was exhausted, or a
/// failure stopped the stage and the workers drained what was already queued.
/// Returns the first failure any worker hit; otherwise the input's close
/// reason when it is anything but [`Error::Closed`](crate::Error::Closed)
/// (an upstream stage stopped, or the pipeline was cancelled); otherwise
/// `Ok(())`.
///
/// The workers start when the returned future is first polled.
///
/// ```rust
/// use lazyweld::prelude::*;
/// use std::sync::atomic::{AtomicU64, Ordering};
/// use std::sync::Arc;
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let total = Arc::new(AtomicU64::new(0));
/// let sum = total.clone();
/// consume(
///     from_slice((1..=100).collect(), Options::new()),
///     move |_ctx, x: u64| {
///         let sum = sum.clone();
///         async move {
///             sum.fetch_add(x, Ordering::Relaxed);
///             Ok(())
///         }
///     },
///     Options::new().parallelism(4),
/// )
/// .await
/// .unwrap();
/// assert_eq!(total.load(Ordering::Relaxed), 5050);
/// # });
/// ```
#[track_caller]
pub fn consume<T, F, Fut>(
    input: Reader<T>,
    side_effect: F,
    options: Options,
) -> impl Future<Output = Result<()>> + Send
where
    F: Fn(Context, T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send,
    T: Send + 'static,
{
    let config = options.build("Consume", caller());

    async move {
        let upstream = input.clone();
        WorkerPool::spawn(&config, input, ConsumeOperator::new(side_effect), None)
            .join()
            .await?;

        match upstream.reason() {
            Some(reason) if !reason.is_closed() => Err(reason),
            _ => Ok(()),
        }
    }
}
