//! Stateful many-to-many stage.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;

use crate::core::{channel, Context, Options, Reader, Writer};
use crate::error::{Error, Result};
use crate::util::{caller, panic_message};

/// Output handle given to a [`map_many`] function.
pub struct Emitter<T> {
    writer: Arc<Writer<T>>,
}

impl<T> Clone for Emitter<T> {
    fn clone(&self) -> Self {
        Self {
            writer: self.writer.clone(),
        }
    }
}

impl<T> Emitter<T> {
    /// Send one output value. Fails with the output's close reason once the
    /// stage downstream stopped or the stage was cancelled.
    pub async fn emit(&self, value: T) -> Result<()> {
        self.writer.emit(value).await
    }

    /// Whether the output stream is already closed
    pub fn is_closed(&self) -> bool {
        self.writer.is_closed()
    }
}

/// Run `stage` once over the whole input.
///
/// The function owns the receive loop and may emit any number of values per
/// input item, which makes it the place for windowing and aggregation. It
/// always runs on a single worker; the `parallelism` option is ignored.
///
/// When the function returns an error (including a failed emit), the input is
/// closed with it. When it returns `Ok`, the output is closed with the input's
/// close reason.
///
/// ```rust
/// use lazyweld::prelude::*;
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let nums = from_slice(vec![1, 2, 3, 4, 5], Options::new());
/// let pairs = map_many(
///     nums,
///     |_ctx, input: Reader<i32>, out: Emitter<i32>| async move {
///         let mut pending = None;
///         while let Some(v) = input.recv().await {
///             match pending.take() {
///                 Some(prev) => out.emit(prev + v).await?,
///                 None => pending = Some(v),
///             }
///         }
///         if let Some(last) = pending {
///             out.emit(last).await?;
///         }
///         Ok::<(), Error>(())
///     },
///     Options::new(),
/// );
/// assert_eq!(pairs.collect().await, vec![3, 7, 5]);
/// # });
/// ```
#[track_caller]
pub fn map_many<T, U, F, Fut>(input: Reader<T>, stage: F, options: Options) -> Reader<U>
where
    F: FnOnce(Context, Reader<T>, Emitter<U>) -> Fut + Send + 'static,
    Fut: Future<Output = Result<()>> + Send,
    T: Send + 'static,
    U: Send + 'static,
{
    let config = options.build("MapMany", caller());
    if config.parallelism > 1 {
        tracing::debug!(stage = %config.name, "map_many always runs a single worker");
    }
    let (reader, writer) = channel(config.capacity, config.cancel.clone());
    let writer = Arc::new(writer);
    let ctx = Context::new(config.name.clone(), 0, config.cancel.clone());

    tokio::spawn(async move {
        let emitter = Emitter {
            writer: writer.clone(),
        };
        let outcome = AssertUnwindSafe(stage(ctx, input.clone(), emitter))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(Error::Panicked(panic_message(&*panic))));

        let reason = match outcome {
            Err(err) => {
                tracing::debug!(stage = %config.name, error = %err, "stopping stage");
                input.close(Some(err.clone()));
                Some(err)
            }
            Ok(()) => input.reason(),
        };
        writer.close(reason);
    });
    reader
}
