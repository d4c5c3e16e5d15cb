//! Transforming stages.
//!
//! [`map`] and [`filter`] are worker-pool stages: each item is handled
//! independently by one of `parallelism` workers. [`map_many`] hands the whole
//! input to a single stateful function.

pub mod combinators;
pub mod map_many;

use async_trait::async_trait;
use std::future::Future;
use std::marker::PhantomData;

use crate::core::{channel, Context, Options, Reader};
use crate::error::Result;
use crate::pipeline::{Operator, WorkerPool};
use crate::util::caller;

pub use map_many::{map_many, Emitter};

/// Operator behind [`map`].
pub struct MapOperator<F, T, U> {
    f: F,
    _phantom: PhantomData<fn(T) -> U>,
}

impl<F, T, U> MapOperator<F, T, U> {
    pub fn new(f: F) -> Self {
        Self {
            f,
            _phantom: PhantomData,
        }
    }
}

#[async_trait]
impl<F, Fut, T, U> Operator for MapOperator<F, T, U>
where
    F: Fn(Context, T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<U>> + Send,
    T: Send + 'static,
    U: Send + 'static,
{
    type Input = T;
    type Output = U;

    async fn apply(&self, ctx: Context, item: T) -> Result<Option<U>> {
        (self.f)(ctx, item).await.map(Some)
    }
}

/// Operator behind [`filter`].
pub struct FilterOperator<F, T> {
    predicate: F,
    _phantom: PhantomData<fn(T)>,
}

impl<F, T> FilterOperator<F, T> {
    pub fn new(predicate: F) -> Self {
        Self {
            predicate,
            _phantom: PhantomData,
        }
    }
}

#[async_trait]
impl<F, T> Operator for FilterOperator<F, T>
where
    F: Fn(&Context, &T) -> Result<bool> + Send + Sync + 'static,
    T: Send + 'static,
{
    type Input = T;
    type Output = T;

    async fn apply(&self, ctx: Context, item: T) -> Result<Option<T>> {
        let keep = (self.predicate)(&ctx, &item)?;
        Ok(keep.then_some(item))
    }
}

/// Transform every item with `transform`.
///
/// Every successful result is forwarded, whatever its value. Failures go
/// through the stage's error policy.
///
/// ```rust
/// use lazyweld::prelude::*;
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let nums = from_slice(vec![1, 2, 3], Options::new());
/// let doubled = map(nums, |_ctx, x: i32| async move { Ok(x * 2) }, Options::new());
/// assert_eq!(doubled.collect().await, vec![2, 4, 6]);
/// # });
/// ```
#[track_caller]
pub fn map<T, U, F, Fut>(input: Reader<T>, transform: F, options: Options) -> Reader<U>
where
    F: Fn(Context, T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<U>> + Send,
    T: Send + 'static,
    U: Send + 'static,
{
    let config = options.build("Map", caller());
    let (reader, writer) = channel(config.capacity, config.cancel.clone());
    WorkerPool::spawn(
        &config,
        input,
        MapOperator::new(transform),
        Some(writer),
    )
    .detach();
    reader
}

/// Keep the items for which `predicate` returns `Ok(true)`.
///
/// `Ok(false)` drops the item silently; an error goes through the stage's
/// error policy.
#[track_caller]
pub fn filter<T, F>(input: Reader<T>, predicate: F, options: Options) -> Reader<T>
where
    F: Fn(&Context, &T) -> Result<bool> + Send + Sync + 'static,
    T: Send + 'static,
{
    let config = options.build("Filter", caller());
    let (reader, writer) = channel(config.capacity, config.cancel.clone());
    WorkerPool::spawn(
        &config,
        input,
        FilterOperator::new(predicate),
        Some(writer),
    )
    .detach();
    reader
}
