//! Method forms of the stage constructors, for chaining off a [`Reader`].

use std::future::Future;

use crate::core::{Context, Options, Reader};
use crate::error::Result;
use crate::processors::{filter, map, map_many, Emitter};
use crate::sinks::consume;

impl<T: Send + 'static> Reader<T> {
    /// See [`map`](crate::processors::map)
    #[track_caller]
    pub fn map<U, F, Fut>(self, transform: F, options: Options) -> Reader<U>
    where
        F: Fn(Context, T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<U>> + Send,
        U: Send + 'static,
    {
        map(self, transform, options)
    }

    /// See [`filter`](crate::processors::filter)
    #[track_caller]
    pub fn filter<F>(self, predicate: F, options: Options) -> Reader<T>
    where
        F: Fn(&Context, &T) -> Result<bool> + Send + Sync + 'static,
    {
        filter(self, predicate, options)
    }

    /// See [`map_many`](crate::processors::map_many)
    #[track_caller]
    pub fn map_many<U, F, Fut>(self, stage: F, options: Options) -> Reader<U>
    where
        F: FnOnce(Context, Reader<T>, Emitter<U>) -> Fut + Send + 'static,
        Fut: Future<Output = Result<()>> + Send,
        U: Send + 'static,
    {
        map_many(self, stage, options)
    }

    /// See [`consume`](crate::sinks::consume)
    #[track_caller]
    pub fn consume<F, Fut>(
        self,
        side_effect: F,
        options: Options,
    ) -> impl Future<Output = Result<()>> + Send
    where
        F: Fn(Context, T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send,
    {
        consume(self, side_effect, options)
    }
}
