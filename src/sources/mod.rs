//! Stream constructors.
//!
//! Sources that own their data spawn a task that emits every value and then
//! closes the stream; they stop early when an emit fails (the stream was closed
//! downstream or cancelled). They must be called inside a tokio runtime.

use futures_core::Stream;
use tokio_stream::StreamExt;

use crate::core::{channel, Config, Options, Reader, Writer};
use crate::util::caller;

/// Create a raw writer/reader pair.
///
/// The caller owns the writer and must close (or drop) it when done. Only
/// `capacity` and `cancellation` of `options` apply.
#[track_caller]
pub fn new<T>(options: Options) -> (Reader<T>, Writer<T>) {
    let config = options.build("New", caller());
    channel(config.capacity, config.cancel)
}

/// Stream the values of a vector.
#[track_caller]
pub fn from_slice<T>(values: Vec<T>, options: Options) -> Reader<T>
where
    T: Send + 'static,
{
    let config = options.build("FromSlice", caller());
    spawn_iter(values.into_iter(), config)
}

/// Stream the values of any iterator.
#[track_caller]
pub fn from_iter<I>(values: I, options: Options) -> Reader<I::Item>
where
    I: IntoIterator,
    I::IntoIter: Send + 'static,
    I::Item: Send + 'static,
{
    let config = options.build("FromIter", caller());
    spawn_iter(values.into_iter(), config)
}

fn spawn_iter<I>(values: I, config: Config) -> Reader<I::Item>
where
    I: Iterator + Send + 'static,
    I::Item: Send + 'static,
{
    let (reader, writer) = channel(config.capacity, config.cancel);
    tokio::spawn(async move {
        for value in values {
            if writer.emit(value).await.is_err() {
                break;
            }
        }
        writer.close(None);
    });
    reader
}

/// Stream the items of an external feed.
#[track_caller]
pub fn from_stream<S>(feed: S, options: Options) -> Reader<S::Item>
where
    S: Stream + Send + 'static,
    S::Item: Send + 'static,
{
    let config = options.build("FromStream", caller());
    let (reader, writer) = channel(config.capacity, config.cancel.clone());
    let cancel = config.cancel;

    tokio::spawn(async move {
        tokio::pin!(feed);
        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    writer.close(Some(crate::Error::Cancelled));
                    break;
                }
                next = feed.next() => next,
            };
            let Some(value) = next else { break };
            if writer.emit(value).await.is_err() {
                break;
            }
        }
        writer.close(None);
    });
    reader
}
