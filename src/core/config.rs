//! Per-stage options and the resolved configuration built from them.

use std::fmt;
use std::panic::Location;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::error::Error;

/// What a stage does with a failed item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Close the stage's input with the error and stop the worker.
    Stop,
    /// Drop the error and move on to the next item.
    Ignore,
}

impl Decision {
    /// Policy that drops every error. This is the default.
    pub fn ignore_all(_: &Error) -> Decision {
        Decision::Ignore
    }

    /// Policy that stops on the first error.
    pub fn stop_all(_: &Error) -> Decision {
        Decision::Stop
    }
}

/// Maps a stage failure to a [`Decision`].
pub type ErrorPolicy = Arc<dyn Fn(&Error) -> Decision + Send + Sync>;

/// Builder for stage options.
///
/// Every setter can be applied any number of times; the last call wins.
///
/// ```rust
/// use lazyweld::prelude::*;
///
/// let opts = Options::new()
///     .capacity(16)
///     .parallelism(4)
///     .on_error(Decision::stop_all)
///     .name("parse");
/// ```
#[derive(Clone, Default)]
pub struct Options {
    capacity: usize,
    parallelism: Option<usize>,
    cancel: Option<CancellationToken>,
    on_error: Option<ErrorPolicy>,
    name: Option<String>,
}

impl Options {
    /// Default options: unbuffered hand-off, one worker, never cancelled,
    /// errors ignored.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the buffer capacity of the stream this stage creates.
    /// `0` means a synchronous hand-off.
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Set the number of workers
    pub fn parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = Some(parallelism);
        self
    }

    /// Set the cancellation token
    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Set the error policy
    pub fn on_error<F>(mut self, policy: F) -> Self
    where
        F: Fn(&Error) -> Decision + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(policy));
        self
    }

    /// Set the stage name used in diagnostics
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Resolve into the immutable per-stage configuration.
    pub(crate) fn build(self, op: &str, caller: &Location<'_>) -> Config {
        let parallelism = match self.parallelism {
            Some(0) => {
                tracing::warn!(stage = op, "parallelism 0 requested, using 1");
                1
            }
            Some(n) => n,
            None => 1,
        };

        Config {
            capacity: self.capacity,
            parallelism,
            cancel: self.cancel.unwrap_or_default(),
            on_error: self
                .on_error
                .unwrap_or_else(|| Arc::new(Decision::ignore_all) as ErrorPolicy),
            name: self
                .name
                .unwrap_or_else(|| format!("{}@{}:{}", op, caller.file(), caller.line()))
                .into(),
        }
    }
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Options")
            .field("capacity", &self.capacity)
            .field("parallelism", &self.parallelism)
            .field("cancel", &self.cancel)
            .field("on_error", &self.on_error.as_ref().map(|_| ".."))
            .field("name", &self.name)
            .finish()
    }
}

/// Resolved stage configuration. Built once per stage and never mutated.
#[derive(Clone)]
pub struct Config {
    pub capacity: usize,
    pub parallelism: usize,
    pub cancel: CancellationToken,
    pub on_error: ErrorPolicy,
    pub name: Arc<str>,
}

impl Config {
    /// Consult the error policy for a failed item.
    ///
    /// Fatal errors and a fired token never reach the policy.
    pub(crate) fn decide(&self, err: &Error) -> Decision {
        if err.is_fatal() || self.cancel.is_cancelled() {
            return Decision::Stop;
        }
        (self.on_error)(err)
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("capacity", &self.capacity)
            .field("parallelism", &self.parallelism)
            .field("cancelled", &self.cancel.is_cancelled())
            .field("name", &self.name)
            .finish()
    }
}
