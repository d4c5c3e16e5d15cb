//! Error types for streams and stages.

use std::sync::Arc;

/// The main error type.
///
/// Errors are shared between every party that observes a closed stream, so the
/// type is cheap to clone: foreign errors are kept behind an [`Arc`].
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// A stage callback failed. Routed through the stage's error policy.
    #[error("stage function failed: {0}")]
    User(Arc<dyn std::error::Error + Send + Sync>),

    /// The cancellation token fired. Always fatal to the stream.
    #[error("stream was cancelled")]
    Cancelled,

    /// The stream was closed without an explicit reason.
    #[error("stream is closed")]
    Closed,

    /// A stage callback panicked. Always fatal to the stream.
    #[error("stage function panicked: {0}")]
    Panicked(String),

    /// A failure described only by a message.
    #[error("{0}")]
    Custom(String),
}

impl Error {
    /// Wrap any error returned by a stage callback
    pub fn user<E: std::error::Error + Send + Sync + 'static>(error: E) -> Self {
        Error::User(Arc::new(error))
    }

    /// Create a custom error with a message
    pub fn custom<S: Into<String>>(message: S) -> Self {
        Error::Custom(message.into())
    }

    /// True for the default close reason.
    pub fn is_closed(&self) -> bool {
        matches!(self, Error::Closed)
    }

    /// True when the stream stopped because of cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }

    /// Errors that bypass the error policy and always stop a stage.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Cancelled | Error::Panicked(_))
    }
}

impl From<Box<dyn std::error::Error + Send + Sync>> for Error {
    fn from(e: Box<dyn std::error::Error + Send + Sync>) -> Self {
        Error::User(Arc::from(e))
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Custom(s)
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Custom(s.to_string())
    }
}

/// Convenience type alias for Results in this crate
pub type Result<T> = std::result::Result<T, Error>;

/// Helper trait for turning foreign results into stage results
pub trait IntoError<T> {
    fn into_stage_error(self) -> Result<T>;
}

impl<T, E> IntoError<T> for std::result::Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn into_stage_error(self) -> Result<T> {
        self.map_err(Error::user)
    }
}
