//! Core types: the stream primitive, stage configuration and worker context.

pub mod config;
pub mod context;
pub mod stream;

// Re-export core items
pub use config::{Config, Decision, ErrorPolicy, Options};
pub use context::Context;
pub use stream::{channel, Reader, Writer};
