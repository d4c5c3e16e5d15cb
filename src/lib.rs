//! # Lazy concurrent stream stages for Tokio
//!
//! A pipeline is a chain of stages connected by bounded queues. Each stage runs
//! its own pool of tokio tasks and is configured independently with
//! [`Options`](crate::core::Options): buffer capacity, parallelism, cancellation, error
//! policy and a diagnostic name.
//!
//! ## Core Concepts
//!
//! - **Stream**: a [`Writer`](crate::core::Writer)/[`Reader`](crate::core::Reader) pair over a
//!   bounded queue with a close reason that is set exactly once
//! - **Map / Filter**: per-item stages run by `parallelism` workers
//! - **MapMany**: a single stateful function owning the whole input
//! - **Consume**: the terminal stage; awaiting it drives the pipeline to the end
//!
//! A failing stage closes its *input* with the error, which unblocks upstream
//! producers; the closure then travels downstream as each stage drains and
//! closes its output with the same reason. Whatever stopped the pipeline is
//! what [`consume`](crate::sinks::consume) returns.
//!
//! ## Example
//!
//! ```rust
//! use lazyweld::prelude::*;
//! use std::sync::atomic::{AtomicI64, Ordering};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let total = Arc::new(AtomicI64::new(0));
//!     let sum = total.clone();
//!
//!     from_slice((1..=100).collect(), Options::new())
//!         .filter(|_ctx, x: &i64| Ok(x % 2 == 0), Options::new())
//!         .map(|_ctx, x| async move { Ok(x * 2) }, Options::new().parallelism(4))
//!         .consume(
//!             move |_ctx, x| {
//!                 sum.fetch_add(x, Ordering::Relaxed);
//!                 async { Ok(()) }
//!             },
//!             Options::new(),
//!         )
//!         .await?;
//!
//!     assert_eq!(total.load(Ordering::Relaxed), 5100);
//!     Ok(())
//! }
//! ```

pub mod core;
pub mod error;
pub mod pipeline;
pub mod processors;
pub mod sinks;
pub mod sources;
pub mod util;

// Re-export commonly used items
pub mod prelude {
    pub use crate::core::{Context, Decision, Options, Reader, Writer};
    pub use crate::error::{Error, IntoError, Result};
    pub use crate::processors::{filter, map, map_many, Emitter};
    pub use crate::sinks::consume;
    pub use crate::sources::{from_iter, from_slice, from_stream, new};
    pub use tokio_util::sync::CancellationToken;
}

// Re-export main error type
pub use error::{Error, Result};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
