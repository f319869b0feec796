//! Composable transformation pipelines over pull-based sources.
//!
//! Build a chain of pure stages, bind a [`Source`](source::Source), attach a
//! consumer, and run it either on the calling thread or fanned out across idle
//! workers of a [`ThreadPool`](pool::ThreadPool), with exactly one completion
//! signal per run.
//!
//! ## Modules
//!
//! - [`pipeline`]: `Stage` → `StartableStage` → `RunnableStage`
//! - [`source`]: the `Source` capability plus queue and iterator sources
//! - [`pool`]: the `ThreadPool` / `Worker` capability and `WorkerPool`
//! - [`sync`]: `CompletionLatch` and `AtomicCounter`
//! - [`config`]: `PoolOptions`
//!
//! ## Example
//!
//! ```
//! use stagecraft::source::IterSource;
//! use stagecraft::Stage;
//! use std::sync::{Arc, Mutex};
//!
//! let out = Arc::new(Mutex::new(Vec::new()));
//! let sink = Arc::clone(&out);
//!
//! let mut pipeline = Stage::new(|x: i32| x + 1)
//!     .filter(|x| x * 2)
//!     .source(IterSource::new(vec![1, 2, 3]))
//!     .consume(move |v| sink.lock().unwrap().push(v));
//!
//! pipeline.run()?;
//! pipeline.wait()?;
//! assert_eq!(*out.lock().unwrap(), vec![4, 6, 8]);
//! # Ok::<(), stagecraft::PipelineError>(())
//! ```

pub mod config;
pub mod error;
pub mod pipeline;
pub mod pool;
pub mod source;
pub mod sync;

pub use config::PoolOptions;
pub use error::{PipelineError, PipelineResult};
pub use pipeline::{
    ChildHandle, CompletionMode, DriverMetrics, RunMetrics, RunState, RunnableStage, Stage,
    StartableStage, StopHandle,
};

use tracing_subscriber::EnvFilter;

/// Install a `tracing` fmt subscriber filtered by `RUST_LOG` (default `info`).
///
/// Safe to call more than once; only the first call installs anything.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_thread_names(true)
        .try_init()
        .is_ok();

    if installed {
        tracing::debug!("logging initialized");
    }
}
