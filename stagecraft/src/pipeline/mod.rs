//! Pipeline composition and execution.
//!
//! A pipeline is built in three phases, each its own type:
//!
//! ```text
//! Stage<IN, OUT> ──source(src)──→ StartableStage<IN, OUT, S> ──consume(sink)──→ RunnableStage<S>
//!   filter(f)                       filter(f)                                    on_end / parallel
//!   apply(x)                                                                     run / run_on / wait
//! ```
//!
//! - Stage: immutable composed `IN -> OUT` function
//! - StartableStage: stage plus an owned source
//! - RunnableStage: source plus the folded consumer, and all run state
//!
//! ## Execution
//!
//! ```text
//! run()          caller thread:  driver loop ──→ completion
//! run_on(pool)   one worker:     driver loop ──→ completion
//! parallel(n)    n workers:      child 0 ─┐
//!   .run_on(pool)                child 1 ─┼─→ counter.decrement() == 0 ──→ completion
//!                                child … ─┘
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use stagecraft::pool::WorkerPool;
//! use stagecraft::source::SharedQueue;
//! use stagecraft::Stage;
//!
//! let pool = WorkerPool::with_workers(4)?;
//! let queue = SharedQueue::new();
//!
//! let mut pipeline = Stage::new(|line: String| line.len())
//!     .source(queue.source())
//!     .consume(|len| println!("{len}"))
//!     .parallel(4);
//! pipeline.run_on(&pool)?;
//!
//! queue.push("hello".to_string());
//! queue.close();
//! pipeline.wait()?;
//! # Ok::<(), stagecraft::PipelineError>(())
//! ```

mod completion;
mod driver;
mod metrics;
mod runnable;
mod stage;
mod startable;

pub use completion::CompletionMode;
pub use driver::StopHandle;
pub use metrics::{DriverMetrics, RunMetrics};
pub use runnable::{ChildHandle, RunState, RunnableStage};
pub use stage::Stage;
pub use startable::StartableStage;
