//! Completion synchronization primitives.
//!
//! - `CompletionLatch` - one-shot gate that blocking callers wait on
//! - `AtomicCounter` - lock-free decrement-and-test used for fan-in

mod counter;
mod latch;

pub use counter::AtomicCounter;
pub use latch::CompletionLatch;
