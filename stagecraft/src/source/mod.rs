//! Pull-based data sources that feed a driver loop.
//!
//! ## Contract
//!
//! ```text
//! loop {
//!     if !src.has_value() { src.wait(); }   // wait returns once a value or close is visible
//!     if src.is_closed() { break; }
//!     consume(src.get());                    // valid: a value is buffered
//! }
//! ```
//!
//! A source endpoint is driven by exactly one thread. Parallel pipelines give
//! every child its own endpoint by cloning; endpoints that share an underlying
//! queue (see [`QueueSource`]) split its items between them.

mod iter;
mod queue;

pub use iter::IterSource;
pub use queue::{QueueSource, SharedQueue};

/// Pull endpoint with has-value / wait / closed / get semantics.
pub trait Source {
    type Item;

    /// Whether a value can be taken right now without blocking.
    fn has_value(&mut self) -> bool;

    /// Block until a value is available or the source is closed.
    fn wait(&mut self);

    /// Whether the source is closed and has nothing left for this endpoint.
    fn is_closed(&mut self) -> bool;

    /// Take the next value.
    ///
    /// Only valid after `has_value()` (or `wait()`) succeeded and `is_closed()`
    /// returned `false`.
    fn get(&mut self) -> Self::Item;
}
