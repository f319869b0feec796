//! Worker pool capability consumed by `RunnableStage::run_on`.
//!
//! ## Architecture
//!
//! ```text
//! ThreadPool::try_acquire_idle() ──→ Worker ──submit(task)──→ runs on pool thread
//!         (non-blocking, may be None)       (false = rejected)
//! ```
//!
//! The pipeline never creates threads. It borrows an idle worker for one
//! driver-loop execution; reclaiming the worker after the task returns is the
//! pool's job. A worker handle that is dropped without a successful submit
//! must go back to the idle set.

mod simple;

pub use simple::{WorkerHandle, WorkerPool};

/// Zero-argument unit of work handed to a worker.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Source of idle workers.
pub trait ThreadPool {
    type Worker: Worker;

    /// Reserve an idle worker, or `None` if every worker is busy.
    fn try_acquire_idle(&self) -> Option<Self::Worker>;
}

/// A reserved worker able to accept exactly one task.
pub trait Worker {
    /// Hand `task` to the worker. Returns `false` if the worker refused it.
    fn submit(self, task: Task) -> bool;
}

impl<P: ThreadPool + ?Sized> ThreadPool for &P {
    type Worker = P::Worker;

    fn try_acquire_idle(&self) -> Option<Self::Worker> {
        (**self).try_acquire_idle()
    }
}

impl<P: ThreadPool + ?Sized> ThreadPool for std::sync::Arc<P> {
    type Worker = P::Worker;

    fn try_acquire_idle(&self) -> Option<Self::Worker> {
        (**self).try_acquire_idle()
    }
}
