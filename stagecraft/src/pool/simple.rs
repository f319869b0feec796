//! Fixed-size worker pool with explicit idle-worker reservation.

use super::{Task, ThreadPool, Worker};
use crate::config::PoolOptions;
use crate::error::{PipelineError, PipelineResult};
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;

enum SlotState {
    Idle,
    /// Handed out by `try_acquire_idle`, waiting for `submit` or drop.
    Reserved,
    Assigned(Task),
    Running,
    Stopped,
}

struct WorkerSlot {
    state: Mutex<SlotState>,
    signal: Condvar,
}

struct PoolShared {
    slots: Vec<WorkerSlot>,
    shutdown: AtomicBool,
}

/// Pool of long-lived OS threads, one task at a time per thread.
///
/// **Reservation**: `try_acquire_idle` marks a worker reserved and returns a
/// [`WorkerHandle`]. The worker stays reserved until the handle submits a task
/// or is dropped, so two callers can never be handed the same worker.
///
/// **Panics**: a task that panics is caught at the worker boundary and logged;
/// the worker goes back to idle.
///
/// **Shutdown**: `shutdown()` (also run on drop) refuses new tasks and joins
/// every thread after its current task returns.
pub struct WorkerPool {
    shared: Arc<PoolShared>,
    threads: Mutex<Vec<JoinHandle<()>>>,
    options: PoolOptions,
}

impl WorkerPool {
    /// Spawn a pool from options.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - The options fail validation
    /// - The OS refuses to spawn a worker thread
    pub fn new(options: PoolOptions) -> PipelineResult<Self> {
        options.sanitize()?;

        let shared = Arc::new(PoolShared::new(options.workers));
        let threads = spawn_workers(&shared, &options, spawn_worker)?;

        tracing::debug!(
            workers = options.workers,
            thread_name = %options.thread_name,
            "spawned worker pool"
        );

        Ok(Self {
            shared,
            threads: Mutex::new(threads),
            options,
        })
    }

    pub fn with_workers(workers: usize) -> PipelineResult<Self> {
        Self::new(PoolOptions::with_workers(workers))
    }

    pub fn options(&self) -> &PoolOptions {
        &self.options
    }

    pub fn size(&self) -> usize {
        self.shared.slots.len()
    }

    /// Number of workers neither reserved nor running a task.
    pub fn idle_workers(&self) -> usize {
        self.shared
            .slots
            .iter()
            .filter(|slot| matches!(*slot.state.lock(), SlotState::Idle))
            .count()
    }

    pub fn is_shutdown(&self) -> bool {
        self.shared.shutdown.load(Ordering::Acquire)
    }

    /// Stop accepting work and join all worker threads.
    ///
    /// Blocks until every running task has returned. Idempotent.
    pub fn shutdown(&self) {
        stop_workers(&self.shared);

        let threads = std::mem::take(&mut *self.threads.lock());
        if threads.is_empty() {
            return;
        }
        for thread in threads {
            if thread.join().is_err() {
                tracing::warn!("worker thread exited abnormally");
            }
        }
        tracing::debug!("worker pool shut down");
    }
}

impl ThreadPool for WorkerPool {
    type Worker = WorkerHandle;

    fn try_acquire_idle(&self) -> Option<WorkerHandle> {
        if self.is_shutdown() {
            return None;
        }
        self.shared.slots.iter().enumerate().find_map(|(index, slot)| {
            let mut state = slot.state.lock();
            if matches!(*state, SlotState::Idle) {
                *state = SlotState::Reserved;
                Some(WorkerHandle {
                    shared: Arc::clone(&self.shared),
                    index,
                    armed: true,
                })
            } else {
                None
            }
        })
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Reservation on one idle worker of a [`WorkerPool`].
///
/// Dropping the handle without submitting releases the worker.
pub struct WorkerHandle {
    shared: Arc<PoolShared>,
    index: usize,
    armed: bool,
}

impl WorkerHandle {
    pub fn index(&self) -> usize {
        self.index
    }
}

impl Worker for WorkerHandle {
    fn submit(mut self, task: Task) -> bool {
        if self.shared.shutdown.load(Ordering::Acquire) {
            return false;
        }
        let slot = &self.shared.slots[self.index];
        let mut state = slot.state.lock();
        if !matches!(*state, SlotState::Reserved) {
            return false;
        }
        *state = SlotState::Assigned(task);
        slot.signal.notify_one();
        self.armed = false;
        true
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut state = self.shared.slots[self.index].state.lock();
        if matches!(*state, SlotState::Reserved) {
            *state = SlotState::Idle;
        }
    }
}

impl PoolShared {
    fn new(workers: usize) -> Self {
        Self {
            slots: (0..workers)
                .map(|_| WorkerSlot {
                    state: Mutex::new(SlotState::Idle),
                    signal: Condvar::new(),
                })
                .collect(),
            shutdown: AtomicBool::new(false),
        }
    }
}

type Spawner = fn(String, Arc<PoolShared>, usize) -> io::Result<JoinHandle<()>>;

fn spawn_worker(
    name: String,
    shared: Arc<PoolShared>,
    index: usize,
) -> io::Result<JoinHandle<()>> {
    std::thread::Builder::new()
        .name(name)
        .spawn(move || worker_loop(shared, index))
}

/// Start one thread per slot. If any spawn fails, the threads already
/// started are stopped and joined before the error is returned.
fn spawn_workers(
    shared: &Arc<PoolShared>,
    options: &PoolOptions,
    spawn: Spawner,
) -> PipelineResult<Vec<JoinHandle<()>>> {
    let mut threads = Vec::with_capacity(options.workers);
    for index in 0..options.workers {
        let name = format!("{}-{}", options.thread_name, index);
        match spawn(name, Arc::clone(shared), index) {
            Ok(handle) => threads.push(handle),
            Err(e) => {
                tracing::warn!(worker = index, error = %e, "failed to spawn worker thread");
                stop_workers(shared);
                for thread in threads {
                    let _ = thread.join();
                }
                return Err(PipelineError::ResourceExhausted(format!(
                    "failed to spawn worker thread {}: {}",
                    index, e
                )));
            }
        }
    }
    Ok(threads)
}

fn stop_workers(shared: &PoolShared) {
    shared.shutdown.store(true, Ordering::Release);
    for slot in &shared.slots {
        let _state = slot.state.lock();
        slot.signal.notify_all();
    }
}

fn worker_loop(shared: Arc<PoolShared>, index: usize) {
    let slot = &shared.slots[index];
    let mut state = slot.state.lock();
    tracing::trace!(worker = index, "worker started");

    loop {
        match std::mem::replace(&mut *state, SlotState::Running) {
            SlotState::Assigned(task) => {
                MutexGuard::unlocked(&mut state, || run_task(index, task));
                *state = SlotState::Idle;
            }
            other => {
                *state = other;
                if shared.shutdown.load(Ordering::Acquire) {
                    *state = SlotState::Stopped;
                    break;
                }
                slot.signal.wait(&mut state);
            }
        }
    }

    tracing::trace!(worker = index, "worker stopped");
}

fn run_task(index: usize, task: Task) {
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(task)) {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".to_string());
        tracing::error!(worker = index, panic = %message, "task panicked");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::time::Duration;

    #[test]
    fn test_rejects_zero_workers() {
        assert!(WorkerPool::with_workers(0).is_err());
    }

    #[test]
    fn test_acquire_reserves_until_dropped() {
        let pool = WorkerPool::with_workers(2).unwrap();
        assert_eq!(pool.idle_workers(), 2);

        let a = pool.try_acquire_idle().unwrap();
        let b = pool.try_acquire_idle().unwrap();
        assert_ne!(a.index(), b.index());
        assert!(pool.try_acquire_idle().is_none());

        drop(a);
        assert_eq!(pool.idle_workers(), 1);
        drop(b);
        assert_eq!(pool.idle_workers(), 2);
    }

    #[test]
    fn test_submitted_task_runs_and_worker_returns_to_idle() {
        let pool = WorkerPool::with_workers(1).unwrap();
        let (tx, rx) = mpsc::channel();

        let worker = pool.try_acquire_idle().unwrap();
        assert!(worker.submit(Box::new(move || tx.send(()).unwrap())));

        assert!(rx.recv_timeout(Duration::from_secs(5)).is_ok());
        pool.shutdown();
        assert!(pool.is_shutdown());
    }

    #[test]
    fn test_panicking_task_does_not_kill_worker() {
        let pool = WorkerPool::with_workers(1).unwrap();

        let worker = pool.try_acquire_idle().unwrap();
        assert!(worker.submit(Box::new(|| panic!("boom"))));

        // Same single worker must come back and run the next task.
        let (tx, rx) = mpsc::channel();
        let mut acquired = None;
        for _ in 0..500 {
            if let Some(worker) = pool.try_acquire_idle() {
                acquired = Some(worker);
                break;
            }
            std::thread::sleep(Duration::from_millis(2));
        }
        let worker = acquired.expect("worker should return to idle after panic");
        assert!(worker.submit(Box::new(move || tx.send(()).unwrap())));
        assert!(rx.recv_timeout(Duration::from_secs(5)).is_ok());
    }

    fn spawn_all_but_second(
        name: String,
        shared: Arc<PoolShared>,
        index: usize,
    ) -> io::Result<JoinHandle<()>> {
        if index == 1 {
            return Err(io::Error::other("thread limit reached"));
        }
        spawn_worker(name, shared, index)
    }

    #[test]
    fn test_spawn_failure_stops_started_workers() {
        let options = PoolOptions::with_workers(3);
        let shared = Arc::new(PoolShared::new(options.workers));

        let err = spawn_workers(&shared, &options, spawn_all_but_second).unwrap_err();

        assert!(err.is_resource_exhausted());
        assert!(err.to_string().contains("worker thread 1"));
        assert!(shared.shutdown.load(Ordering::Acquire));
        // Worker 0 was joined, so it has parked its slot for good.
        assert!(matches!(*shared.slots[0].state.lock(), SlotState::Stopped));
        assert!(matches!(*shared.slots[2].state.lock(), SlotState::Idle));
    }

    #[test]
    fn test_no_workers_after_shutdown() {
        let pool = WorkerPool::with_workers(1).unwrap();
        let worker = pool.try_acquire_idle().unwrap();
        pool.shutdown();
        assert!(pool.try_acquire_idle().is_none());
        assert!(!worker.submit(Box::new(|| {})));
    }
}
