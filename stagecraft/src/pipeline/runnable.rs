//! Runnable pipeline: execution, fan-out and completion.

use super::completion::{CompletionMode, EndFn, fan_in};
use super::driver::{StopHandle, drive};
use super::metrics::{DriverProbe, RunMetrics};
use crate::error::{PipelineError, PipelineResult};
use crate::pool::{Task, ThreadPool, Worker};
use crate::source::Source;
use crate::sync::AtomicCounter;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

pub(crate) type ConsumerFn<T> = Arc<dyn Fn(T) + Send + Sync>;

/// Lifecycle of a [`RunnableStage`]. Only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Configured,
    Running,
    /// The completion callback has fired.
    Ended,
}

impl RunState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => RunState::Configured,
            1 => RunState::Running,
            _ => RunState::Ended,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            RunState::Configured => 0,
            RunState::Running => 1,
            RunState::Ended => 2,
        }
    }
}

/// Observer for one child driver spawned by a parallel run.
#[derive(Debug, Clone)]
pub struct ChildHandle {
    probe: Arc<DriverProbe>,
}

impl ChildHandle {
    pub fn index(&self) -> usize {
        self.probe.index()
    }

    pub fn items(&self) -> u64 {
        self.probe.items()
    }

    /// Whether the child's driver loop has returned.
    pub fn is_finished(&self) -> bool {
        self.probe.is_finished()
    }
}

/// A source-bound stage with a terminal consumer, ready to run.
///
/// **Serial**: [`run`](Self::run) drives the source on the calling thread.
///
/// **Pooled**: [`run_on`](Self::run_on) submits the driver loop to an idle
/// pool worker, or with [`parallel(n)`](Self::parallel) fans out to `n`
/// children, each driving its own clone of the source. Children converge
/// through a shared [`AtomicCounter`]; the completion fires once, when the
/// last child ends.
///
/// **Completion**: by default a latch that [`wait`](Self::wait) blocks on.
/// [`on_end`](Self::on_end) swaps in a callback, after which `wait` is an
/// error.
///
/// A panic raised by a stage function or the consumer unwinds out of the
/// driver loop on whichever thread runs it and skips that driver's completion
/// step. In a parallel run the shared counter then never reaches zero and the
/// pipeline's completion does not fire.
pub struct RunnableStage<S: Source> {
    source: Option<S>,
    consumer: ConsumerFn<S::Item>,
    threads: usize,
    completion: CompletionMode,
    lifecycle: Arc<AtomicU8>,
    pending: Arc<AtomicCounter>,
    children: Vec<ChildHandle>,
    stop: StopHandle,
    probe: Arc<DriverProbe>,
}

impl<S: Source> RunnableStage<S> {
    pub(crate) fn new(source: S, consumer: ConsumerFn<S::Item>) -> Self {
        Self {
            source: Some(source),
            consumer,
            threads: 0,
            completion: CompletionMode::latch(),
            lifecycle: Arc::new(AtomicU8::new(RunState::Configured.as_u8())),
            pending: Arc::new(AtomicCounter::default()),
            children: Vec::new(),
            stop: StopHandle::new(),
            probe: Arc::new(DriverProbe::new(0)),
        }
    }

    /// Call `f` when the pipeline ends instead of opening the wait latch.
    ///
    /// Cannot be combined with [`wait`](Self::wait).
    pub fn on_end<F>(mut self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.completion = CompletionMode::custom(f);
        self
    }

    /// Run with `threads` child drivers when started through `run_on`.
    pub fn parallel(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    /// Run the driver loop on the calling thread.
    ///
    /// A parallel request is downgraded to serial with a warning.
    ///
    /// # Errors
    ///
    /// `InvalidUsage` if the pipeline was already started.
    pub fn run(&mut self) -> PipelineResult<()> {
        let mut source = self.begin()?;
        if self.threads > 0 {
            tracing::warn!(
                threads = self.threads,
                "run() ignores parallel request, running in serial mode"
            );
            self.threads = 0;
        }

        let signal = self.completion_signal();
        drive(&mut source, &*self.consumer, &self.stop, &self.probe);
        signal();
        Ok(())
    }

    /// Block until the pipeline has ended.
    ///
    /// # Errors
    ///
    /// `InvalidUsage`, without blocking, if a custom `on_end` callback is set.
    pub fn wait(&self) -> PipelineResult<()> {
        match &self.completion {
            CompletionMode::Default(latch) => {
                latch.wait();
                Ok(())
            }
            CompletionMode::Custom(_) => Err(PipelineError::InvalidUsage(
                "cannot wait on a pipeline with a custom on_end callback".into(),
            )),
        }
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    pub fn state(&self) -> RunState {
        RunState::from_u8(self.lifecycle.load(Ordering::Acquire))
    }

    pub fn completion_mode(&self) -> &CompletionMode {
        &self.completion
    }

    /// Children spawned by the last parallel `run_on`.
    pub fn children(&self) -> &[ChildHandle] {
        &self.children
    }

    /// Handle that stops this pipeline and all of its children.
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn metrics(&self) -> RunMetrics {
        let drivers = if self.children.is_empty() {
            vec![self.probe.snapshot()]
        } else {
            self.children
                .iter()
                .map(|child| child.probe.snapshot())
                .collect()
        };
        RunMetrics { drivers }
    }

    /// Move from `Configured` to `Running`, handing out the source.
    fn begin(&mut self) -> PipelineResult<S> {
        let started = self.lifecycle.compare_exchange(
            RunState::Configured.as_u8(),
            RunState::Running.as_u8(),
            Ordering::AcqRel,
            Ordering::Acquire,
        );
        if let Err(current) = started {
            return Err(PipelineError::InvalidUsage(format!(
                "pipeline cannot be started from {:?} state",
                RunState::from_u8(current)
            )));
        }
        self.source.take().ok_or_else(|| {
            PipelineError::InvalidUsage("pipeline source was already consumed".into())
        })
    }

    /// The logical completion of this instance: mark ended, then signal.
    fn completion_signal(&self) -> EndFn {
        let lifecycle = Arc::clone(&self.lifecycle);
        let mode = self.completion.clone();
        Arc::new(move || {
            lifecycle.store(RunState::Ended.as_u8(), Ordering::Release);
            mode.signal();
        })
    }
}

impl<S> RunnableStage<S>
where
    S: Source + Send + 'static,
{
    /// Run the driver loop on one idle worker borrowed from `pool`.
    ///
    /// Unlike [`run_on`](Self::run_on) this does not need a clonable source.
    /// A parallel request is downgraded to serial with a warning, as in
    /// [`run`](Self::run).
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - The pipeline was already started (`InvalidUsage`)
    /// - No idle worker is available (`ResourceExhausted`)
    /// - The worker refuses the task (`TaskRejected`)
    pub fn run_on_single<P: ThreadPool>(&mut self, pool: &P) -> PipelineResult<()> {
        let source = self.begin()?;
        if self.threads > 0 {
            tracing::warn!(
                threads = self.threads,
                "run_on_single() ignores parallel request, running in serial mode"
            );
            self.threads = 0;
        }
        self.dispatch_serial(pool, source)
    }

    fn dispatch_serial<P: ThreadPool>(&self, pool: &P, mut source: S) -> PipelineResult<()> {
        let worker = pool.try_acquire_idle().ok_or_else(|| {
            tracing::warn!("no idle worker for serial driver");
            PipelineError::ResourceExhausted("no idle worker available for pipeline".into())
        })?;

        let consumer = Arc::clone(&self.consumer);
        let stop = self.stop.clone();
        let probe = Arc::clone(&self.probe);
        let signal = self.completion_signal();
        let task: Task = Box::new(move || {
            drive(&mut source, &*consumer, &stop, &probe);
            signal();
        });

        if !worker.submit(task) {
            tracing::warn!("worker rejected serial driver");
            return Err(PipelineError::TaskRejected(
                "worker rejected pipeline driver".into(),
            ));
        }
        tracing::debug!("dispatched serial driver to pool");
        Ok(())
    }
}

impl<S> RunnableStage<S>
where
    S: Source + Clone + Send + 'static,
{
    /// Run on workers borrowed from `pool`.
    ///
    /// With no parallelism the driver loop is submitted to one idle worker.
    /// With `parallel(n)` the pipeline spawns `n` children, one per idle
    /// worker, each driving its own clone of the source; this instance does
    /// not pull from its source at all.
    ///
    /// The source must be `Clone` because children are forked from it. Use
    /// [`run_on_single`](Self::run_on_single) for sources that are not.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - The pipeline was already started (`InvalidUsage`)
    /// - No idle worker is available for a driver (`ResourceExhausted`)
    /// - A worker refuses its task (`TaskRejected`)
    ///
    /// On a partial fan-out failure the children already dispatched keep
    /// running, and the pipeline's completion will not fire.
    pub fn run_on<P: ThreadPool>(&mut self, pool: &P) -> PipelineResult<()> {
        let source = self.begin()?;
        if self.threads == 0 {
            self.dispatch_serial(pool, source)
        } else {
            self.dispatch_parallel(pool, source)
        }
    }

    fn dispatch_parallel<P: ThreadPool>(&mut self, pool: &P, template: S) -> PipelineResult<()> {
        let threads = self.threads;
        self.pending.init(threads);
        self.children.clear();
        self.children.reserve(threads);
        let parent = self.completion_signal();

        for index in 0..threads {
            let worker = pool.try_acquire_idle().ok_or_else(|| {
                tracing::warn!(child = index, threads, "no idle worker for child driver");
                PipelineError::ResourceExhausted(format!(
                    "no idle worker for child {} of {}",
                    index + 1,
                    threads
                ))
            })?;

            let mut child = self.fork(index, template.clone(), Arc::clone(&parent));
            self.children.push(ChildHandle {
                probe: Arc::clone(&child.probe),
            });

            let task: Task = Box::new(move || {
                if let Err(e) = child.run() {
                    tracing::error!(child = index, error = %e, "child driver failed to start");
                }
            });

            if !worker.submit(task) {
                tracing::warn!(child = index, threads, "worker rejected child driver");
                return Err(PipelineError::TaskRejected(format!(
                    "worker rejected child {} of {}",
                    index + 1,
                    threads
                )));
            }
            tracing::debug!(child = index, threads, "dispatched child driver");
        }

        Ok(())
    }

    /// Structural copy for one child: same consumer and stop flag, serial,
    /// completing through the parent's fan-in counter.
    fn fork(&self, index: usize, source: S, parent: EndFn) -> Self {
        Self {
            source: Some(source),
            consumer: Arc::clone(&self.consumer),
            threads: 0,
            completion: fan_in(Arc::clone(&self.pending), parent),
            lifecycle: Arc::new(AtomicU8::new(RunState::Configured.as_u8())),
            pending: Arc::new(AtomicCounter::default()),
            children: Vec::new(),
            stop: self.stop.clone(),
            probe: Arc::new(DriverProbe::new(index)),
        }
    }
}

impl<S: Source> fmt::Debug for RunnableStage<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunnableStage")
            .field("threads", &self.threads)
            .field("state", &self.state())
            .field("completion", &self.completion)
            .field("children", &self.children.len())
            .field("stopped", &self.stop.is_stopped())
            .finish()
    }
}
