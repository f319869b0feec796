//! Completion modes and fan-in wiring.

use crate::sync::{AtomicCounter, CompletionLatch};
use std::fmt;
use std::sync::Arc;

pub(crate) type EndFn = Arc<dyn Fn() + Send + Sync>;

/// How a pipeline reports that it has ended.
///
/// `Default` counts down a latch that `RunnableStage::wait` blocks on.
/// `Custom` calls a user callback instead; there is no latch to wait on.
#[derive(Clone)]
pub enum CompletionMode {
    Default(Arc<CompletionLatch>),
    Custom(EndFn),
}

impl CompletionMode {
    pub(crate) fn latch() -> Self {
        CompletionMode::Default(Arc::new(CompletionLatch::new(1)))
    }

    pub(crate) fn custom<F>(f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        CompletionMode::Custom(Arc::new(f))
    }

    pub fn is_default(&self) -> bool {
        matches!(self, CompletionMode::Default(_))
    }

    pub(crate) fn signal(&self) {
        match self {
            CompletionMode::Default(latch) => latch.count_down(),
            CompletionMode::Custom(f) => f(),
        }
    }
}

impl fmt::Debug for CompletionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompletionMode::Default(latch) => f
                .debug_tuple("Default")
                .field(&latch.count())
                .finish(),
            CompletionMode::Custom(_) => f.write_str("Custom"),
        }
    }
}

/// Completion for one of N children: decrement the shared counter and fire
/// `parent` only on the transition to zero.
pub(crate) fn fan_in(pending: Arc<AtomicCounter>, parent: EndFn) -> CompletionMode {
    CompletionMode::custom(move || {
        if pending.decrement_and_test() {
            parent();
        }
    })
}
