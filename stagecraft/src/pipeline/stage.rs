//! Composable transformation stage.

use super::startable::StartableStage;
use crate::source::Source;
use std::fmt;
use std::sync::Arc;

pub(crate) type StageFn<IN, OUT> = Arc<dyn Fn(IN) -> OUT + Send + Sync>;

/// An immutable `IN -> OUT` transformation.
///
/// `filter` never mutates the stage it is called on; it returns a new stage
/// whose function runs the existing one and then `next`. Cloning shares the
/// underlying function.
pub struct Stage<IN, OUT = IN> {
    f: StageFn<IN, OUT>,
}

impl<IN, OUT> Clone for Stage<IN, OUT> {
    fn clone(&self) -> Self {
        Self {
            f: Arc::clone(&self.f),
        }
    }
}

impl<IN, OUT> fmt::Debug for Stage<IN, OUT> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stage")
            .field("in", &std::any::type_name::<IN>())
            .field("out", &std::any::type_name::<OUT>())
            .finish()
    }
}

impl<T: 'static> Stage<T, T> {
    /// Stage that passes its input through unchanged.
    pub fn identity() -> Self {
        Self::new(|input| input)
    }
}

impl<IN: 'static, OUT: 'static> Stage<IN, OUT> {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(IN) -> OUT + Send + Sync + 'static,
    {
        Self { f: Arc::new(f) }
    }

    /// Append `next`, producing a stage computing `next(self(input))`.
    pub fn filter<NEW, F>(&self, next: F) -> Stage<IN, NEW>
    where
        NEW: 'static,
        F: Fn(OUT) -> NEW + Send + Sync + 'static,
    {
        let f = Arc::clone(&self.f);
        Stage::new(move |input| next(f(input)))
    }

    /// Run the composed function directly.
    pub fn apply(&self, input: IN) -> OUT {
        (self.f)(input)
    }

    /// Bind a source, moving to the startable phase.
    pub fn source<S>(&self, source: S) -> StartableStage<IN, OUT, S>
    where
        S: Source<Item = IN>,
    {
        StartableStage::new(self.clone(), source)
    }

    pub(crate) fn function(&self) -> StageFn<IN, OUT> {
        Arc::clone(&self.f)
    }
}
