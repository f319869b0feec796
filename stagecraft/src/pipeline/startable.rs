//! Stage bound to a source.

use super::runnable::RunnableStage;
use super::stage::Stage;
use crate::source::Source;
use std::sync::Arc;

/// A [`Stage`] with a bound [`Source`]; attach a consumer to make it runnable.
pub struct StartableStage<IN, OUT, S> {
    stage: Stage<IN, OUT>,
    source: S,
}

impl<IN, OUT, S> StartableStage<IN, OUT, S>
where
    IN: 'static,
    OUT: 'static,
    S: Source<Item = IN>,
{
    pub(crate) fn new(stage: Stage<IN, OUT>, source: S) -> Self {
        Self { stage, source }
    }

    /// Extend the composed function, keeping the bound source.
    pub fn filter<NEW, F>(self, next: F) -> StartableStage<IN, NEW, S>
    where
        NEW: 'static,
        F: Fn(OUT) -> NEW + Send + Sync + 'static,
    {
        StartableStage {
            stage: self.stage.filter(next),
            source: self.source,
        }
    }

    /// Attach the terminal consumer.
    ///
    /// The composed stage function is folded into the consumer here, once;
    /// the runnable pipeline only ever calls the folded function.
    pub fn consume<F>(self, sink: F) -> RunnableStage<S>
    where
        F: Fn(OUT) + Send + Sync + 'static,
    {
        let f = self.stage.function();
        RunnableStage::new(self.source, Arc::new(move |input| sink(f(input))))
    }

    pub fn stage(&self) -> &Stage<IN, OUT> {
        &self.stage
    }

    pub fn apply(&self, input: IN) -> OUT {
        self.stage.apply(input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::IterSource;

    #[test]
    fn test_filter_keeps_source() {
        let startable = Stage::new(|x: u32| x + 1)
            .source(IterSource::new(vec![1u32, 2]))
            .filter(|x| x * 2);
        assert_eq!(startable.apply(3), 8);
    }
}
