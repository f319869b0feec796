//! Source adapter over a plain iterator.

use super::Source;

/// Source that yields the items of an iterator and closes when it is exhausted.
///
/// Never blocks. Clones replay the remaining sequence independently, so a
/// parallel pipeline over an `IterSource` delivers every item once per child.
pub struct IterSource<I: Iterator> {
    iter: I,
    slot: Option<I::Item>,
}

impl<I> Clone for IterSource<I>
where
    I: Iterator + Clone,
    I::Item: Clone,
{
    fn clone(&self) -> Self {
        Self {
            iter: self.iter.clone(),
            slot: self.slot.clone(),
        }
    }
}

impl<I: Iterator> IterSource<I> {
    pub fn new<T>(items: T) -> Self
    where
        T: IntoIterator<IntoIter = I>,
    {
        Self {
            iter: items.into_iter(),
            slot: None,
        }
    }

    fn fill(&mut self) -> bool {
        if self.slot.is_none() {
            self.slot = self.iter.next();
        }
        self.slot.is_some()
    }
}

impl<I: Iterator> Source for IterSource<I> {
    type Item = I::Item;

    fn has_value(&mut self) -> bool {
        self.fill()
    }

    fn wait(&mut self) {
        self.fill();
    }

    fn is_closed(&mut self) -> bool {
        !self.fill()
    }

    fn get(&mut self) -> I::Item {
        self.fill();
        match self.slot.take() {
            Some(item) => item,
            None => panic!("IterSource::get called after the iterator was exhausted"),
        }
    }
}
