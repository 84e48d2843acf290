//! Odometer-style cross-product iteration.
//!
//! `CompositeIterator` enumerates every combination of elements across N
//! ordered sources, one tuple per step, in a fixed deterministic order — a
//! mixed-radix counter where one end of the source list changes fastest.
//!
//! Sources must be re-iterable: a position that exhausts is reset by taking a
//! fresh pass over its source while the carry advances the next position.
//! The `Clone + IntoIterator` bound is that capability — a single-use cursor
//! is unrepresentable here, not merely unsupported.
//!
//! ```
//! use quill_query::composite::CompositeIterator;
//!
//! let tuples: Vec<Vec<i32>> =
//!     CompositeIterator::new(vec![vec![1, 2], vec![10, 20]]).collect();
//! assert_eq!(tuples, vec![
//!     vec![1, 10], vec![1, 20],
//!     vec![2, 10], vec![2, 20],
//! ]);
//! ```

/// Counting direction: which end of the source list changes fastest.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Direction {
    /// The last source changes fastest (odometer order).
    #[default]
    RightToLeft,
    /// The first source changes fastest.
    LeftToRight,
}

/// Enumerates every N-tuple combination across N re-iterable sources.
///
/// Emitted tuples are always presented in the original source order,
/// regardless of counting direction. Zero sources, or any empty source,
/// yield no tuples at all.
pub struct CompositeIterator<S>
where
    S: IntoIterator + Clone,
{
    /// Sources in internal order: position 0 is the fastest-changing one.
    sources: Vec<S>,
    reversed: bool,
    iterators: Vec<S::IntoIter>,
    current: Vec<S::Item>,
    started: bool,
    exhausted: bool,
}

impl<S> CompositeIterator<S>
where
    S: IntoIterator + Clone,
{
    /// Creates an iterator with the default direction (last source fastest).
    pub fn new(sources: impl IntoIterator<Item = S>) -> Self {
        Self::with_direction(sources, Direction::RightToLeft)
    }

    /// Creates an iterator with an explicit counting direction.
    pub fn with_direction(sources: impl IntoIterator<Item = S>, direction: Direction) -> Self {
        let mut sources: Vec<S> = sources.into_iter().collect();
        let reversed = direction == Direction::RightToLeft;
        if reversed {
            sources.reverse();
        }
        Self {
            sources,
            reversed,
            iterators: Vec::new(),
            current: Vec::new(),
            started: false,
            exhausted: false,
        }
    }

    /// Rewinds to a fresh traversal over the same sources.
    pub fn restart(&mut self) {
        self.iterators.clear();
        self.current.clear();
        self.started = false;
        self.exhausted = false;
    }

    /// Emits the first tuple: the first element of every source.
    fn start(&mut self) -> bool {
        self.started = true;
        if self.sources.is_empty() {
            return false;
        }
        self.iterators = self
            .sources
            .iter()
            .cloned()
            .map(IntoIterator::into_iter)
            .collect();
        let mut current = Vec::with_capacity(self.iterators.len());
        for iterator in &mut self.iterators {
            match iterator.next() {
                Some(item) => current.push(item),
                None => return false,
            }
        }
        self.current = current;
        true
    }

    /// Advances the fastest position, carrying into slower positions as
    /// cursors exhaust. Returns false when the carry runs off the end.
    fn advance(&mut self) -> bool {
        let mut position = 0;
        loop {
            if let Some(item) = self.iterators[position].next() {
                self.current[position] = item;
                return true;
            }
            if position == self.iterators.len() - 1 {
                return false;
            }
            // Reset from a fresh pass over the source, then carry.
            self.iterators[position] = self.sources[position].clone().into_iter();
            match self.iterators[position].next() {
                Some(item) => self.current[position] = item,
                None => return false,
            }
            position += 1;
        }
    }
}

impl<S> Iterator for CompositeIterator<S>
where
    S: IntoIterator + Clone,
    S::Item: Clone,
{
    type Item = Vec<S::Item>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.exhausted {
            return None;
        }
        let stepped = if self.started {
            self.advance()
        } else {
            self.start()
        };
        if !stepped {
            self.exhausted = true;
            return None;
        }
        let mut output = self.current.clone();
        if self.reversed {
            output.reverse();
        }
        Some(output)
    }
}
