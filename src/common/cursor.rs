// Backtracking Cursors
//
// Iterators that can rewind to a previously marked position. Nested-loop
// joins replay a buffered block or page, the sort-merge join replays the run
// of right records sharing a join key.

use crate::query::executor::result::{QueryError, QueryResult};

/// A cursor that supports a bounded rewind to a marked position.
///
/// `mark` records the position of the element the next call to `advance`
/// would return. `reset` rewinds to that position, so every element observed
/// since the mark is produced again, in the same order. Marks are not
/// consumed by `reset`; a cursor can be rewound to the same mark any number
/// of times.
pub trait BacktrackingIterator {
    type Item;

    /// True if `advance` would return an element
    fn has_next(&self) -> bool;

    /// The element `advance` would return, without consuming it
    fn peek(&self) -> Option<&Self::Item>;

    /// Consume and return the next element; `None` once exhausted
    fn advance(&mut self) -> QueryResult<Option<Self::Item>>;

    /// Remember the current position as the replay start
    fn mark(&mut self);

    /// Rewind to the last mark
    fn reset(&mut self) -> QueryResult<()>;
}

/// Cursor over a fully buffered window of elements.
///
/// The window is whatever the caller loaded (a block of records, the page
/// list of a relation), so replay never reaches outside of it.
#[derive(Debug, Clone)]
pub struct ArrayCursor<T> {
    items: Vec<T>,
    position: usize,
    mark: Option<usize>,
}

impl<T> ArrayCursor<T> {
    pub fn new(items: Vec<T>) -> Self {
        Self {
            items,
            position: 0,
            mark: None,
        }
    }

    /// Create an empty cursor
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Number of elements in the buffered window
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Number of elements not consumed yet
    pub fn remaining(&self) -> usize {
        self.items.len() - self.position
    }
}

impl<T: Clone> Iterator for ArrayCursor<T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        let item = self.items.get(self.position)?.clone();
        self.position += 1;
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining(), Some(self.remaining()))
    }
}

impl<T: Clone> BacktrackingIterator for ArrayCursor<T> {
    type Item = T;

    fn has_next(&self) -> bool {
        self.position < self.items.len()
    }

    fn peek(&self) -> Option<&T> {
        self.items.get(self.position)
    }

    fn advance(&mut self) -> QueryResult<Option<T>> {
        Ok(self.next())
    }

    fn mark(&mut self) {
        self.mark = Some(self.position);
    }

    fn reset(&mut self) -> QueryResult<()> {
        let mark = self.mark.ok_or(QueryError::NoMark)?;
        self.position = mark;
        Ok(())
    }
}
