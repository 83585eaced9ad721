// Nested Loop Join Implementation
//
// Block and page nested-loop equi-joins. The left relation is read a block
// of pages at a time; for each block the right relation is read one page at
// a time, and every left record of the block is compared with every record
// of the right page. Both buffered windows are replayed with mark/reset.

use log::{debug, trace};

use crate::catalog::Schema;
use crate::common::cursor::{ArrayCursor, BacktrackingIterator};
use crate::query::executor::operators::join::EquiJoin;
use crate::query::executor::operators::Operator;
use crate::query::executor::result::{QueryResult, Record};
use crate::storage::PageCursor;

/// Iteration state shared by the block and page variants
struct NestedLoopState {
    join: EquiJoin,
    /// Left pages buffered per block
    block_pages: usize,
    left_pages: PageCursor,
    /// Marked at the first right page
    right_pages: PageCursor,
    /// Records of the current left block, marked at the first
    left_block: ArrayCursor<Record>,
    /// Records of the current right page, marked at the first
    right_page: ArrayCursor<Record>,
    left_record: Option<Record>,
    initialized: bool,
    done: bool,
}

impl NestedLoopState {
    fn new(join: EquiJoin, block_pages: usize) -> Self {
        NestedLoopState {
            join,
            block_pages: block_pages.max(1),
            left_pages: ArrayCursor::empty(),
            right_pages: ArrayCursor::empty(),
            left_block: ArrayCursor::empty(),
            right_page: ArrayCursor::empty(),
            left_record: None,
            initialized: false,
            done: false,
        }
    }

    fn init(&mut self) -> QueryResult<()> {
        let store = self.join.store();
        self.left_pages = store.page_cursor(self.join.left_table())?;
        self.right_pages = store.page_cursor(self.join.right_table())?;
        self.right_pages.mark();
        debug!(
            "nested-loop join '{}' ({} pages) with '{}' ({} pages), {} left pages per block",
            self.join.left_table(),
            self.left_pages.len(),
            self.join.right_table(),
            self.right_pages.len(),
            self.block_pages
        );

        self.next_left_block()?;
        self.next_right_page()?;
        self.done = false;
        self.initialized = true;
        Ok(())
    }

    /// Load the next block of left pages and start at its first record
    fn next_left_block(&mut self) -> QueryResult<()> {
        self.left_block = self.join.store().block_cursor(
            self.join.left_table(),
            &mut self.left_pages,
            self.block_pages,
        )?;
        self.left_block.mark();
        self.left_record = self.left_block.advance()?;
        trace!("left block of {} records", self.left_block.len());
        Ok(())
    }

    /// Load the next right page
    fn next_right_page(&mut self) -> QueryResult<()> {
        self.right_page = self
            .join
            .store()
            .block_cursor(self.join.right_table(), &mut self.right_pages, 1)?;
        self.right_page.mark();
        Ok(())
    }

    fn next_left_record(&mut self) -> QueryResult<()> {
        self.left_record = self.left_block.advance()?;
        Ok(())
    }

    /// Replay the current right page from its first record
    fn reset_right_page(&mut self) -> QueryResult<()> {
        self.right_page.reset()
    }

    /// Back to the first record of the current left block
    fn reset_left_block(&mut self) -> QueryResult<()> {
        self.left_block.reset()?;
        self.left_record = self.left_block.advance()?;
        Ok(())
    }

    /// Back to the first right page, for a new left block
    fn reset_right_pages(&mut self) -> QueryResult<()> {
        self.right_pages.reset()?;
        self.next_right_page()
    }

    /// Scan the rest of the current right page for a match with the current
    /// left record. `None` once the page is exhausted for it.
    fn emit_from_right_page(&mut self) -> QueryResult<Option<Record>> {
        let Some(left) = self.left_record.as_ref() else {
            return Ok(None);
        };
        while let Some(right) = self.right_page.advance()? {
            if self.join.matches(left, &right)? {
                return Ok(Some(left.concat(&right)));
            }
        }
        Ok(None)
    }

    fn fetch_next(&mut self) -> QueryResult<Option<Record>> {
        if !self.initialized {
            self.init()?;
        }

        while !self.done {
            if let Some(record) = self.emit_from_right_page()? {
                return Ok(Some(record));
            }

            // The right page is exhausted for this left record, or the left
            // block is empty
            if self.left_record.is_some() && self.left_block.has_next() {
                self.next_left_record()?;
                self.reset_right_page()?;
            } else if self.left_record.is_some() && self.right_pages.has_next() {
                self.reset_left_block()?;
                self.next_right_page()?;
            } else if self.left_pages.has_next() {
                self.next_left_block()?;
                self.reset_right_pages()?;
            } else {
                self.done = true;
            }
        }
        Ok(None)
    }

    fn close(&mut self) {
        self.left_pages = ArrayCursor::empty();
        self.right_pages = ArrayCursor::empty();
        self.left_block = ArrayCursor::empty();
        self.right_page = ArrayCursor::empty();
        self.left_record = None;
        self.initialized = false;
        self.done = true;
    }
}

/// Block nested-loop join: B-2 left pages per block, one buffer for the
/// right page and one for output
pub struct BlockNestedLoopJoin {
    state: NestedLoopState,
}

impl BlockNestedLoopJoin {
    pub fn new(join: EquiJoin) -> Self {
        let block_pages = join.store().num_buffers().saturating_sub(2).max(1);
        Self::with_block_pages(join, block_pages)
    }

    /// Use an explicit block size instead of the store's buffer budget
    pub fn with_block_pages(join: EquiJoin, block_pages: usize) -> Self {
        BlockNestedLoopJoin {
            state: NestedLoopState::new(join, block_pages),
        }
    }

    pub fn block_pages(&self) -> usize {
        self.state.block_pages
    }
}

impl Operator for BlockNestedLoopJoin {
    fn init(&mut self) -> QueryResult<()> {
        self.state.init()
    }

    fn next(&mut self) -> QueryResult<Option<Record>> {
        self.state.fetch_next()
    }

    fn close(&mut self) -> QueryResult<()> {
        self.state.close();
        Ok(())
    }

    fn schema(&self) -> &Schema {
        self.state.join.schema()
    }
}

/// Page nested-loop join: every left page is joined with every right page
pub struct PageNestedLoopJoin {
    state: NestedLoopState,
}

impl PageNestedLoopJoin {
    pub fn new(join: EquiJoin) -> Self {
        PageNestedLoopJoin {
            state: NestedLoopState::new(join, 1),
        }
    }

    /// Load the next left page and rewind the right relation to its first page
    fn next_left_page(&mut self) -> QueryResult<()> {
        self.state.next_left_block()?;
        self.state.reset_right_pages()
    }

    /// Move to the next record of the left page and replay the right page
    fn reset_right_page(&mut self) -> QueryResult<()> {
        self.state.next_left_record()?;
        self.state.reset_right_page()
    }

    /// Back to the first record of the left page, against the next right page
    fn next_right_page(&mut self) -> QueryResult<()> {
        self.state.reset_left_block()?;
        self.state.next_right_page()
    }

    fn fetch_next(&mut self) -> QueryResult<Option<Record>> {
        if !self.state.initialized {
            self.state.init()?;
        }

        while !self.state.done {
            if let Some(record) = self.state.emit_from_right_page()? {
                return Ok(Some(record));
            }

            let has_left = self.state.left_record.is_some();
            if has_left && self.state.left_block.has_next() {
                self.reset_right_page()?;
            } else if has_left && self.state.right_pages.has_next() {
                self.next_right_page()?;
            } else if self.state.left_pages.has_next() {
                self.next_left_page()?;
            } else {
                self.state.done = true;
            }
        }
        Ok(None)
    }
}

impl Operator for PageNestedLoopJoin {
    fn init(&mut self) -> QueryResult<()> {
        self.state.init()
    }

    fn next(&mut self) -> QueryResult<Option<Record>> {
        self.fetch_next()
    }

    fn close(&mut self) -> QueryResult<()> {
        self.state.close();
        Ok(())
    }

    fn schema(&self) -> &Schema {
        self.state.join.schema()
    }
}
