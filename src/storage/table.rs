// Heap Table
//
// A relation stored as a list of slotted pages, plus the record cursor used
// to scan it with mark/reset support.

use std::sync::Arc;
use log::trace;
use parking_lot::RwLock;

use crate::catalog::Schema;
use crate::common::cursor::BacktrackingIterator;
use crate::common::types::{Page, PageId, PagePtr};
use crate::query::executor::result::{QueryError, QueryResult, Record};
use crate::storage::page::{PageError, PageManager};

/// Decode every record stored on a page, in slot order
pub fn decode_page(page: &Page) -> QueryResult<Vec<Record>> {
    let pm = PageManager::new();
    pm.get_records(page)?
        .iter()
        .map(|bytes| Record::deserialize(bytes))
        .collect()
}

/// Heap-organized relation
pub struct HeapTable {
    name: String,
    schema: Schema,
    page_size: usize,
    pages: Vec<PagePtr>,
    num_records: usize,
}

impl HeapTable {
    pub fn new(name: String, schema: Schema, page_size: usize) -> Self {
        Self {
            name,
            schema,
            page_size,
            pages: Vec::new(),
            num_records: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn num_pages(&self) -> usize {
        self.pages.len()
    }

    pub fn num_records(&self) -> usize {
        self.num_records
    }

    /// Handles to the table's pages, in scan order
    pub fn pages(&self) -> Vec<PagePtr> {
        self.pages.clone()
    }

    /// Append a record, starting a new page when the last one is full
    pub fn insert(&mut self, record: &Record) -> QueryResult<()> {
        self.schema.validate(record.values())?;
        let bytes = record.serialize()?;
        let pm = PageManager::new();

        if let Some(last) = self.pages.last() {
            let mut page = last.write();
            match pm.insert_record(&mut page, &bytes) {
                Ok(_) => {
                    self.num_records += 1;
                    return Ok(());
                }
                Err(PageError::InsufficientSpace) => {}
                Err(e) => return Err(e.into()),
            }
        }

        let mut page = Page::new(self.pages.len() as PageId, self.page_size);
        pm.init_page(&mut page);
        pm.insert_record(&mut page, &bytes)?;
        trace!("table '{}': allocated page {}", self.name, page.page_id);

        self.pages.push(Arc::new(RwLock::new(page)));
        self.num_records += 1;
        Ok(())
    }
}

/// Page-at-a-time scan over a relation.
///
/// Only the page under the cursor is decoded. A mark remembers
/// `(page, slot)`; resetting to a mark on an earlier page decodes that page
/// again.
pub struct TableRecordCursor {
    pages: Vec<PagePtr>,
    page_idx: usize,
    buffer: Vec<Record>,
    slot: usize,
    mark: Option<(usize, usize)>,
}

impl TableRecordCursor {
    pub fn new(pages: Vec<PagePtr>) -> QueryResult<Self> {
        let buffer = match pages.first() {
            Some(page) => decode_page(&page.read())?,
            None => Vec::new(),
        };
        let mut cursor = Self {
            pages,
            page_idx: 0,
            buffer,
            slot: 0,
            mark: None,
        };
        cursor.settle()?;
        Ok(cursor)
    }

    /// Cursor over no pages
    pub fn empty() -> Self {
        Self {
            pages: Vec::new(),
            page_idx: 0,
            buffer: Vec::new(),
            slot: 0,
            mark: None,
        }
    }

    /// Move past exhausted pages so that `slot` points at the next record
    fn settle(&mut self) -> QueryResult<()> {
        while self.slot >= self.buffer.len() && self.page_idx + 1 < self.pages.len() {
            self.page_idx += 1;
            self.buffer = decode_page(&self.pages[self.page_idx].read())?;
            self.slot = 0;
        }
        Ok(())
    }
}

impl BacktrackingIterator for TableRecordCursor {
    type Item = Record;

    fn has_next(&self) -> bool {
        self.slot < self.buffer.len()
    }

    fn peek(&self) -> Option<&Record> {
        self.buffer.get(self.slot)
    }

    fn advance(&mut self) -> QueryResult<Option<Record>> {
        let Some(record) = self.buffer.get(self.slot).cloned() else {
            return Ok(None);
        };
        self.slot += 1;
        self.settle()?;
        Ok(Some(record))
    }

    fn mark(&mut self) {
        self.mark = Some((self.page_idx, self.slot));
    }

    fn reset(&mut self) -> QueryResult<()> {
        let (page_idx, slot) = self.mark.ok_or(QueryError::NoMark)?;
        if page_idx != self.page_idx {
            self.buffer = decode_page(&self.pages[page_idx].read())?;
            self.page_idx = page_idx;
        }
        self.slot = slot;
        Ok(())
    }
}
