// Relation Store
//
// The narrow storage interface consumed by the join and sort operators, and
// the in-memory heap implementation of it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use log::{debug, trace};
use parking_lot::RwLock;

use crate::catalog::Schema;
use crate::common::cursor::{ArrayCursor, BacktrackingIterator};
use crate::common::types::{PagePtr, DEFAULT_PAGE_SIZE, MIN_PAGE_SIZE};
use crate::query::executor::result::{QueryError, QueryResult, Record};
use crate::storage::table::{decode_page, HeapTable, TableRecordCursor};

/// Cursor over the pages of a relation
pub type PageCursor = ArrayCursor<PagePtr>;

/// Configuration for the heap storage
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Size of each page in bytes
    pub page_size: usize,
    /// Number of in-memory page buffers an operator may use
    pub num_buffers: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            num_buffers: 5,
        }
    }
}

/// Storage services the execution operators depend on
pub trait RelationStore: Send + Sync {
    /// Number of page buffers available to a single operator
    fn num_buffers(&self) -> usize;

    fn create_table(&self, name: &str, schema: Schema) -> QueryResult<()>;

    /// Create a table with a generated name and return that name
    fn create_temp_table(&self, schema: Schema) -> QueryResult<String>;

    fn drop_table(&self, name: &str) -> QueryResult<()>;

    fn has_table(&self, name: &str) -> bool;

    fn schema(&self, name: &str) -> QueryResult<Schema>;

    fn insert_record(&self, name: &str, record: Record) -> QueryResult<()>;

    fn insert_records(&self, name: &str, records: Vec<Record>) -> QueryResult<()> {
        for record in records {
            self.insert_record(name, record)?;
        }
        Ok(())
    }

    fn num_pages(&self, name: &str) -> QueryResult<usize>;

    fn num_records(&self, name: &str) -> QueryResult<usize>;

    /// Cursor over the pages of a relation
    fn page_cursor(&self, name: &str) -> QueryResult<PageCursor>;

    /// Consume up to `max_pages` pages from `pages` and return their records
    /// as one replayable block
    fn block_cursor(
        &self,
        name: &str,
        pages: &mut PageCursor,
        max_pages: usize,
    ) -> QueryResult<ArrayCursor<Record>>;

    /// Scan over every record of a relation
    fn record_cursor(&self, name: &str) -> QueryResult<TableRecordCursor>;
}

/// In-memory heap storage
pub struct HeapStorage {
    config: StorageConfig,
    tables: RwLock<HashMap<String, HeapTable>>,
    next_temp_id: AtomicU32,
}

impl HeapStorage {
    pub fn new(config: StorageConfig) -> QueryResult<Self> {
        if config.page_size < MIN_PAGE_SIZE {
            return Err(QueryError::InvalidOperation(format!(
                "Page size {} is below the minimum of {} bytes",
                config.page_size, MIN_PAGE_SIZE
            )));
        }
        if config.num_buffers == 0 {
            return Err(QueryError::InvalidOperation(
                "At least one page buffer is required".to_string(),
            ));
        }

        Ok(Self {
            config,
            tables: RwLock::new(HashMap::new()),
            next_temp_id: AtomicU32::new(0),
        })
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// Names of all tables, sorted
    pub fn table_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tables.read().keys().cloned().collect();
        names.sort();
        names
    }

    fn with_table<T>(&self, name: &str, f: impl FnOnce(&HeapTable) -> T) -> QueryResult<T> {
        let tables = self.tables.read();
        let table = tables
            .get(name)
            .ok_or_else(|| QueryError::TableNotFound(name.to_string()))?;
        Ok(f(table))
    }
}

impl RelationStore for HeapStorage {
    fn num_buffers(&self) -> usize {
        self.config.num_buffers
    }

    fn create_table(&self, name: &str, schema: Schema) -> QueryResult<()> {
        let mut tables = self.tables.write();
        if tables.contains_key(name) {
            return Err(QueryError::TableAlreadyExists(name.to_string()));
        }
        debug!("creating table '{}' with {} columns", name, schema.len());
        tables.insert(
            name.to_string(),
            HeapTable::new(name.to_string(), schema, self.config.page_size),
        );
        Ok(())
    }

    fn create_temp_table(&self, schema: Schema) -> QueryResult<String> {
        let mut tables = self.tables.write();
        let name = loop {
            let id = self.next_temp_id.fetch_add(1, Ordering::SeqCst);
            let candidate = format!("temp_{}", id);
            if !tables.contains_key(&candidate) {
                break candidate;
            }
        };
        trace!("creating temp table '{}'", name);
        tables.insert(
            name.clone(),
            HeapTable::new(name.clone(), schema, self.config.page_size),
        );
        Ok(name)
    }

    fn drop_table(&self, name: &str) -> QueryResult<()> {
        self.tables
            .write()
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| QueryError::TableNotFound(name.to_string()))
    }

    fn has_table(&self, name: &str) -> bool {
        self.tables.read().contains_key(name)
    }

    fn schema(&self, name: &str) -> QueryResult<Schema> {
        self.with_table(name, |t| t.schema().clone())
    }

    fn insert_record(&self, name: &str, record: Record) -> QueryResult<()> {
        let mut tables = self.tables.write();
        let table = tables
            .get_mut(name)
            .ok_or_else(|| QueryError::TableNotFound(name.to_string()))?;
        table.insert(&record)
    }

    fn num_pages(&self, name: &str) -> QueryResult<usize> {
        self.with_table(name, |t| t.num_pages())
    }

    fn num_records(&self, name: &str) -> QueryResult<usize> {
        self.with_table(name, |t| t.num_records())
    }

    fn page_cursor(&self, name: &str) -> QueryResult<PageCursor> {
        self.with_table(name, |t| ArrayCursor::new(t.pages()))
    }

    fn block_cursor(
        &self,
        name: &str,
        pages: &mut PageCursor,
        max_pages: usize,
    ) -> QueryResult<ArrayCursor<Record>> {
        if max_pages == 0 {
            return Err(QueryError::InvalidOperation(format!(
                "Block over '{}' must span at least one page",
                name
            )));
        }

        let mut records = Vec::new();
        let mut loaded = 0;
        while loaded < max_pages {
            let Some(page) = pages.advance()? else {
                break;
            };
            records.extend(decode_page(&page.read())?);
            loaded += 1;
        }
        trace!("block over '{}': {} pages, {} records", name, loaded, records.len());
        Ok(ArrayCursor::new(records))
    }

    fn record_cursor(&self, name: &str) -> QueryResult<TableRecordCursor> {
        let pages = self.with_table(name, |t| t.pages())?;
        TableRecordCursor::new(pages)
    }
}
