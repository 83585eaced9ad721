// External Sort
//
// Multiway merge sort over relations larger than the buffer budget. Pass 0
// sorts B-1 pages at a time into runs; each merge pass combines up to B-1
// runs until one remains.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Arc;
use log::{debug, info};

use crate::catalog::Schema;
use crate::common::cursor::BacktrackingIterator;
use crate::query::executor::operators::Operator;
use crate::query::executor::result::{QueryError, QueryResult, Record};
use crate::storage::{RelationStore, TableRecordCursor};

/// Total order over records used by the sort
pub trait RecordComparator: Send + Sync {
    fn compare(&self, a: &Record, b: &Record) -> Ordering;
}

/// Orders records by the value of a single column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnComparator {
    column: usize,
    descending: bool,
}

impl ColumnComparator {
    pub fn ascending(column: usize) -> Self {
        Self { column, descending: false }
    }

    pub fn descending(column: usize) -> Self {
        Self { column, descending: true }
    }

    pub fn column(&self) -> usize {
        self.column
    }
}

impl RecordComparator for ColumnComparator {
    fn compare(&self, a: &Record, b: &Record) -> Ordering {
        let ord = a.get(self.column).cmp(&b.get(self.column));
        if self.descending { ord.reverse() } else { ord }
    }
}

/// A sorted temp relation produced by one sort pass
pub struct Run {
    store: Arc<dyn RelationStore>,
    table_name: String,
}

impl Run {
    fn create(store: &Arc<dyn RelationStore>, schema: &Schema) -> QueryResult<Self> {
        let table_name = store.create_temp_table(schema.clone())?;
        Ok(Run {
            store: Arc::clone(store),
            table_name,
        })
    }

    pub fn add_record(&self, record: Record) -> QueryResult<()> {
        self.store.insert_record(&self.table_name, record)
    }

    pub fn add_records(&self, records: Vec<Record>) -> QueryResult<()> {
        self.store.insert_records(&self.table_name, records)
    }

    pub fn cursor(&self) -> QueryResult<TableRecordCursor> {
        self.store.record_cursor(&self.table_name)
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    fn discard(self) -> QueryResult<()> {
        self.store.drop_table(&self.table_name)
    }
}

/// Head record of one input run during a merge.
/// Ordered so that `BinaryHeap` pops the smallest record first, and the
/// earliest run among equal records.
struct MergeEntry<'a> {
    record: Record,
    run_idx: usize,
    comparator: &'a dyn RecordComparator,
}

impl Ord for MergeEntry<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.comparator
            .compare(&other.record, &self.record)
            .then_with(|| other.run_idx.cmp(&self.run_idx))
    }
}

impl PartialOrd for MergeEntry<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for MergeEntry<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for MergeEntry<'_> {}

/// External merge sort of one table
pub struct ExternalSort {
    store: Arc<dyn RelationStore>,
    table_name: String,
    schema: Schema,
    comparator: Arc<dyn RecordComparator>,
    num_buffers: usize,
}

impl ExternalSort {
    pub fn new(
        store: Arc<dyn RelationStore>,
        table_name: &str,
        comparator: Arc<dyn RecordComparator>,
    ) -> QueryResult<Self> {
        let schema = store.schema(table_name)?;
        let num_buffers = store.num_buffers();
        Ok(ExternalSort {
            store,
            table_name: table_name.to_string(),
            schema,
            comparator,
            num_buffers,
        })
    }

    /// Override the buffer budget taken from the store
    pub fn with_buffers(mut self, num_buffers: usize) -> QueryResult<Self> {
        if num_buffers == 0 {
            return Err(QueryError::InvalidOperation(
                "Sort needs at least one buffer".to_string(),
            ));
        }
        self.num_buffers = num_buffers;
        Ok(self)
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Pages sorted in memory per initial run
    fn pages_per_run(&self) -> usize {
        self.num_buffers.saturating_sub(1).max(1)
    }

    /// Runs combined per merge; at least two so every pass makes progress
    fn fan_in(&self) -> usize {
        self.num_buffers.saturating_sub(1).max(2)
    }

    /// Sort the table and return the name of the temp table holding the
    /// sorted records. The input table is left untouched.
    pub fn sort(&self) -> QueryResult<String> {
        let mut runs = self.create_initial_runs()?;
        let initial = runs.len();
        let mut passes = 0;

        while runs.len() > 1 {
            runs = self.merge_pass(runs)?;
            passes += 1;
        }

        let run = match runs.pop() {
            Some(run) => run,
            None => Run::create(&self.store, &self.schema)?,
        };
        info!(
            "sorted '{}' into '{}': {} initial runs, {} merge passes, B={}",
            self.table_name, run.table_name, initial, passes, self.num_buffers
        );
        Ok(run.table_name)
    }

    /// Pass 0: one sorted run per group of B-1 pages
    fn create_initial_runs(&self) -> QueryResult<Vec<Run>> {
        let mut pages = self.store.page_cursor(&self.table_name)?;
        let mut runs = Vec::new();
        while pages.has_next() {
            let block = self
                .store
                .block_cursor(&self.table_name, &mut pages, self.pages_per_run())?;
            runs.push(self.sort_records(block.collect())?);
        }
        debug!("'{}': {} initial runs", self.table_name, runs.len());
        Ok(runs)
    }

    /// Sort records in memory into a new run. The sort is stable.
    pub fn sort_records(&self, mut records: Vec<Record>) -> QueryResult<Run> {
        records.sort_by(|a, b| self.comparator.compare(a, b));
        let run = Run::create(&self.store, &self.schema)?;
        run.add_records(records)?;
        Ok(run)
    }

    /// Sorted copy of an existing run
    pub fn sort_run(&self, run: &Run) -> QueryResult<Run> {
        let mut cursor = run.cursor()?;
        let mut records = Vec::new();
        while let Some(record) = cursor.advance()? {
            records.push(record);
        }
        self.sort_records(records)
    }

    /// Merge sorted runs into one sorted run. Equal records keep the order of
    /// the runs they come from.
    pub fn merge_sorted_runs(&self, runs: &[Run]) -> QueryResult<Run> {
        let merged = Run::create(&self.store, &self.schema)?;
        let comparator = self.comparator.as_ref();

        let mut cursors = Vec::with_capacity(runs.len());
        let mut heap = BinaryHeap::with_capacity(runs.len());
        for (run_idx, run) in runs.iter().enumerate() {
            let mut cursor = run.cursor()?;
            if let Some(record) = cursor.advance()? {
                heap.push(MergeEntry { record, run_idx, comparator });
            }
            cursors.push(cursor);
        }

        while let Some(MergeEntry { record, run_idx, .. }) = heap.pop() {
            merged.add_record(record)?;
            if let Some(next) = cursors[run_idx].advance()? {
                heap.push(MergeEntry { record: next, run_idx, comparator });
            }
        }
        Ok(merged)
    }

    /// Merge groups of up to B-1 runs; the input runs are dropped
    pub fn merge_pass(&self, runs: Vec<Run>) -> QueryResult<Vec<Run>> {
        let fan_in = self.fan_in();
        let mut merged = Vec::with_capacity(runs.len().div_ceil(fan_in));
        let mut runs = runs.into_iter().peekable();

        while runs.peek().is_some() {
            let group: Vec<Run> = runs.by_ref().take(fan_in).collect();
            merged.push(self.merge_sorted_runs(&group)?);
            for run in group {
                run.discard()?;
            }
        }
        debug!("'{}': merge pass produced {} runs", self.table_name, merged.len());
        Ok(merged)
    }
}

/// Operator that externally sorts a table and streams the result
pub struct SortOperator {
    sort: ExternalSort,
    /// Temp table with the sorted records, set by init
    sorted_table: Option<String>,
    cursor: Option<TableRecordCursor>,
}

impl SortOperator {
    pub fn new(
        store: Arc<dyn RelationStore>,
        table_name: &str,
        comparator: Arc<dyn RecordComparator>,
    ) -> QueryResult<Self> {
        Ok(SortOperator {
            sort: ExternalSort::new(store, table_name, comparator)?,
            sorted_table: None,
            cursor: None,
        })
    }

    /// Sort by a named column
    pub fn by_column(
        store: Arc<dyn RelationStore>,
        table_name: &str,
        column: &str,
        descending: bool,
    ) -> QueryResult<Self> {
        let index = store.schema(table_name)?.qualified(table_name).column_index(column)?;
        let comparator = if descending {
            ColumnComparator::descending(index)
        } else {
            ColumnComparator::ascending(index)
        };
        Self::new(store, table_name, Arc::new(comparator))
    }

    fn drop_sorted(&mut self) -> QueryResult<()> {
        self.cursor = None;
        if let Some(table) = self.sorted_table.take() {
            self.sort.store.drop_table(&table)?;
        }
        Ok(())
    }
}

impl Operator for SortOperator {
    fn init(&mut self) -> QueryResult<()> {
        self.drop_sorted()?;
        let table = self.sort.sort()?;
        self.cursor = Some(self.sort.store.record_cursor(&table)?);
        self.sorted_table = Some(table);
        Ok(())
    }

    fn next(&mut self) -> QueryResult<Option<Record>> {
        if self.cursor.is_none() {
            self.init()?;
        }
        match self.cursor.as_mut() {
            Some(cursor) => cursor.advance(),
            None => Ok(None),
        }
    }

    fn close(&mut self) -> QueryResult<()> {
        self.drop_sorted()
    }

    fn schema(&self) -> &Schema {
        self.sort.schema()
    }
}
