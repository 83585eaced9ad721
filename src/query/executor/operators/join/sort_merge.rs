// Sort-Merge Join Implementation
//
// Both inputs are externally sorted on their join columns, then merged. A
// run of right records sharing a key is marked and replayed for every left
// record with that key.

use std::cmp::Ordering;
use std::sync::Arc;
use log::debug;

use crate::catalog::Schema;
use crate::common::cursor::BacktrackingIterator;
use crate::query::executor::operators::join::EquiJoin;
use crate::query::executor::operators::sort::{ColumnComparator, ExternalSort};
use crate::query::executor::operators::Operator;
use crate::query::executor::result::{DataValue, QueryResult, Record};
use crate::storage::TableRecordCursor;

/// Sort-merge equi-join
pub struct SortMergeJoin {
    join: EquiJoin,
    /// Sorted temp tables, dropped on close
    sorted_tables: Vec<String>,
    left: TableRecordCursor,
    right: TableRecordCursor,
    left_record: Option<Record>,
    /// Key of the right run marked for replay, while inside it
    group_key: Option<DataValue>,
    initialized: bool,
}

impl SortMergeJoin {
    pub fn new(join: EquiJoin) -> Self {
        SortMergeJoin {
            join,
            sorted_tables: Vec::new(),
            left: TableRecordCursor::empty(),
            right: TableRecordCursor::empty(),
            left_record: None,
            group_key: None,
            initialized: false,
        }
    }

    fn sort_input(&mut self, table: &str, column: usize) -> QueryResult<TableRecordCursor> {
        let store = Arc::clone(self.join.store());
        let sorted = ExternalSort::new(
            Arc::clone(&store),
            table,
            Arc::new(ColumnComparator::ascending(column)),
        )?
        .sort()?;
        self.sorted_tables.push(sorted.clone());
        store.record_cursor(&sorted)
    }

    fn drop_sorted(&mut self) -> QueryResult<()> {
        self.left = TableRecordCursor::empty();
        self.right = TableRecordCursor::empty();
        for table in self.sorted_tables.drain(..) {
            self.join.store().drop_table(&table)?;
        }
        Ok(())
    }

    fn fetch_next(&mut self) -> QueryResult<Option<Record>> {
        loop {
            let Some(left) = self.left_record.as_ref() else {
                return Ok(None);
            };
            let left_key = self.join.left_key(left)?;

            if self.group_key.is_none() {
                let Some(right) = self.right.peek() else {
                    self.left_record = None;
                    return Ok(None);
                };
                let ordering = left_key.cmp(self.join.right_key(right)?);
                match ordering {
                    Ordering::Less => self.left_record = self.left.advance()?,
                    Ordering::Greater => {
                        self.right.advance()?;
                    }
                    Ordering::Equal => {
                        self.group_key = Some(left_key.clone());
                        self.right.mark();
                    }
                }
                continue;
            }

            let right_matches = match self.right.peek() {
                Some(right) => self.join.right_key(right)? == left_key,
                None => false,
            };
            if right_matches {
                if let Some(right) = self.right.advance()? {
                    return Ok(Some(left.concat(&right)));
                }
            }

            // Every match of this left record is out; replay the run for
            // the next left record if it has the same key
            self.left_record = self.left.advance()?;
            let same_key = match self.left_record.as_ref() {
                Some(next) => Some(self.join.left_key(next)?) == self.group_key.as_ref(),
                None => false,
            };
            if same_key {
                self.right.reset()?;
            } else {
                self.group_key = None;
            }
        }
    }
}

impl Operator for SortMergeJoin {
    fn init(&mut self) -> QueryResult<()> {
        self.drop_sorted()?;
        let left_table = self.join.left_table().to_string();
        let right_table = self.join.right_table().to_string();
        self.left = self.sort_input(&left_table, self.join.left_column())?;
        self.right = self.sort_input(&right_table, self.join.right_column())?;
        debug!(
            "sort-merge join of '{}' and '{}' via {:?}",
            left_table, right_table, self.sorted_tables
        );

        self.left_record = self.left.advance()?;
        self.group_key = None;
        self.initialized = true;
        Ok(())
    }

    fn next(&mut self) -> QueryResult<Option<Record>> {
        if !self.initialized {
            self.init()?;
        }
        self.fetch_next()
    }

    fn close(&mut self) -> QueryResult<()> {
        self.left_record = None;
        self.group_key = None;
        self.initialized = false;
        self.drop_sorted()
    }

    fn schema(&self) -> &Schema {
        self.join.schema()
    }
}
