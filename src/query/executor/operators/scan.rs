// Sequential Scan Operator
//
// This module implements a simple table scan operator for query execution.

use std::sync::Arc;

use crate::catalog::Schema;
use crate::common::cursor::BacktrackingIterator;
use crate::query::executor::operators::Operator;
use crate::query::executor::result::{QueryResult, Record};
use crate::storage::{RelationStore, TableRecordCursor};

/// A scan operator that returns all records of a table in storage order
pub struct SeqScan {
    /// Storage holding the table
    store: Arc<dyn RelationStore>,
    /// Table name to scan
    table_name: String,
    /// Schema of the table
    schema: Schema,
    /// Open cursor, set by init
    cursor: Option<TableRecordCursor>,
}

impl SeqScan {
    /// Create a new scan; fails if the table does not exist
    pub fn new(store: Arc<dyn RelationStore>, table_name: &str) -> QueryResult<Self> {
        let schema = store.schema(table_name)?;
        Ok(SeqScan {
            store,
            table_name: table_name.to_string(),
            schema,
            cursor: None,
        })
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }
}

impl Operator for SeqScan {
    fn init(&mut self) -> QueryResult<()> {
        self.cursor = Some(self.store.record_cursor(&self.table_name)?);
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
        self.cursor = None;
        Ok(())
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }
}
