// Query Operators Module
//
// This module defines the operators used for query execution in the
// iterator-based execution model.

pub mod scan;
pub mod sort;
pub mod materialize;
pub mod join;

use std::sync::Arc;

use crate::catalog::Schema;
use crate::query::executor::result::{QueryResult, Record};
use crate::storage::RelationStore;

pub use scan::SeqScan;
pub use sort::{ColumnComparator, ExternalSort, RecordComparator, Run, SortOperator};
pub use materialize::materialize;
pub use join::{create_join, BlockNestedLoopJoin, EquiJoin, JoinStrategy, PageNestedLoopJoin, SortMergeJoin};

/// The Operator trait defines the interface for all query execution operators
/// in the iterator-based execution model. Each operator produces records
/// one at a time for its consumer.
pub trait Operator: Send + Sync {
    /// Initialize the operator before execution
    fn init(&mut self) -> QueryResult<()>;

    /// Get the next record from this operator; `None` once exhausted
    fn next(&mut self) -> QueryResult<Option<Record>>;

    /// Close the operator and release any resources
    fn close(&mut self) -> QueryResult<()>;

    /// Schema of the records this operator produces
    fn schema(&self) -> &Schema;
}

/// Run an operator to completion and collect its output
pub fn collect_records(op: &mut dyn Operator) -> QueryResult<Vec<Record>> {
    op.init()?;
    let mut records = Vec::new();
    while let Some(record) = op.next()? {
        records.push(record);
    }
    op.close()?;
    Ok(records)
}

// Factory functions for creating operators
pub fn create_seq_scan(store: Arc<dyn RelationStore>, table_name: &str) -> QueryResult<Box<dyn Operator>> {
    Ok(Box::new(SeqScan::new(store, table_name)?))
}

pub fn create_sort(
    store: Arc<dyn RelationStore>,
    table_name: &str,
    column: &str,
    descending: bool,
) -> QueryResult<Box<dyn Operator>> {
    Ok(Box::new(SortOperator::by_column(store, table_name, column, descending)?))
}
