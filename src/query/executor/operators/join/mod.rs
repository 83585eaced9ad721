// Join Operators Module
//
// Equi-join operators over two stored tables: block and page nested-loop
// joins, and the sort-merge join.

mod nested_loop;
mod sort_merge;

pub use self::nested_loop::{BlockNestedLoopJoin, PageNestedLoopJoin};
pub use self::sort_merge::SortMergeJoin;

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::catalog::Schema;
use crate::query::executor::operators::Operator;
use crate::query::executor::result::{DataValue, QueryError, QueryResult, Record};
use crate::storage::RelationStore;

/// Inputs of an equality join: `left.left_column = right.right_column`
#[derive(Clone)]
pub struct EquiJoin {
    store: Arc<dyn RelationStore>,
    left_table: String,
    right_table: String,
    left_column: usize,
    right_column: usize,
    /// Left columns followed by right columns, qualified by table name
    schema: Schema,
}

impl EquiJoin {
    /// Resolve the join columns against the tables' schemas. Column names may
    /// be plain (`id`) or qualified (`users.id`).
    pub fn new(
        store: Arc<dyn RelationStore>,
        left_table: &str,
        right_table: &str,
        left_column: &str,
        right_column: &str,
    ) -> QueryResult<Self> {
        let left_schema = store.schema(left_table)?.qualified(left_table);
        let right_schema = store.schema(right_table)?.qualified(right_table);
        let left_idx = left_schema.column_index(left_column)?;
        let right_idx = right_schema.column_index(right_column)?;

        let left_type = left_schema.columns()[left_idx].data_type();
        let right_type = right_schema.columns()[right_idx].data_type();
        if left_type != right_type {
            return Err(QueryError::SchemaMismatch(format!(
                "Cannot join {} column '{}' with {} column '{}'",
                left_type, left_column, right_type, right_column
            )));
        }

        Ok(EquiJoin {
            store,
            left_table: left_table.to_string(),
            right_table: right_table.to_string(),
            left_column: left_idx,
            right_column: right_idx,
            schema: left_schema.concat(&right_schema),
        })
    }

    pub fn store(&self) -> &Arc<dyn RelationStore> {
        &self.store
    }

    pub fn left_table(&self) -> &str {
        &self.left_table
    }

    pub fn right_table(&self) -> &str {
        &self.right_table
    }

    pub fn left_column(&self) -> usize {
        self.left_column
    }

    pub fn right_column(&self) -> usize {
        self.right_column
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn left_key<'r>(&self, record: &'r Record) -> QueryResult<&'r DataValue> {
        record.value(self.left_column)
    }

    pub fn right_key<'r>(&self, record: &'r Record) -> QueryResult<&'r DataValue> {
        record.value(self.right_column)
    }

    /// Order of the left record's key relative to the right record's
    pub fn compare(&self, left: &Record, right: &Record) -> QueryResult<Ordering> {
        Ok(self.left_key(left)?.cmp(self.right_key(right)?))
    }

    pub fn matches(&self, left: &Record, right: &Record) -> QueryResult<bool> {
        Ok(self.compare(left, right)? == Ordering::Equal)
    }
}

/// Join algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinStrategy {
    BlockNestedLoop,
    PageNestedLoop,
    SortMerge,
}

impl JoinStrategy {
    pub fn all() -> [JoinStrategy; 3] {
        [JoinStrategy::BlockNestedLoop, JoinStrategy::PageNestedLoop, JoinStrategy::SortMerge]
    }
}

impl fmt::Display for JoinStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JoinStrategy::BlockNestedLoop => "bnlj",
            JoinStrategy::PageNestedLoop => "pnlj",
            JoinStrategy::SortMerge => "sort-merge",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for JoinStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "bnlj" | "block" | "block-nested-loop" => Ok(JoinStrategy::BlockNestedLoop),
            "pnlj" | "page" | "page-nested-loop" => Ok(JoinStrategy::PageNestedLoop),
            "smj" | "sort-merge" | "sortmerge" => Ok(JoinStrategy::SortMerge),
            _ => Err(format!("Unknown join strategy: {}", s)),
        }
    }
}

/// Create a join operator for the given strategy
pub fn create_join(strategy: JoinStrategy, join: EquiJoin) -> QueryResult<Box<dyn Operator>> {
    Ok(match strategy {
        JoinStrategy::BlockNestedLoop => Box::new(BlockNestedLoopJoin::new(join)),
        JoinStrategy::PageNestedLoop => Box::new(PageNestedLoopJoin::new(join)),
        JoinStrategy::SortMerge => Box::new(SortMergeJoin::new(join)),
    })
}
