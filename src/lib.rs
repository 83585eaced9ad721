// Bayun Database Engine core
//
// Multi-granularity lock manager plus the join and external sort operators,
// over an in-memory heap storage.

pub mod common;
pub mod query;
pub mod storage;
pub mod transaction;
pub mod catalog;

// Re-export key items for convenient access
pub use catalog::{Column, DataType, Schema};
pub use common::{ArrayCursor, BacktrackingIterator};
pub use query::executor::operators::{
    collect_records, create_join, materialize, EquiJoin, ExternalSort, JoinStrategy, Operator,
};
pub use query::executor::result::{DataValue, QueryError, QueryResult, Record};
pub use storage::page::{PageError, PageManager};
pub use storage::{HeapStorage, RelationStore, StorageConfig};
pub use transaction::{
    LockError, LockManager, LockOutcome, LockType, Resource, Transaction, TransactionManager,
    TransactionStatus,
};
