// Query Executor Module
//
// This module is responsible for executing joins and sorts over stored
// relations. It implements the iterator-based execution model.

pub mod result;
pub mod operators;

// Export key types
pub use self::result::{DataValue, QueryError, QueryResult, Record};
pub use self::operators::Operator;
