// BayunDB Catalog Module
//
// Relation schemas and the value typing rules enforced when records are
// written to a heap table.

pub mod column;
pub mod schema;

pub use column::Column;
pub use schema::{DataType, Schema};
