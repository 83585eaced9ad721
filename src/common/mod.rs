// BayunDB Common Module
//
// Shared primitive types and the backtracking cursor abstraction used by
// the join and sort operators.

pub mod types;
pub mod cursor;

pub use cursor::{ArrayCursor, BacktrackingIterator};
