// BayunDB Query Processing Module
//
// This module contains the join and sort operators and the values they
// produce.

pub mod executor;

// Export key public interfaces
pub use executor::result::{QueryError, QueryResult};
