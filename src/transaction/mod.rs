// BayunDB Transaction Management Module
//
// Two-phase locking over a table/page resource hierarchy.

pub mod concurrency;

// Public exports
pub use concurrency::{
    LockError, LockManager, LockOutcome, LockType, Resource, Transaction, TransactionManager,
    TransactionStatus,
};
