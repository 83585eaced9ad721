// Transaction concurrency module exports

pub mod resource;
pub mod transaction;
pub mod lock_manager;
pub mod transaction_manager;

// Public exports
pub use resource::Resource;
pub use transaction::{Transaction, TransactionStatus};
pub use lock_manager::{LockError, LockManager, LockOutcome, LockResult, LockType, Request};
pub use transaction_manager::TransactionManager;
