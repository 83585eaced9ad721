// BayunDB Transaction handle
// Represents a transaction as seen by the lock manager

use std::fmt;
use std::time::{Duration, Instant};
use parking_lot::{Condvar, Mutex};

use crate::common::types::TxnId;

/// Transaction status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionStatus {
    /// Free to issue lock and release calls
    Running,
    /// Blocked on a queued lock request
    Waiting,
    Committed,
    Aborted,
}

impl TransactionStatus {
    /// True once the transaction has committed or aborted
    pub fn is_finished(self) -> bool {
        matches!(self, TransactionStatus::Committed | TransactionStatus::Aborted)
    }
}

/// Transaction - a thread of control that requests locks.
///
/// A transaction whose request is queued is put to sleep by the lock
/// manager and woken by the release that grants it. The owning thread parks
/// in `wait_until_running` in between.
pub struct Transaction {
    /// Transaction ID
    id: TxnId,

    /// Current status, guarded for the condition variable
    status: Mutex<TransactionStatus>,

    /// Signalled on every status change
    status_changed: Condvar,
}

impl Transaction {
    /// Create a new running transaction with the given ID
    pub fn new(id: TxnId) -> Self {
        Self {
            id,
            status: Mutex::new(TransactionStatus::Running),
            status_changed: Condvar::new(),
        }
    }

    pub fn id(&self) -> TxnId {
        self.id
    }

    pub fn status(&self) -> TransactionStatus {
        *self.status.lock()
    }

    pub fn is_waiting(&self) -> bool {
        self.status() == TransactionStatus::Waiting
    }

    /// Mark the transaction as blocked on a lock request
    pub fn sleep(&self) {
        self.set_status(TransactionStatus::Waiting);
    }

    /// Return a waiting transaction to Running and wake its thread
    pub fn wake(&self) {
        self.set_status(TransactionStatus::Running);
    }

    pub(crate) fn set_status(&self, status: TransactionStatus) {
        let mut current = self.status.lock();
        *current = status;
        self.status_changed.notify_all();
    }

    /// Park the calling thread while the transaction is Waiting
    pub fn wait_until_running(&self) {
        let mut status = self.status.lock();
        while *status == TransactionStatus::Waiting {
            self.status_changed.wait(&mut status);
        }
    }

    /// Like `wait_until_running`, giving up after `timeout`.
    /// Returns true if the transaction is no longer waiting.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut status = self.status.lock();
        while *status == TransactionStatus::Waiting {
            if self.status_changed.wait_until(&mut status, deadline).timed_out() {
                break;
            }
        }
        *status != TransactionStatus::Waiting
    }
}

impl fmt::Debug for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("id", &self.id)
            .field("status", &self.status())
            .finish()
    }
}
