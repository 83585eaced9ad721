use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use log::debug;
use parking_lot::Mutex;

use crate::common::types::TxnId;
use crate::transaction::concurrency::lock_manager::{LockError, LockManager, LockResult};
use crate::transaction::concurrency::transaction::{Transaction, TransactionStatus};

/// Transaction manager - responsible for creating and tracking transactions.
///
/// Committing or aborting a transaction is its shrinking phase: every lock
/// it holds is released at once, pages before tables.
pub struct TransactionManager {
    /// Next transaction ID to assign
    next_txn_id: AtomicU32,

    /// Lock manager shared with the transactions' callers
    lock_manager: Arc<LockManager>,

    /// Active transactions map (txn_id -> Transaction)
    active_transactions: Mutex<HashMap<TxnId, Arc<Transaction>>>,
}

impl TransactionManager {
    /// Create a new transaction manager
    pub fn new(lock_manager: Arc<LockManager>) -> Self {
        Self {
            next_txn_id: AtomicU32::new(1), // Start from 1
            lock_manager,
            active_transactions: Mutex::new(HashMap::new()),
        }
    }

    pub fn lock_manager(&self) -> &Arc<LockManager> {
        &self.lock_manager
    }

    /// Begin a new transaction
    pub fn begin(&self) -> Arc<Transaction> {
        let txn_id = self.next_txn_id.fetch_add(1, Ordering::SeqCst);
        let txn = Arc::new(Transaction::new(txn_id));
        self.active_transactions.lock().insert(txn_id, Arc::clone(&txn));
        debug!("began txn {}", txn_id);
        txn
    }

    /// Commit a running transaction, releasing its locks.
    /// Returns the ids of the transactions woken by the release.
    pub fn commit(&self, txn_id: TxnId) -> LockResult<Vec<TxnId>> {
        self.finish(txn_id, TransactionStatus::Committed)
    }

    /// Abort a transaction, dropping its locks and any queued request
    pub fn abort(&self, txn_id: TxnId) -> LockResult<Vec<TxnId>> {
        self.finish(txn_id, TransactionStatus::Aborted)
    }

    fn finish(&self, txn_id: TxnId, status: TransactionStatus) -> LockResult<Vec<TxnId>> {
        let mut txns = self.active_transactions.lock();
        let txn = txns
            .get(&txn_id)
            .ok_or(LockError::TransactionNotFound(txn_id))?;

        // A waiting transaction can be aborted but not committed
        let current = txn.status();
        if current != TransactionStatus::Running
            && !(current == TransactionStatus::Waiting && status == TransactionStatus::Aborted)
        {
            return Err(LockError::InvalidState(txn_id, current));
        }

        let woken = self.lock_manager.release_all(txn_id);
        txn.set_status(status);
        txns.remove(&txn_id);
        debug!("txn {} finished as {:?}", txn_id, status);
        Ok(woken)
    }

    /// Get a transaction by ID
    pub fn get_transaction(&self, txn_id: TxnId) -> Option<Arc<Transaction>> {
        self.active_transactions.lock().get(&txn_id).cloned()
    }

    /// Check if a transaction exists
    pub fn transaction_exists(&self, txn_id: TxnId) -> bool {
        self.active_transactions.lock().contains_key(&txn_id)
    }

    /// Get all active transaction IDs
    pub fn get_active_transaction_ids(&self) -> Vec<TxnId> {
        let mut ids: Vec<TxnId> = self.active_transactions.lock().keys().cloned().collect();
        ids.sort();
        ids
    }
}
