// BayunDB Lock Manager
//
// Multi-granularity two-phase locking over tables and pages. Requests that
// cannot be granted are queued per resource in FIFO order and granted by the
// release that makes them compatible.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;
use log::{debug, trace};
use parking_lot::Mutex;
use thiserror::Error;

use crate::common::types::TxnId;
use crate::transaction::concurrency::resource::Resource;
use crate::transaction::concurrency::transaction::{Transaction, TransactionStatus};

/// Lock modes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockType {
    /// Intention to read pages of a table
    IS,
    /// Intention to write pages of a table
    IX,
    S,
    X,
}

impl LockType {
    /// Whether a lock of this mode held by one transaction allows another
    /// transaction to be granted `requested`
    pub fn is_compatible(self, requested: LockType) -> bool {
        use LockType::*;
        matches!(
            (self, requested),
            (IS, IS) | (IS, IX) | (IS, S) | (IX, IS) | (IX, IX) | (S, IS) | (S, S)
        )
    }

    pub fn is_intent(self) -> bool {
        matches!(self, LockType::IS | LockType::IX)
    }

    /// True if holding `self` already grants everything `other` would
    fn covers(self, other: LockType) -> bool {
        use LockType::*;
        match self {
            X => true,
            IX => matches!(other, IS | IX),
            S => matches!(other, IS | S),
            IS => other == IS,
        }
    }

    /// All four modes, weakest intent first
    pub fn all() -> [LockType; 4] {
        [LockType::IS, LockType::IX, LockType::S, LockType::X]
    }
}

impl fmt::Display for LockType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LockType::IS => "IS",
            LockType::IX => "IX",
            LockType::S => "S",
            LockType::X => "X",
        };
        write!(f, "{}", name)
    }
}

/// A (transaction, mode) pair, granted or pending
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Request {
    pub txn_id: TxnId,
    pub lock_type: LockType,
}

impl Request {
    pub fn new(txn_id: TxnId, lock_type: LockType) -> Self {
        Self { txn_id, lock_type }
    }
}

/// Result of a successful `acquire`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockOutcome {
    /// Added to the owners
    Granted,
    /// The sole S owner was converted to X in place
    Upgraded,
    /// Appended to the wait queue; the transaction is now Waiting
    Queued,
}

/// Errors that can occur during lock processing
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LockError {
    #[error("Transaction {0} is waiting for a lock and cannot issue requests")]
    TransactionBlocked(TxnId),

    #[error("Transaction {txn} already holds {lock_type} on {resource}")]
    AlreadyHeld { txn: TxnId, resource: Resource, lock_type: LockType },

    #[error("Intent lock {lock_type} requested on {resource}")]
    IntentLockOnPage { resource: Resource, lock_type: LockType },

    #[error("Transaction {txn} needs an intent lock on the table before locking {resource} in {lock_type}")]
    MissingIntentLock { txn: TxnId, resource: Resource, lock_type: LockType },

    #[error("Transaction {txn} cannot downgrade {held} to {requested} on {resource}")]
    IllegalDowngrade { txn: TxnId, resource: Resource, held: LockType, requested: LockType },

    #[error("Transaction {txn} cannot convert {held} to {requested} on {resource}")]
    UnsupportedConversion { txn: TxnId, resource: Resource, held: LockType, requested: LockType },

    #[error("No transaction holds a lock on {0}")]
    NoOwners(Resource),

    #[error("Transaction {txn} holds no lock on {resource}")]
    NotHeld { txn: TxnId, resource: Resource },

    #[error("Transaction {txn} still holds page locks in table {table}")]
    PageLocksOutstanding { txn: TxnId, table: String },

    #[error("Transaction {0} not found")]
    TransactionNotFound(TxnId),

    #[error("Transaction {0} is {1:?}")]
    InvalidState(TxnId, TransactionStatus),
}

impl LockError {
    /// True for requests rejected because they break the locking protocol
    pub fn is_invalid_request(&self) -> bool {
        !matches!(self, LockError::TransactionNotFound(_) | LockError::InvalidState(..))
    }
}

/// Result type for lock operations
pub type LockResult<T> = std::result::Result<T, LockError>;

struct QueuedRequest {
    txn: Arc<Transaction>,
    lock_type: LockType,
}

/// Owners and waiters of one resource
#[derive(Default)]
struct ResourceLockState {
    /// At most one entry per transaction
    owners: Vec<Request>,
    wait_queue: VecDeque<QueuedRequest>,
}

impl ResourceLockState {
    fn held_by(&self, txn_id: TxnId) -> Option<LockType> {
        self.owners
            .iter()
            .find(|r| r.txn_id == txn_id)
            .map(|r| r.lock_type)
    }

    fn compatible_with_others(&self, txn_id: TxnId, lock_type: LockType) -> bool {
        self.owners
            .iter()
            .filter(|r| r.txn_id != txn_id)
            .all(|r| r.lock_type.is_compatible(lock_type))
    }

    /// Add an owner, replacing the transaction's existing entry
    fn grant(&mut self, txn_id: TxnId, lock_type: LockType) {
        match self.owners.iter_mut().find(|r| r.txn_id == txn_id) {
            Some(owner) => owner.lock_type = lock_type,
            None => self.owners.push(Request::new(txn_id, lock_type)),
        }
    }

    /// Grant what a release allows: the queue is drained only once no owner
    /// is left; a lone S owner whose own X request heads the queue is
    /// upgraded. Anything else keeps waiting.
    fn after_release(&mut self) -> Vec<TxnId> {
        if self.owners.is_empty() {
            return self.promote_waiters();
        }

        let sole_shared = match self.owners.as_slice() {
            [owner] if owner.lock_type == LockType::S => owner.txn_id,
            _ => return Vec::new(),
        };
        let head_upgrades = self
            .wait_queue
            .front()
            .is_some_and(|q| q.txn.id() == sole_shared && q.lock_type == LockType::X);
        if !head_upgrades {
            return Vec::new();
        }

        let Some(request) = self.wait_queue.pop_front() else {
            return Vec::new();
        };
        self.owners.clear();
        self.owners.push(Request::new(sole_shared, LockType::X));
        request.txn.wake();
        vec![sole_shared]
    }

    /// Grant queued requests from the head while they stay compatible.
    /// An X grant ends the pass.
    fn promote_waiters(&mut self) -> Vec<TxnId> {
        let mut woken = Vec::new();
        while let Some(head) = self.wait_queue.front() {
            if !self.compatible_with_others(head.txn.id(), head.lock_type) {
                break;
            }
            let Some(request) = self.wait_queue.pop_front() else {
                break;
            };
            let txn_id = request.txn.id();
            self.grant(txn_id, request.lock_type);
            request.txn.wake();
            woken.push(txn_id);
            if request.lock_type == LockType::X {
                break;
            }
        }
        woken
    }

    fn involves(&self, txn_id: TxnId) -> bool {
        self.held_by(txn_id).is_some() || self.wait_queue.iter().any(|q| q.txn.id() == txn_id)
    }

    fn is_empty(&self) -> bool {
        self.owners.is_empty() && self.wait_queue.is_empty()
    }
}

/// Lock manager - grants, queues and releases locks on resources
pub struct LockManager {
    /// Lock state per resource; entries with no owners and no waiters are pruned
    lock_table: Mutex<HashMap<Resource, ResourceLockState>>,
}

impl Default for LockManager {
    fn default() -> Self {
        Self::new()
    }
}

impl LockManager {
    pub fn new() -> Self {
        Self {
            lock_table: Mutex::new(HashMap::new()),
        }
    }

    /// Request `lock_type` on `resource`.
    ///
    /// A compatible request is granted at once. Otherwise the transaction is
    /// put to sleep and the request is queued; the caller must not issue any
    /// other call for the transaction until it is woken.
    pub fn acquire(
        &self,
        txn: &Arc<Transaction>,
        resource: &Resource,
        lock_type: LockType,
    ) -> LockResult<LockOutcome> {
        let txn_id = txn.id();
        if txn.is_waiting() {
            return Err(LockError::TransactionBlocked(txn_id));
        }

        let mut table = self.lock_table.lock();
        let held = table.get(resource).and_then(|s| s.held_by(txn_id));

        if held == Some(lock_type) {
            return Err(LockError::AlreadyHeld {
                txn: txn_id,
                resource: resource.clone(),
                lock_type,
            });
        }

        if let Some(parent) = resource.parent() {
            if lock_type.is_intent() {
                return Err(LockError::IntentLockOnPage {
                    resource: resource.clone(),
                    lock_type,
                });
            }
            let parent_lock = table.get(&parent).and_then(|s| s.held_by(txn_id));
            let has_intent = match lock_type {
                LockType::S => matches!(parent_lock, Some(LockType::IS) | Some(LockType::IX)),
                _ => parent_lock == Some(LockType::IX),
            };
            if !has_intent {
                return Err(LockError::MissingIntentLock {
                    txn: txn_id,
                    resource: resource.clone(),
                    lock_type,
                });
            }
        }

        if let Some(held) = held {
            if held.covers(lock_type) {
                return Err(LockError::IllegalDowngrade {
                    txn: txn_id,
                    resource: resource.clone(),
                    held,
                    requested: lock_type,
                });
            }
            if !lock_type.covers(held) {
                return Err(LockError::UnsupportedConversion {
                    txn: txn_id,
                    resource: resource.clone(),
                    held,
                    requested: lock_type,
                });
            }
        }

        let state = table.entry(resource.clone()).or_default();

        if held == Some(LockType::S) && lock_type == LockType::X && state.owners.len() == 1 {
            state.grant(txn_id, LockType::X);
            debug!("txn {} upgraded S to X on {}", txn_id, resource);
            return Ok(LockOutcome::Upgraded);
        }

        if state.compatible_with_others(txn_id, lock_type) {
            state.grant(txn_id, lock_type);
            debug!("txn {} granted {} on {}", txn_id, lock_type, resource);
            Ok(LockOutcome::Granted)
        } else {
            txn.sleep();
            state.wait_queue.push_back(QueuedRequest {
                txn: Arc::clone(txn),
                lock_type,
            });
            debug!(
                "txn {} queued for {} on {} behind {} waiters",
                txn_id,
                lock_type,
                resource,
                state.wait_queue.len() - 1
            );
            Ok(LockOutcome::Queued)
        }
    }

    /// `acquire`, then park the calling thread until a queued request is granted
    pub fn acquire_blocking(
        &self,
        txn: &Arc<Transaction>,
        resource: &Resource,
        lock_type: LockType,
    ) -> LockResult<LockOutcome> {
        let outcome = self.acquire(txn, resource, lock_type)?;
        if outcome == LockOutcome::Queued {
            txn.wait_until_running();
        }
        Ok(outcome)
    }

    /// Release the transaction's lock on `resource`. Once the last owner is
    /// gone, queued requests are granted in FIFO order. Returns the ids of
    /// the transactions woken.
    pub fn release(&self, txn: &Transaction, resource: &Resource) -> LockResult<Vec<TxnId>> {
        let txn_id = txn.id();
        let mut table = self.lock_table.lock();

        let held = match table.get(resource) {
            Some(state) if !state.owners.is_empty() => state.held_by(txn_id),
            _ => return Err(LockError::NoOwners(resource.clone())),
        };
        if txn.is_waiting() {
            return Err(LockError::TransactionBlocked(txn_id));
        }
        if held.is_none() {
            return Err(LockError::NotHeld {
                txn: txn_id,
                resource: resource.clone(),
            });
        }

        if let Resource::Table(name) = resource {
            let outstanding = table.iter().any(|(r, state)| {
                matches!(r, Resource::Page { table, .. } if table == name)
                    && state.held_by(txn_id).is_some()
            });
            if outstanding {
                return Err(LockError::PageLocksOutstanding {
                    txn: txn_id,
                    table: name.clone(),
                });
            }
        }

        let Some(state) = table.get_mut(resource) else {
            return Err(LockError::NoOwners(resource.clone()));
        };
        state.owners.retain(|r| r.txn_id != txn_id);
        let woken = state.after_release();
        if state.is_empty() {
            table.remove(resource);
        }

        debug!("txn {} released {}", txn_id, resource);
        if !woken.is_empty() {
            trace!("release of {} woke {:?}", resource, woken);
        }
        Ok(woken)
    }

    /// Drop every lock and queued request of a finished transaction, pages
    /// before tables. Returns the ids of the transactions woken.
    pub fn release_all(&self, txn_id: TxnId) -> Vec<TxnId> {
        let mut table = self.lock_table.lock();

        let mut resources: Vec<Resource> = table
            .iter()
            .filter(|(_, state)| state.involves(txn_id))
            .map(|(resource, _)| resource.clone())
            .collect();
        resources.sort_by_key(|r| !r.is_page());

        let mut woken = Vec::new();
        for resource in resources {
            let Some(state) = table.get_mut(&resource) else {
                continue;
            };
            state.owners.retain(|r| r.txn_id != txn_id);
            state.wait_queue.retain(|q| q.txn.id() != txn_id);
            woken.extend(state.after_release());
            if state.is_empty() {
                table.remove(&resource);
            }
        }

        debug!("txn {} released all locks, woke {:?}", txn_id, woken);
        woken
    }

    /// True iff the transaction owns `lock_type` on `resource`; queued
    /// requests never count
    pub fn holds(&self, txn: &Transaction, resource: &Resource, lock_type: LockType) -> bool {
        self.lock_table
            .lock()
            .get(resource)
            .and_then(|s| s.held_by(txn.id()))
            == Some(lock_type)
    }

    /// Current owners of a resource
    pub fn owners(&self, resource: &Resource) -> Vec<Request> {
        self.lock_table
            .lock()
            .get(resource)
            .map(|s| s.owners.clone())
            .unwrap_or_default()
    }

    /// Pending requests of a resource, in queue order
    pub fn waiters(&self, resource: &Resource) -> Vec<Request> {
        self.lock_table
            .lock()
            .get(resource)
            .map(|s| {
                s.wait_queue
                    .iter()
                    .map(|q| Request::new(q.txn.id(), q.lock_type))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Every lock a transaction owns
    pub fn locks_held_by(&self, txn_id: TxnId) -> Vec<(Resource, LockType)> {
        let mut locks: Vec<(Resource, LockType)> = self
            .lock_table
            .lock()
            .iter()
            .filter_map(|(resource, s)| s.held_by(txn_id).map(|t| (resource.clone(), t)))
            .collect();
        locks.sort_by(|a, b| a.0.cmp(&b.0));
        locks
    }

    /// Number of resources with lock state
    pub fn tracked_resources(&self) -> usize {
        self.lock_table.lock().len()
    }
}
