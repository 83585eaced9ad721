use std::sync::Arc;
use std::time::Duration;
use anyhow::Result;

use bayundb_core::transaction::{
    LockError, LockManager, LockOutcome, LockType, Resource, TransactionManager, TransactionStatus,
};

fn setup() -> (TransactionManager, Arc<LockManager>) {
    let lm = Arc::new(LockManager::new());
    (TransactionManager::new(Arc::clone(&lm)), lm)
}

fn assert_single_x(lm: &LockManager, resource: &Resource) {
    let owners = lm.owners(resource);
    let exclusive = owners.iter().filter(|r| r.lock_type == LockType::X).count();
    assert!(exclusive <= 1, "{} X owners on {}", exclusive, resource);
    if exclusive == 1 {
        assert_eq!(owners.len(), 1, "X shared on {}: {:?}", resource, owners);
    }
}

#[test]
fn test_page_lock_needs_table_intent() -> Result<()> {
    let (tm, lm) = setup();
    let table = Resource::table("T");
    let page = Resource::page("T", 0);

    let a = tm.begin();
    assert_eq!(lm.acquire(&a, &table, LockType::IS)?, LockOutcome::Granted);
    assert_eq!(lm.acquire(&a, &page, LockType::S)?, LockOutcome::Granted);

    let b = tm.begin();
    let err = lm.acquire(&b, &page, LockType::S).unwrap_err();
    assert!(matches!(err, LockError::MissingIntentLock { .. }));
    assert!(err.is_invalid_request());
    assert!(lm.owners(&page).iter().all(|r| r.txn_id == a.id()));
    Ok(())
}

#[test]
fn test_exclusive_page_needs_ix() -> Result<()> {
    let (tm, lm) = setup();
    let a = tm.begin();
    lm.acquire(&a, &Resource::table("T"), LockType::IS)?;
    assert!(matches!(
        lm.acquire(&a, &Resource::page("T", 2), LockType::X),
        Err(LockError::MissingIntentLock { .. })
    ));

    let b = tm.begin();
    lm.acquire(&b, &Resource::table("T"), LockType::IX)?;
    assert_eq!(lm.acquire(&b, &Resource::page("T", 2), LockType::X)?, LockOutcome::Granted);
    assert!(lm.holds(&b, &Resource::page("T", 2), LockType::X));
    Ok(())
}

#[test]
fn test_sole_shared_owner_upgrades_in_place() -> Result<()> {
    let (tm, lm) = setup();
    let r = Resource::table("R");
    let a = tm.begin();

    lm.acquire(&a, &r, LockType::S)?;
    assert_eq!(lm.acquire(&a, &r, LockType::X)?, LockOutcome::Upgraded);

    let owners = lm.owners(&r);
    assert_eq!(owners.len(), 1);
    assert_eq!((owners[0].txn_id, owners[0].lock_type), (a.id(), LockType::X));
    assert!(lm.waiters(&r).is_empty());
    assert_eq!(a.status(), TransactionStatus::Running);
    Ok(())
}

#[test]
fn test_queued_shared_request_granted_on_release() -> Result<()> {
    let (tm, lm) = setup();
    let r = Resource::table("R");
    let a = tm.begin();
    let b = tm.begin();

    lm.acquire(&a, &r, LockType::X)?;
    assert_eq!(lm.acquire(&b, &r, LockType::S)?, LockOutcome::Queued);
    assert!(b.is_waiting());
    assert!(!lm.holds(&b, &r, LockType::S));

    let woken = lm.release(&a, &r)?;
    assert_eq!(woken, vec![b.id()]);
    assert_eq!(b.status(), TransactionStatus::Running);
    assert!(lm.holds(&b, &r, LockType::S));
    assert!(lm.waiters(&r).is_empty());
    Ok(())
}

#[test]
fn test_fifo_grants_stop_at_exclusive() -> Result<()> {
    let (tm, lm) = setup();
    let r = Resource::table("R");
    let owner = tm.begin();
    let s1 = tm.begin();
    let s2 = tm.begin();
    let x = tm.begin();
    let s3 = tm.begin();

    lm.acquire(&owner, &r, LockType::X)?;
    for (txn, lock_type) in [(&s1, LockType::S), (&s2, LockType::S), (&x, LockType::X), (&s3, LockType::S)] {
        assert_eq!(lm.acquire(txn, &r, lock_type)?, LockOutcome::Queued);
    }

    // Both leading S requests are granted; X blocks behind them and so does
    // the S queued after it
    assert_eq!(lm.release(&owner, &r)?, vec![s1.id(), s2.id()]);
    assert_single_x(&lm, &r);
    assert!(x.is_waiting() && s3.is_waiting());

    assert!(lm.release(&s1, &r)?.is_empty());
    assert_eq!(lm.release(&s2, &r)?, vec![x.id()]);
    assert_single_x(&lm, &r);
    assert!(s3.is_waiting());

    assert_eq!(lm.release(&x, &r)?, vec![s3.id()]);
    assert_eq!(lm.owners(&r).len(), 1);
    Ok(())
}

#[test]
fn test_compatible_request_granted_despite_queue() -> Result<()> {
    let (tm, lm) = setup();
    let r = Resource::table("R");
    let a = tm.begin();
    let b = tm.begin();
    let c = tm.begin();

    lm.acquire(&a, &r, LockType::S)?;
    assert_eq!(lm.acquire(&b, &r, LockType::X)?, LockOutcome::Queued);
    // Checked against the owners only, so it does not wait behind b
    assert_eq!(lm.acquire(&c, &r, LockType::IS)?, LockOutcome::Granted);

    // c still owns R, so b keeps waiting
    assert!(lm.release(&a, &r)?.is_empty());
    assert!(b.is_waiting());

    // Only the queued X is woken once the last owner leaves
    assert_eq!(lm.release(&c, &r)?, vec![b.id()]);
    assert_single_x(&lm, &r);
    assert!(lm.holds(&b, &r, LockType::X));
    Ok(())
}

#[test]
fn test_queue_waits_until_owners_gone() -> Result<()> {
    let (tm, lm) = setup();
    let r = Resource::table("R");
    let a = tm.begin();
    let b = tm.begin();
    let c = tm.begin();

    lm.acquire(&a, &r, LockType::S)?;
    lm.acquire(&b, &r, LockType::IS)?;
    assert_eq!(lm.acquire(&c, &r, LockType::IX)?, LockOutcome::Queued);

    assert!(lm.release(&a, &r)?.is_empty());
    assert_eq!(c.status(), TransactionStatus::Waiting);
    assert!(!lm.holds(&c, &r, LockType::IX));

    assert_eq!(lm.release(&b, &r)?, vec![c.id()]);
    assert_eq!(c.status(), TransactionStatus::Running);
    Ok(())
}

#[test]
fn test_protocol_violations() -> Result<()> {
    let (tm, lm) = setup();
    let t = Resource::table("T");
    let page = Resource::page("T", 1);
    let a = tm.begin();

    lm.acquire(&a, &t, LockType::IX)?;
    assert!(matches!(lm.acquire(&a, &t, LockType::IX), Err(LockError::AlreadyHeld { .. })));
    assert!(matches!(lm.acquire(&a, &t, LockType::IS), Err(LockError::IllegalDowngrade { .. })));
    assert!(matches!(lm.acquire(&a, &page, LockType::IS), Err(LockError::IntentLockOnPage { .. })));

    lm.acquire(&a, &page, LockType::X)?;
    assert!(matches!(lm.release(&a, &t), Err(LockError::PageLocksOutstanding { .. })));

    let b = tm.begin();
    assert!(matches!(lm.release(&b, &t), Err(LockError::NotHeld { .. })));
    assert!(matches!(lm.release(&b, &Resource::table("U")), Err(LockError::NoOwners(_))));

    lm.release(&a, &page)?;
    lm.release(&a, &t)?;
    assert_eq!(lm.tracked_resources(), 0);
    Ok(())
}

#[test]
fn test_waiting_transaction_is_blocked() -> Result<()> {
    let (tm, lm) = setup();
    let r = Resource::table("R");
    let a = tm.begin();
    let b = tm.begin();

    lm.acquire(&a, &r, LockType::X)?;
    lm.acquire(&b, &r, LockType::X)?;
    assert!(matches!(
        lm.acquire(&b, &Resource::table("Other"), LockType::S),
        Err(LockError::TransactionBlocked(_))
    ));
    assert_eq!(lm.tracked_resources(), 1);
    Ok(())
}

#[test]
fn test_blocking_acquire_across_threads() -> Result<()> {
    let (tm, lm) = setup();
    let r = Resource::table("R");
    let writer = tm.begin();
    let reader = tm.begin();
    lm.acquire(&writer, &r, LockType::X)?;

    crossbeam::scope(|s| {
        let handle = s.spawn(|_| lm.acquire_blocking(&reader, &r, LockType::S));

        // Give the reader time to queue
        while !reader.is_waiting() {
            std::thread::yield_now();
        }
        assert_eq!(lm.waiters(&r).len(), 1);
        lm.release(&writer, &r).unwrap();

        assert_eq!(handle.join().unwrap().unwrap(), LockOutcome::Queued);
    })
    .unwrap();

    assert!(lm.holds(&reader, &r, LockType::S));
    assert!(reader.wait_timeout(Duration::from_millis(10)));
    Ok(())
}

#[test]
fn test_concurrent_writers_exclusive() -> Result<()> {
    let (tm, lm) = setup();
    let r = Resource::table("counter");
    let txns: Vec<_> = (0..8).map(|_| tm.begin()).collect();
    let inside = std::sync::atomic::AtomicUsize::new(0);

    crossbeam::scope(|s| {
        for txn in &txns {
            let lm = &lm;
            let r = &r;
            let inside = &inside;
            s.spawn(move |_| {
                lm.acquire_blocking(txn, r, LockType::X).unwrap();
                let before = inside.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                assert_eq!(before, 0, "two writers inside");
                assert_single_x(lm, r);
                std::thread::sleep(Duration::from_millis(1));
                inside.fetch_sub(1, std::sync::atomic::Ordering::SeqCst);
                lm.release(txn, r).unwrap();
            });
        }
    })
    .unwrap();

    assert_eq!(lm.tracked_resources(), 0);
    Ok(())
}
