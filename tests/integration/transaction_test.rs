use std::sync::Arc;
use anyhow::Result;

use bayundb_core::query::executor::operators::{collect_records, create_join, EquiJoin, JoinStrategy};
use bayundb_core::transaction::{
    LockError, LockManager, LockOutcome, LockType, Resource, TransactionManager, TransactionStatus,
};

#[path = "../common/mod.rs"]
mod common;

use common::{create_test_store, load_keyed_table};

#[test]
fn test_commit_releases_and_wakes_waiters() -> Result<()> {
    let tm = TransactionManager::new(Arc::new(LockManager::new()));
    let lm = Arc::clone(tm.lock_manager());
    let table = Resource::table("accounts");
    let page = Resource::page("accounts", 4);

    let writer = tm.begin();
    lm.acquire(&writer, &table, LockType::IX)?;
    lm.acquire(&writer, &page, LockType::X)?;

    let reader = tm.begin();
    assert_eq!(lm.acquire(&reader, &table, LockType::S)?, LockOutcome::Queued);

    let woken = tm.commit(writer.id())?;
    assert_eq!(woken, vec![reader.id()]);
    assert_eq!(writer.status(), TransactionStatus::Committed);
    assert!(lm.locks_held_by(writer.id()).is_empty());
    assert_eq!(lm.locks_held_by(reader.id()), vec![(table.clone(), LockType::S)]);
    assert!(!tm.transaction_exists(writer.id()));
    Ok(())
}

#[test]
fn test_abort_drops_queued_request() -> Result<()> {
    let tm = TransactionManager::new(Arc::new(LockManager::new()));
    let lm = Arc::clone(tm.lock_manager());
    let r = Resource::table("R");

    let a = tm.begin();
    let b = tm.begin();
    let c = tm.begin();
    lm.acquire(&a, &r, LockType::S)?;
    lm.acquire(&b, &r, LockType::X)?;
    lm.acquire(&c, &r, LockType::S)?;

    // b cannot commit while waiting, but it can abort
    assert!(matches!(tm.commit(b.id()), Err(LockError::InvalidState(_, TransactionStatus::Waiting))));
    // a still owns R, so dropping b's request wakes nobody
    assert!(tm.abort(b.id())?.is_empty());
    assert_eq!(b.status(), TransactionStatus::Aborted);
    assert_eq!(lm.waiters(&r).len(), 1);

    // c is granted once a leaves
    assert_eq!(tm.commit(a.id())?, vec![c.id()]);
    assert!(lm.holds(&c, &r, LockType::S));

    assert!(matches!(tm.commit(a.id()), Err(LockError::TransactionNotFound(_))));
    assert_eq!(tm.get_active_transaction_ids(), vec![c.id()]);
    Ok(())
}

#[test]
fn test_locked_join_under_transaction() -> Result<()> {
    let store = create_test_store(256, 3)?;
    load_keyed_table(store.as_ref(), "l", &[1, 2, 3])?;
    load_keyed_table(store.as_ref(), "r", &[3, 3, 1])?;

    let tm = TransactionManager::new(Arc::new(LockManager::new()));
    let lm = Arc::clone(tm.lock_manager());
    let reader = tm.begin();
    let writer = tm.begin();

    // The reader locks every page of both inputs under table intent locks
    for table in ["l", "r"] {
        lm.acquire(&reader, &Resource::table(table), LockType::IS)?;
        for page_id in 0..store.num_pages(table)? {
            lm.acquire(&reader, &Resource::page(table, page_id as u32), LockType::S)?;
        }
    }

    // A writer may take IX on the table but not X on a locked page
    assert_eq!(lm.acquire(&writer, &Resource::table("l"), LockType::IX)?, LockOutcome::Granted);
    assert_eq!(lm.acquire(&writer, &Resource::page("l", 0), LockType::X)?, LockOutcome::Queued);

    let join = EquiJoin::new(Arc::clone(&store), "l", "r", "id", "id")?;
    let mut op = create_join(JoinStrategy::SortMerge, join)?;
    assert_eq!(collect_records(op.as_mut())?.len(), 3);

    assert_eq!(tm.commit(reader.id())?, vec![writer.id()]);
    assert!(lm.holds(&writer, &Resource::page("l", 0), LockType::X));
    tm.commit(writer.id())?;
    assert_eq!(lm.tracked_resources(), 0);
    Ok(())
}
