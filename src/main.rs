use std::sync::Arc;
use anyhow::Result;

use bayundb_core::catalog::{DataType, Schema};
use bayundb_core::query::executor::operators::{collect_records, create_join, EquiJoin, JoinStrategy};
use bayundb_core::query::executor::result::{DataValue, Record};
use bayundb_core::storage::{HeapStorage, RelationStore, StorageConfig};
use bayundb_core::transaction::{LockManager, LockType, Resource, TransactionManager};

fn main() -> Result<()> {
    // Small pages so that the tables span several of them
    let config = StorageConfig {
        page_size: 256,
        num_buffers: 4,
    };
    let store: Arc<dyn RelationStore> = Arc::new(HeapStorage::new(config)?);

    // Two tables keyed by user id
    store.create_table(
        "users",
        Schema::from_pairs([("id", DataType::Integer), ("name", DataType::Text)]),
    )?;
    store.create_table(
        "orders",
        Schema::from_pairs([("user_id", DataType::Integer), ("amount", DataType::Integer)]),
    )?;
    for id in 0..20 {
        store.insert_record(
            "users",
            Record::new(vec![DataValue::Integer(id), DataValue::Text(format!("user{}", id))]),
        )?;
    }
    for n in 0..50 {
        store.insert_record(
            "orders",
            Record::new(vec![DataValue::Integer((n * 7) % 25), DataValue::Integer(n * 10)]),
        )?;
    }

    // Lock both tables for reading before joining them
    let tm = TransactionManager::new(Arc::new(LockManager::new()));
    let txn = tm.begin();
    for table in ["users", "orders"] {
        tm.lock_manager()
            .acquire(&txn, &Resource::table(table), LockType::S)?;
    }

    for strategy in JoinStrategy::all() {
        let join = EquiJoin::new(Arc::clone(&store), "users", "orders", "id", "user_id")?;
        let mut op = create_join(strategy, join)?;
        let records = collect_records(op.as_mut())?;
        println!("{}: {} joined records", strategy, records.len());
        if let Some(first) = records.first() {
            println!("  first: {}", first);
        }
    }

    tm.commit(txn.id())?;
    Ok(())
}
