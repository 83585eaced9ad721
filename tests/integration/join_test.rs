use std::sync::Arc;
use anyhow::Result;

use bayundb_core::catalog::{DataType, Schema};
use bayundb_core::query::executor::operators::{
    collect_records, create_join, create_seq_scan, materialize, EquiJoin, JoinStrategy,
};
use bayundb_core::query::executor::result::{DataValue, Record};
use bayundb_core::storage::RelationStore;

#[path = "../common/mod.rs"]
mod common;

use common::{create_test_store, int_at, load_keyed_table, random_keys, reference_join, seeded_rng};

fn run_join(store: &Arc<dyn RelationStore>, strategy: JoinStrategy) -> Result<Vec<Record>> {
    let join = EquiJoin::new(Arc::clone(store), "l", "r", "id", "id")?;
    let mut op = create_join(strategy, join)?;
    let mut records = collect_records(op.as_mut())?;
    records.sort();
    Ok(records)
}

#[test]
fn test_duplicate_keys_produce_all_combinations() -> Result<()> {
    let left = [1, 1, 2];
    let right = [1, 1, 1, 2];

    for buffers in [2, 3, 5] {
        let store = create_test_store(128, buffers)?;
        load_keyed_table(store.as_ref(), "l", &left)?;
        load_keyed_table(store.as_ref(), "r", &right)?;

        for strategy in JoinStrategy::all() {
            let out = run_join(&store, strategy)?;
            assert_eq!(out.len(), 7, "{} with B={}", strategy, buffers);
            assert_eq!(out, reference_join(&left, &right));
        }
    }
    Ok(())
}

#[test]
fn test_random_inputs_match_reference() -> Result<()> {
    let mut rng = seeded_rng(42);

    for round in 0..6 {
        let left = random_keys(&mut rng, 40 + round * 13, 12);
        let right = random_keys(&mut rng, 25 + round * 7, 12);
        let expected = reference_join(&left, &right);

        for buffers in [2, 3, 4, 6] {
            let store = create_test_store(256, buffers)?;
            load_keyed_table(store.as_ref(), "l", &left)?;
            load_keyed_table(store.as_ref(), "r", &right)?;
            assert!(store.num_pages("l")? > 1);

            for strategy in JoinStrategy::all() {
                assert_eq!(
                    run_join(&store, strategy)?,
                    expected,
                    "round {} {} with B={}",
                    round,
                    strategy,
                    buffers
                );
            }
        }
    }
    Ok(())
}

#[test]
fn test_disjoint_keys_join_to_nothing() -> Result<()> {
    let store = create_test_store(128, 3)?;
    load_keyed_table(store.as_ref(), "l", &[1, 3, 5, 7])?;
    load_keyed_table(store.as_ref(), "r", &[0, 2, 4, 6, 8])?;
    for strategy in JoinStrategy::all() {
        assert!(run_join(&store, strategy)?.is_empty(), "{}", strategy);
    }
    Ok(())
}

#[test]
fn test_sort_merge_output_is_ordered_and_cleans_up() -> Result<()> {
    let mut rng = seeded_rng(7);
    let left = random_keys(&mut rng, 60, 9);
    let right = random_keys(&mut rng, 45, 9);

    let store = create_test_store(256, 3)?;
    load_keyed_table(store.as_ref(), "l", &left)?;
    load_keyed_table(store.as_ref(), "r", &right)?;

    let join = EquiJoin::new(Arc::clone(&store), "l", "r", "id", "id")?;
    let mut op = create_join(JoinStrategy::SortMerge, join)?;
    let records = collect_records(op.as_mut())?;
    assert!(records.windows(2).all(|w| int_at(&w[0], 0) <= int_at(&w[1], 0)));
    assert_eq!(records.len(), reference_join(&left, &right).len());

    // Only the base tables remain once the operator is closed
    for temp in 0..256 {
        assert!(!store.has_table(&format!("temp_{}", temp)));
    }
    Ok(())
}

#[test]
fn test_join_on_text_columns() -> Result<()> {
    let store = create_test_store(256, 3)?;
    let schema = Schema::from_pairs([("name", DataType::Text), ("n", DataType::Integer)]);
    store.create_table("a", schema.clone())?;
    store.create_table("b", schema)?;
    for (i, name) in ["ann", "bob", "cy", "bob"].iter().enumerate() {
        store.insert_record("a", Record::new(vec![DataValue::Text(name.to_string()), DataValue::Integer(i as i64)]))?;
    }
    for (i, name) in ["bob", "dee", "ann"].iter().enumerate() {
        store.insert_record("b", Record::new(vec![DataValue::Text(name.to_string()), DataValue::Integer(i as i64)]))?;
    }

    for strategy in JoinStrategy::all() {
        let join = EquiJoin::new(Arc::clone(&store), "a", "b", "a.name", "b.name")?;
        let mut op = create_join(strategy, join)?;
        assert_eq!(op.schema().column_names(), vec!["a.name", "a.n", "b.name", "b.n"]);
        let mut out = collect_records(op.as_mut())?;
        out.sort();
        let names: Vec<DataValue> = out.iter().map(|r| r.values()[0].clone()).collect();
        let expected: Vec<DataValue> = ["ann", "bob", "bob"].iter().map(|n| DataValue::Text(n.to_string())).collect();
        assert_eq!(names, expected, "{}", strategy);
    }
    Ok(())
}

#[test]
fn test_materialized_join_feeds_another_join() -> Result<()> {
    let store = create_test_store(256, 4)?;
    load_keyed_table(store.as_ref(), "l", &[1, 2, 2, 3])?;
    load_keyed_table(store.as_ref(), "r", &[2, 3, 3])?;
    load_keyed_table(store.as_ref(), "s", &[3, 2, 9])?;

    let join = EquiJoin::new(Arc::clone(&store), "l", "r", "id", "id")?;
    let mut first = create_join(JoinStrategy::BlockNestedLoop, join)?;
    let joined = materialize(store.as_ref(), first.as_mut())?;
    assert_eq!(store.num_records(&joined)?, 4);

    let mut scan = create_seq_scan(Arc::clone(&store), &joined)?;
    assert_eq!(collect_records(scan.as_mut())?.len(), 4);

    for strategy in JoinStrategy::all() {
        let join = EquiJoin::new(Arc::clone(&store), &joined, "s", "l.id", "s.id")?;
        let mut op = create_join(strategy, join)?;
        let out = collect_records(op.as_mut())?;
        // l=2 pairs twice with r=2, l=3 twice with r=3; each pairs once in s
        assert_eq!(out.len(), 4, "{}", strategy);
        assert_eq!(op.schema().len(), 6);
        assert!(out.iter().all(|r| int_at(r, 0) == int_at(r, 4)));
    }
    Ok(())
}
