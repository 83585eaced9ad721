use std::sync::Arc;
use anyhow::Result;

use bayundb_core::query::executor::operators::{
    collect_records, create_sort, ColumnComparator, ExternalSort,
};
use bayundb_core::query::executor::result::Record;

#[path = "../common/mod.rs"]
mod common;

use common::{create_test_store, int_at, load_keyed_table, random_keys, read_table, seeded_rng};

fn keys(records: &[Record]) -> Vec<i64> {
    records.iter().map(|r| int_at(r, 0)).collect()
}

#[test]
fn test_sort_is_ordered_permutation() -> Result<()> {
    let mut rng = seeded_rng(1234);

    for buffers in [2, 3, 4, 8] {
        let input = random_keys(&mut rng, 300, 50);
        let store = create_test_store(256, buffers)?;
        load_keyed_table(store.as_ref(), "t", &input)?;

        let sort = ExternalSort::new(Arc::clone(&store), "t", Arc::new(ColumnComparator::ascending(0)))?;
        let sorted_table = sort.sort()?;
        let output = read_table(store.as_ref(), &sorted_table)?;

        let mut expected = input.clone();
        expected.sort();
        assert_eq!(keys(&output), expected, "B={}", buffers);

        // Input untouched
        assert_eq!(keys(&read_table(store.as_ref(), "t")?), input);
    }
    Ok(())
}

#[test]
fn test_sort_is_stable() -> Result<()> {
    let mut rng = seeded_rng(99);
    let input = random_keys(&mut rng, 200, 5);
    let store = create_test_store(128, 3)?;
    load_keyed_table(store.as_ref(), "t", &input)?;

    let mut op = create_sort(Arc::clone(&store), "t", "id", false)?;
    let output = collect_records(op.as_mut())?;
    assert_eq!(output.len(), input.len());
    for pair in output.windows(2) {
        let (a, b) = (&pair[0], &pair[1]);
        assert!(int_at(a, 0) < int_at(b, 0) || (int_at(a, 0) == int_at(b, 0) && int_at(a, 1) < int_at(b, 1)));
    }
    Ok(())
}

#[test]
fn test_sorting_sorted_input_is_idempotent() -> Result<()> {
    let mut rng = seeded_rng(5);
    let input = random_keys(&mut rng, 150, 30);
    let store = create_test_store(256, 3)?;
    load_keyed_table(store.as_ref(), "t", &input)?;

    let comparator = Arc::new(ColumnComparator::ascending(0));
    let once = ExternalSort::new(Arc::clone(&store), "t", comparator.clone())?.sort()?;
    let twice = ExternalSort::new(Arc::clone(&store), &once, comparator)?.sort()?;

    assert_eq!(read_table(store.as_ref(), &once)?, read_table(store.as_ref(), &twice)?);
    Ok(())
}

#[test]
fn test_descending_sort() -> Result<()> {
    let input = [3, 9, 1, 9, 4, 0, 7];
    let store = create_test_store(128, 2)?;
    load_keyed_table(store.as_ref(), "t", &input)?;

    let mut op = create_sort(Arc::clone(&store), "t", "t.id", true)?;
    assert_eq!(keys(&collect_records(op.as_mut())?), vec![9, 9, 7, 4, 3, 1, 0]);
    Ok(())
}

#[test]
fn test_empty_and_single_page_inputs() -> Result<()> {
    let store = create_test_store(4096, 3)?;
    load_keyed_table(store.as_ref(), "empty", &[])?;
    load_keyed_table(store.as_ref(), "small", &[5, 2, 8])?;

    let comparator = Arc::new(ColumnComparator::ascending(0));
    let sorted = ExternalSort::new(Arc::clone(&store), "empty", comparator.clone())?.sort()?;
    assert!(store.has_table(&sorted));
    assert_eq!(store.num_records(&sorted)?, 0);

    let sorted = ExternalSort::new(Arc::clone(&store), "small", comparator)?.sort()?;
    assert_eq!(store.num_pages("small")?, 1);
    assert_eq!(keys(&read_table(store.as_ref(), &sorted)?), vec![2, 5, 8]);
    Ok(())
}

#[test]
fn test_explicit_buffer_budgets_agree() -> Result<()> {
    let mut rng = seeded_rng(77);
    let input = random_keys(&mut rng, 120, 1000);
    let store = create_test_store(128, 10)?;
    load_keyed_table(store.as_ref(), "t", &input)?;

    let mut expected = input.clone();
    expected.sort();
    for buffers in 1..=6 {
        let sort = ExternalSort::new(Arc::clone(&store), "t", Arc::new(ColumnComparator::ascending(0)))?
            .with_buffers(buffers)?;
        let table = sort.sort()?;
        assert_eq!(keys(&read_table(store.as_ref(), &table)?), expected, "B={}", buffers);
        store.drop_table(&table)?;
    }

    let sort = ExternalSort::new(Arc::clone(&store), "t", Arc::new(ColumnComparator::ascending(0)))?;
    assert!(sort.with_buffers(0).is_err());
    Ok(())
}
