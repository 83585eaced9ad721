// Materialization
//
// Writes the output of any operator to a temp table, so that it can be fed
// to the table-based join and sort operators.

use log::debug;

use crate::query::executor::operators::Operator;
use crate::query::executor::result::QueryResult;
use crate::storage::RelationStore;

/// Drain `op` into a new temp table and return the table's name
pub fn materialize(store: &dyn RelationStore, op: &mut dyn Operator) -> QueryResult<String> {
    let table_name = store.create_temp_table(op.schema().clone())?;

    op.init()?;
    let mut count = 0usize;
    while let Some(record) = op.next()? {
        store.insert_record(&table_name, record)?;
        count += 1;
    }
    op.close()?;

    debug!("materialized {} records into '{}'", count, table_name);
    Ok(table_name)
}
