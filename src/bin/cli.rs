use std::sync::Arc;
use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use bayundb_core::catalog::{DataType, Schema};
use bayundb_core::query::executor::operators::{
    collect_records, create_join, create_sort, EquiJoin, JoinStrategy,
};
use bayundb_core::query::executor::result::{DataValue, Record};
use bayundb_core::storage::{HeapStorage, RelationStore, StorageConfig};
use bayundb_core::transaction::{LockManager, LockType, Resource, TransactionManager};

#[derive(Parser)]
#[command(author, version, about = "bnjoin - run BayunDB joins, sorts and lock scenarios")]
struct Cli {
    /// Number of page buffers available to each operator
    #[arg(short, long, default_value_t = 5)]
    buffers: usize,

    /// Page size in bytes
    #[arg(short, long, default_value_t = 8192)]
    page_size: usize,

    /// Command to execute
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Join two generated tables on their key column
    Join {
        /// Join algorithm: bnlj, pnlj, sort-merge or all
        #[arg(short, long, default_value = "all")]
        strategy: String,

        /// Left keys, comma separated; generated when omitted
        #[arg(long)]
        left: Option<String>,

        /// Right keys, comma separated; generated when omitted
        #[arg(long)]
        right: Option<String>,

        /// Rows per generated table
        #[arg(long, default_value_t = 1000)]
        rows: i64,

        /// Distinct keys in generated tables
        #[arg(long, default_value_t = 100)]
        distinct: i64,

        /// Print the joined records
        #[arg(long)]
        show: bool,
    },

    /// Externally sort a generated table
    Sort {
        /// Keys to sort, comma separated; generated when omitted
        #[arg(long)]
        values: Option<String>,

        /// Rows in the generated table
        #[arg(long, default_value_t = 1000)]
        rows: i64,

        /// Sort in descending order
        #[arg(long)]
        descending: bool,

        /// Print the sorted records
        #[arg(long)]
        show: bool,
    },

    /// Walk through the lock manager's grant, upgrade and queueing rules
    Locks,
}

fn parse_keys(list: &str) -> Result<Vec<i64>> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<i64>().with_context(|| format!("Invalid key '{}'", s)))
        .collect()
}

/// Deterministic pseudo-random keys in `0..distinct`
fn generate_keys(rows: i64, distinct: i64, salt: i64) -> Vec<i64> {
    let distinct = distinct.max(1);
    (0..rows)
        .map(|i| (i.wrapping_mul(7919).wrapping_add(salt * 104_729)).rem_euclid(distinct))
        .collect()
}

fn load_table(store: &dyn RelationStore, name: &str, keys: &[i64]) -> Result<()> {
    let schema = Schema::from_pairs([("id", DataType::Integer), ("seq", DataType::Integer)]);
    store.create_table(name, schema)?;
    let records = keys
        .iter()
        .enumerate()
        .map(|(seq, key)| Record::new(vec![DataValue::Integer(*key), DataValue::Integer(seq as i64)]))
        .collect();
    store.insert_records(name, records)?;
    Ok(())
}

fn display_records(schema: &Schema, records: &[Record]) {
    let headers = schema.column_names();
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len().max(3)).collect();
    let cells: Vec<Vec<String>> = records
        .iter()
        .map(|r| r.values().iter().map(|v| v.to_string()).collect())
        .collect();
    for row in &cells {
        for (i, cell) in row.iter().enumerate() {
            if let Some(width) = widths.get_mut(i) {
                *width = (*width).max(cell.len());
            }
        }
    }

    let separator: String = widths.iter().map(|w| format!("+{}", "-".repeat(w + 2))).collect::<String>() + "+";
    println!("{}", separator);
    for (header, width) in headers.iter().zip(&widths) {
        print!("| {:<width$} ", header, width = width);
    }
    println!("|");
    println!("{}", separator);
    for row in &cells {
        for (cell, width) in row.iter().zip(&widths) {
            print!("| {:<width$} ", cell, width = width);
        }
        println!("|");
    }
    println!("{}", separator);
    println!("({} rows)", records.len());
}

fn run_join(
    store: Arc<dyn RelationStore>,
    strategy: &str,
    left: Vec<i64>,
    right: Vec<i64>,
    show: bool,
) -> Result<()> {
    let strategies = if strategy.eq_ignore_ascii_case("all") {
        JoinStrategy::all().to_vec()
    } else {
        match strategy.parse::<JoinStrategy>() {
            Ok(s) => vec![s],
            Err(e) => bail!(e),
        }
    };

    load_table(store.as_ref(), "l", &left)?;
    load_table(store.as_ref(), "r", &right)?;
    println!(
        "left: {} rows / {} pages, right: {} rows / {} pages, B={}",
        left.len(),
        store.num_pages("l")?,
        right.len(),
        store.num_pages("r")?,
        store.num_buffers()
    );

    for strategy in strategies {
        let join = EquiJoin::new(Arc::clone(&store), "l", "r", "id", "id")?;
        let mut op = create_join(strategy, join)?;
        let start = std::time::Instant::now();
        let records = collect_records(op.as_mut())?;
        println!("{}: {} records in {:?}", strategy, records.len(), start.elapsed());
        if show {
            display_records(op.schema(), &records);
        }
    }
    Ok(())
}

fn run_sort(store: Arc<dyn RelationStore>, values: Vec<i64>, descending: bool, show: bool) -> Result<()> {
    load_table(store.as_ref(), "t", &values)?;
    let mut op = create_sort(Arc::clone(&store), "t", "id", descending)?;
    let start = std::time::Instant::now();
    let records = collect_records(op.as_mut())?;
    println!(
        "sorted {} records ({} pages, B={}) in {:?}",
        records.len(),
        store.num_pages("t")?,
        store.num_buffers(),
        start.elapsed()
    );
    if show {
        display_records(op.schema(), &records);
    }
    Ok(())
}

fn run_locks() -> Result<()> {
    let tm = TransactionManager::new(Arc::new(LockManager::new()));
    let lm = Arc::clone(tm.lock_manager());
    let table = Resource::table("T");
    let page = Resource::page("T", 0);

    let a = tm.begin();
    let b = tm.begin();
    println!("txn {} IS on {}: {:?}", a.id(), table, lm.acquire(&a, &table, LockType::IS)?);
    println!("txn {} S on {}: {:?}", a.id(), page, lm.acquire(&a, &page, LockType::S)?);
    match lm.acquire(&b, &page, LockType::S) {
        Ok(outcome) => println!("txn {} S on {} without intent: {:?}", b.id(), page, outcome),
        Err(e) => println!("txn {} S on {} without intent: rejected ({})", b.id(), page, e),
    }
    tm.commit(a.id())?;

    let c = tm.begin();
    let r = Resource::table("R");
    println!("txn {} S on {}: {:?}", c.id(), r, lm.acquire(&c, &r, LockType::S)?);
    println!("txn {} X on {}: {:?}", c.id(), r, lm.acquire(&c, &r, LockType::X)?);
    println!("txn {} S on {}: {:?}", b.id(), r, lm.acquire(&b, &r, LockType::S)?);
    println!("owners of {}: {:?}", r, lm.owners(&r));
    println!("waiters on {}: {:?}", r, lm.waiters(&r));

    let woken = lm.release(&c, &r)?;
    println!("txn {} released {}, woke {:?}", c.id(), r, woken);
    println!("owners of {}: {:?}", r, lm.owners(&r));

    tm.commit(b.id())?;
    tm.commit(c.id())?;
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = StorageConfig {
        page_size: cli.page_size,
        num_buffers: cli.buffers,
    };
    let store: Arc<dyn RelationStore> =
        Arc::new(HeapStorage::new(config).context("Failed to initialize storage")?);

    match cli.command {
        Commands::Join { strategy, left, right, rows, distinct, show } => {
            let left = match left {
                Some(list) => parse_keys(&list)?,
                None => generate_keys(rows, distinct, 1),
            };
            let right = match right {
                Some(list) => parse_keys(&list)?,
                None => generate_keys(rows, distinct, 2),
            };
            run_join(store, &strategy, left, right, show)
        }
        Commands::Sort { values, rows, descending, show } => {
            let values = match values {
                Some(list) => parse_keys(&list)?,
                None => generate_keys(rows, rows, 3),
            };
            run_sort(store, values, descending, show)
        }
        Commands::Locks => run_locks(),
    }
}
