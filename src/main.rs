use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use pagedb::common::TableId;
use pagedb::storage::TupleIterator;
use pagedb::tuple::schema::{TupleDesc, TypeId};
use pagedb::tuple::value::Value;
use pagedb::tuple::Tuple;
use pagedb::{Database, DatabaseConfig, DbError};
use tracing::{info, warn, Level};

#[derive(Parser)]
struct WorkloadConfig {
    #[arg(long, help = "Directory where table files are stored")]
    data: PathBuf,

    #[arg(long, default_value_t = 50, help = "Size of buffer pool in pages")]
    pool_size: usize,

    #[arg(long, default_value_t = 4096, help = "Bytes per page")]
    page_size: usize,

    #[arg(long, default_value_t = 4, help = "Number of concurrent writers")]
    threads: usize,

    #[arg(long, default_value_t = 100, help = "Insert transactions per writer")]
    transactions: usize,

    #[arg(long, default_value_t = Level::INFO)]
    log_level: Level,
}

fn accounts_desc() -> TupleDesc {
    TupleDesc::named(&[
        (TypeId::Integer, "id"),
        (TypeId::Text, "owner"),
        (TypeId::Boolean, "active"),
    ])
}

/// Inserts one tuple per transaction, retrying transactions that got aborted.
/// Returns the number of aborts.
fn run_writer(database: &Database, table_id: TableId, writer: usize, transactions: usize) -> Result<usize> {
    let desc = database.catalog().tuple_desc(table_id)?;
    let mut aborts = 0;
    for i in 0..transactions {
        let id = (writer * transactions + i) as i32;
        loop {
            let transaction = database.begin();
            let mut tuple = Tuple::new(
                desc.clone(),
                vec![
                    Value::Integer(id),
                    Value::String(format!("writer-{writer}")),
                    Value::Boolean(id % 2 == 0),
                ],
            )?;
            match transaction.insert_tuple(table_id, &mut tuple) {
                Ok(()) => {
                    transaction.commit()?;
                    break;
                }
                Err(e) if DbError::is_transaction_aborted(&e) => {
                    transaction.abort()?;
                    aborts += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
    Ok(aborts)
}

fn count_tuples(database: &Database, table_id: TableId) -> Result<usize> {
    let transaction = database.begin();
    let mut iter = transaction.scan(table_id)?;
    iter.open()?;
    let mut count = 0;
    while iter.has_next()? {
        iter.next()?;
        count += 1;
    }
    iter.close();
    drop(iter);
    transaction.commit()?;
    Ok(count)
}

fn main() -> Result<()> {
    let config = WorkloadConfig::parse();
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .init();

    fs::create_dir_all(&config.data)
        .with_context(|| format!("Failed to create data directory {:?}", config.data))?;
    let path = config.data.join("accounts.dat");

    let database = Database::new(
        DatabaseConfig::default()
            .with_pool_pages(config.pool_size)
            .with_page_size(config.page_size),
    );
    let table_id = if path.exists() {
        database.open_table(&path, "accounts", accounts_desc(), "id")?
    } else {
        database.create_table(&path, "accounts", accounts_desc(), "id")?
    };
    let before = count_tuples(&database, table_id)?;

    let start = Instant::now();
    let aborts = AtomicUsize::new(0);
    thread::scope(|scope| {
        let database = &database;
        let aborts = &aborts;
        for writer in 0..config.threads {
            scope.spawn(move || match run_writer(database, table_id, writer, config.transactions) {
                Ok(count) => {
                    aborts.fetch_add(count, Ordering::Relaxed);
                }
                Err(e) => warn!("Writer {writer} failed. Cause: {e:#}"),
            });
        }
    });

    let after = count_tuples(&database, table_id)?;
    info!(
        "Inserted {} tuples in {:?} with {} aborts",
        after - before,
        start.elapsed(),
        aborts.load(Ordering::Relaxed)
    );
    println!("{after} tuples in table accounts");

    Ok(())
}
