//! # Loader Crate
//!
//! This crate handles bulk-loading ratings source files into the primary
//! table.
//!
//! ## Main Components
//!
//! - **types**: Core domain types (UserId, ItemId, Rating)
//! - **parser**: Parse `user::item::rating[::timestamp]` lines, skipping
//!   malformed ones
//! - **strategy**: The `LoadStrategy` trait and the size-based selection
//!   policy
//! - **strategies**: The three implementations: stream-copy, batched
//!   upsert, parallel chunked upsert
//! - **index**: Post-load index rebuild
//! - **error**: Error types for data loading
//!
//! ## Example Usage
//!
//! ```ignore
//! use loader::load_ratings;
//! use store::TableName;
//! use std::path::Path;
//!
//! let table = TableName::new("ratings")?;
//! let mut client = store::connect(&config)?;
//!
//! // Strategy is chosen from the file size; pass the config so large
//! // loads can open worker connections.
//! let loaded = load_ratings(&table, Path::new("data/ratings.dat"), &mut client, Some(&config))?;
//! println!("loaded {loaded} records");
//! ```

pub mod error;
pub mod index;
pub mod parser;
pub mod strategies;
pub mod strategy;
pub mod types;

pub use error::{LoadError, Result};
pub use parser::{FIELD_DELIMITER, parse_line};
pub use strategies::{BatchedUpsert, ParallelUpsert, StreamCopy};
pub use strategy::{LoadStrategy, STREAM_COPY_THRESHOLD, StrategyKind, fallback_strategy, select_strategy};
pub use types::{ItemId, Rating, UserId, dedupe_last_wins};

use postgres::{Client, Config};
use std::fs;
use std::path::Path;
use store::TableName;
use tracing::{info, instrument, warn};

/// Load a ratings source file into `table`, returning the record count.
///
/// Drops and recreates the primary table, picks an ingestion strategy
/// from the file size, runs it (falling back from stream-copy to the
/// batched path on any copy failure), and rebuilds the supporting rating
/// index afterward.
///
/// `worker_config` enables the parallel fallback for large files; with
/// `None` every fallback stays on the single passed-in connection.
#[instrument(skip(client, worker_config), fields(table = %table))]
pub fn load_ratings(
    table: &TableName,
    path: &Path,
    client: &mut Client,
    worker_config: Option<&Config>,
) -> Result<u64> {
    let source_len = fs::metadata(path)?.len();
    let kind = select_strategy(source_len);
    info!("loading {} ({source_len} bytes) via {kind:?}", path.display());
    load_ratings_with(kind, table, path, client, worker_config)
}

/// Run the load with an explicit primary strategy, bypassing the size
/// policy. Everything else (table recreation, copy-failure fallback,
/// index rebuild) behaves exactly as in [`load_ratings`]; strategies stay
/// testable independently of the selection heuristic.
#[instrument(skip(client, worker_config), fields(table = %table))]
pub fn load_ratings_with(
    kind: StrategyKind,
    table: &TableName,
    path: &Path,
    client: &mut Client,
    worker_config: Option<&Config>,
) -> Result<u64> {
    recreate_primary_table(table, client)?;

    let loaded = match kind {
        StrategyKind::StreamCopy => match StreamCopy.load(table, path, client) {
            Ok(count) => count,
            Err(err) => {
                warn!("stream copy failed ({err}); falling back to batched path");
                let source_len = fs::metadata(path)?.len();
                let fallback = fallback_strategy(source_len, worker_config.is_some());
                run_strategy(fallback, table, path, client, worker_config)?
            }
        },
        other => run_strategy(other, table, path, client, worker_config)?,
    };

    index::rebuild_rating_index(table, client)?;
    info!("loaded {loaded} records into {table}");
    Ok(loaded)
}

fn run_strategy(
    kind: StrategyKind,
    table: &TableName,
    path: &Path,
    client: &mut Client,
    worker_config: Option<&Config>,
) -> Result<u64> {
    match kind {
        StrategyKind::StreamCopy => StreamCopy.load(table, path, client),
        StrategyKind::BatchedUpsert => BatchedUpsert::default().load(table, path, client),
        StrategyKind::ParallelUpsert => match worker_config {
            Some(config) => ParallelUpsert::new(config.clone()).load(table, path, client),
            // No config to open workers from; degrade quietly.
            None => BatchedUpsert::default().load(table, path, client),
        },
    }
}

/// Drop-and-recreate the primary table with its uniqueness constraint.
///
/// Reload semantics: a `load_ratings` call always starts from an empty
/// table. The `(userid, itemid)` primary key is what the upsert paths
/// declare as their conflict target.
fn recreate_primary_table(table: &TableName, client: &mut Client) -> Result<()> {
    client.batch_execute(&format!(
        "DROP TABLE IF EXISTS {table};
         CREATE TABLE {table} (
             userid INT NOT NULL,
             itemid INT NOT NULL,
             rating DOUBLE PRECISION NOT NULL,
             PRIMARY KEY (userid, itemid)
         )"
    ))?;
    Ok(())
}
