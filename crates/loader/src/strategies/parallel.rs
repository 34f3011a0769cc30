//! Multi-connection parallel chunked-upsert strategy.
//!
//! Splits the parsed stream into fixed-size chunks and runs one
//! independent connection + transaction per chunk on a bounded rayon
//! pool. Workers share no mutable state; the storage engine serializes
//! conflicting writes internally. A chunk failure rolls back that chunk
//! only; the strategy reports an aggregate success count and leaves the
//! "is partial success acceptable" call to its caller.

use crate::error::{LoadError, Result};
use crate::parser::parse_line;
use crate::strategies::upsert_batch;
use crate::strategy::LoadStrategy;
use crate::types::{Rating, dedupe_last_wins};
use postgres::{Client, Config};
use rayon::prelude::*;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::thread;
use store::TableName;
use tracing::{debug, error, warn};

/// Rows per worker transaction.
pub const DEFAULT_CHUNK_SIZE: usize = 100_000;

/// Upper bound on concurrent connections, whatever the host offers.
pub const MAX_WORKERS: usize = 4;

pub struct ParallelUpsert {
    config: Config,
    chunk_size: usize,
}

impl ParallelUpsert {
    /// `config` is used to open one extra connection per worker; the
    /// connection passed to [`LoadStrategy::load`] is not shared across
    /// threads.
    pub fn new(config: Config) -> Self {
        ParallelUpsert {
            config,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    fn workers(&self) -> usize {
        let available = thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        available.min(MAX_WORKERS)
    }

    fn load_chunk(&self, table: &TableName, chunk: &[Rating]) -> Result<u64> {
        let mut client = store::connect(&self.config)?;
        let rows = dedupe_last_wins(chunk.to_vec());
        let mut transaction = client.transaction()?;
        upsert_batch(&mut transaction, table, &rows)?;
        transaction.commit()?;
        Ok(chunk.len() as u64)
    }
}

impl LoadStrategy for ParallelUpsert {
    fn name(&self) -> &'static str {
        "parallel-upsert"
    }

    fn load(&self, table: &TableName, path: &Path, _client: &mut Client) -> Result<u64> {
        let reader = BufReader::new(File::open(path)?);

        let mut rows: Vec<Rating> = Vec::new();
        let mut skipped: u64 = 0;
        for line in reader.lines() {
            let line = line?;
            match parse_line(&line) {
                Some(rating) => rows.push(rating),
                None => skipped += 1,
            }
        }
        if skipped > 0 {
            warn!("skipped {skipped} malformed lines during parallel upsert");
        }

        let workers = self.workers();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .build()?;
        debug!(
            "parallel upsert: {} rows in {} chunks on {workers} workers",
            rows.len(),
            rows.len().div_ceil(self.chunk_size)
        );

        let results: Vec<Result<u64>> = pool.install(|| {
            rows.par_chunks(self.chunk_size)
                .map(|chunk| self.load_chunk(table, chunk))
                .collect()
        });

        let mut loaded: u64 = 0;
        let mut failed_chunks: u64 = 0;
        for result in results {
            match result {
                Ok(records) => loaded += records,
                Err(err) => {
                    failed_chunks += 1;
                    match err {
                        // Connection-level failures are worth their own line
                        LoadError::Store(e) => error!("worker connection failed: {e}"),
                        other => error!("chunk failed and was rolled back: {other}"),
                    }
                }
            }
        }
        if failed_chunks > 0 {
            warn!("{failed_chunks} chunks failed; {loaded} records committed");
        }
        Ok(loaded)
    }
}
