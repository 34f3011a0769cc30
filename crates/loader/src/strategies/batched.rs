//! Single-connection batched-upsert strategy.
//!
//! Accumulates parsed triples into fixed-size batches and issues one
//! multi-row upsert per batch, committing each batch in its own
//! transaction. A mid-file failure therefore loses only the uncommitted
//! tail batch; everything committed before it stays loaded.

use crate::error::Result;
use crate::parser::parse_line;
use crate::strategies::upsert_batch;
use crate::strategy::LoadStrategy;
use crate::types::{Rating, dedupe_last_wins};
use postgres::Client;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use store::TableName;
use tracing::{debug, error, warn};

/// Batch size tuned so one statement stays a few tens of thousands of rows.
pub const DEFAULT_BATCH_SIZE: usize = 20_000;

pub struct BatchedUpsert {
    batch_size: usize,
}

impl BatchedUpsert {
    pub fn new(batch_size: usize) -> Self {
        BatchedUpsert { batch_size }
    }

    /// Upsert one batch in its own transaction.
    ///
    /// Returns how many source records the batch carried, or `None` if
    /// the batch's transaction failed and was rolled back. The load
    /// continues either way; the caller only aggregates.
    fn flush(&self, table: &TableName, client: &mut Client, batch: Vec<Rating>) -> Option<u64> {
        let records = batch.len() as u64;
        let rows = dedupe_last_wins(batch);

        let result = client.transaction().and_then(|mut transaction| {
            upsert_batch(&mut transaction, table, &rows)?;
            transaction.commit()
        });

        match result {
            Ok(()) => Some(records),
            Err(err) => {
                error!("batch of {records} records failed and was rolled back: {err}");
                None
            }
        }
    }
}

impl Default for BatchedUpsert {
    fn default() -> Self {
        BatchedUpsert::new(DEFAULT_BATCH_SIZE)
    }
}

impl LoadStrategy for BatchedUpsert {
    fn name(&self) -> &'static str {
        "batched-upsert"
    }

    fn load(&self, table: &TableName, path: &Path, client: &mut Client) -> Result<u64> {
        let reader = BufReader::new(File::open(path)?);

        let mut batch: Vec<Rating> = Vec::with_capacity(self.batch_size);
        let mut loaded: u64 = 0;
        let mut skipped: u64 = 0;
        let mut failed_batches: u64 = 0;

        for line in reader.lines() {
            let line = line?;
            match parse_line(&line) {
                Some(rating) => batch.push(rating),
                None => {
                    skipped += 1;
                    continue;
                }
            }
            if batch.len() >= self.batch_size {
                match self.flush(table, client, std::mem::take(&mut batch)) {
                    Some(records) => loaded += records,
                    None => failed_batches += 1,
                }
                batch.reserve(self.batch_size);
            }
        }
        if !batch.is_empty() {
            match self.flush(table, client, batch) {
                Some(records) => loaded += records,
                None => failed_batches += 1,
            }
        }

        if skipped > 0 {
            warn!("skipped {skipped} malformed lines during batched upsert");
        }
        if failed_batches > 0 {
            warn!("{failed_batches} batches failed; {loaded} records committed");
        }
        debug!("batched upsert committed {loaded} records into {table}");
        Ok(loaded)
    }
}
