//! Strategy selection for the bulk loader.
//!
//! Three interchangeable ingestion strategies exist (see
//! [`crate::strategies`]); which one runs is decided here, by file size
//! alone, so the policy can be tested without touching a database.

use crate::error::Result;
use postgres::Client;
use std::path::Path;
use store::TableName;

/// Sources at or above this size prefer the streaming bulk-copy path.
///
/// Below it, per-batch upsert overhead is cheap enough that the simpler
/// strategy wins; above it, COPY avoids per-row statement overhead
/// entirely.
pub const STREAM_COPY_THRESHOLD: u64 = 32 * 1024 * 1024;

/// Core trait for bulk-load strategies.
///
/// Each strategy moves every parseable record of `path` into `table` and
/// returns how many records it loaded. Malformed lines are skipped and
/// counted, never fatal.
pub trait LoadStrategy {
    /// Returns the name of this strategy (for logging)
    fn name(&self) -> &'static str;

    /// Load the source file into the primary table.
    fn load(&self, table: &TableName, path: &Path, client: &mut Client) -> Result<u64>;
}

/// Which strategy the policy picked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyKind {
    /// Single COPY FROM STDIN stream inside one transaction
    StreamCopy,
    /// Multi-row upserts in per-batch transactions on one connection
    BatchedUpsert,
    /// Independent chunk upserts on a bounded pool of connections
    ParallelUpsert,
}

/// Pick the primary strategy for a source of `source_len` bytes.
pub fn select_strategy(source_len: u64) -> StrategyKind {
    if source_len >= STREAM_COPY_THRESHOLD {
        StrategyKind::StreamCopy
    } else {
        StrategyKind::BatchedUpsert
    }
}

/// Pick the strategy to fall back to when the stream-copy path fails.
///
/// Large files go to the parallel chunked upsert when worker connections
/// can be opened; everything else lands on the single-connection batched
/// path.
pub fn fallback_strategy(source_len: u64, workers_available: bool) -> StrategyKind {
    if source_len >= STREAM_COPY_THRESHOLD && workers_available {
        StrategyKind::ParallelUpsert
    } else {
        StrategyKind::BatchedUpsert
    }
}
