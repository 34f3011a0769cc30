//! Error types for the partition crate.

use thiserror::Error;

/// Errors that can occur while building partitions or routing inserts
#[derive(Error, Debug)]
pub enum PartitionError {
    /// A partition count of zero (or below) was requested
    #[error("invalid partition count: {0} (must be at least 1)")]
    InvalidPartitionCount(i64),

    /// The primary table has no rows to derive range bins from
    #[error("cannot range-partition {table}: table is empty")]
    EmptySource { table: String },

    /// A single-record insert was routed before its partition set existed
    #[error("{scheme} partitions not initialized: run the partition build first")]
    NotInitialized { scheme: &'static str },

    /// The storage engine rejected an operation
    #[error("database error: {0}")]
    Database(#[from] postgres::Error),

    /// Invalid table name or shard handle
    #[error(transparent)]
    Store(#[from] store::StoreError),
}

/// Convenience type alias for Results in this crate
pub type Result<T> = std::result::Result<T, PartitionError>;
