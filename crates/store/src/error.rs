//! Error types for the storage boundary.

use thiserror::Error;

/// Errors that can come out of the storage boundary
#[derive(Error, Debug)]
pub enum StoreError {
    /// A caller-supplied name is not a usable SQL identifier
    ///
    /// This variant carries the rejected name so the caller can report it;
    /// it is the only defense between user input and SQL text.
    #[error("invalid table name {name:?}: {reason}")]
    InvalidTableName { name: String, reason: &'static str },

    /// A shard index outside the partition set was requested
    #[error("shard index {index} out of range for {partitions} partitions")]
    ShardIndexOutOfRange { index: usize, partitions: usize },

    /// The storage engine rejected an operation
    #[error("database error: {0}")]
    Database(#[from] postgres::Error),
}

/// Convenience type alias for Results in this crate
pub type Result<T> = std::result::Result<T, StoreError>;
