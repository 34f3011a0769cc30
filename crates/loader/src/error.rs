//! Error types for the loader crate.

use thiserror::Error;

/// Errors that can occur while bulk-loading ratings
#[derive(Error, Debug)]
pub enum LoadError {
    /// Source file could not be opened or read (fatal for the load)
    #[error("I/O error reading source file: {0}")]
    Io(#[from] std::io::Error),

    /// The storage engine failed outside any recoverable unit
    #[error("database error: {0}")]
    Database(#[from] postgres::Error),

    /// Invalid table name or shard handle
    #[error(transparent)]
    Store(#[from] store::StoreError),

    /// The parallel worker pool could not be built
    #[error("failed to build worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}

/// Convenience type alias for Results in this crate
pub type Result<T> = std::result::Result<T, LoadError>;
