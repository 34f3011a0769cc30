//! # Store Crate
//!
//! This crate is the boundary to the storage engine. Everything the loader
//! and the partitioners need from Postgres goes through here:
//!
//! - **connect**: open a synchronous client from a `postgres::Config`
//! - **table**: validated table identifiers and the closed enumeration of
//!   shard-table handles (`range_part{i}` / `rrobin_part{i}`)
//! - **error**: error types for the storage boundary
//!
//! Table names are the only place SQL text is built from runtime strings,
//! so they are funneled through [`TableName`] and [`ShardSet`] instead of
//! free-form interpolation at each call site.

pub mod error;
pub mod table;

pub use error::{Result, StoreError};
pub use table::{
    RANGE_METADATA_TABLE, RANGE_SHARD_PREFIX, RROBIN_METADATA_TABLE, RROBIN_SHARD_PREFIX,
    ShardSet, TableName,
};

use postgres::{Client, Config, NoTls};

/// Open a blocking client against the configured server.
///
/// All engine operations are synchronous, so this is the only connection
/// style the workspace uses. The parallel loader opens additional clients
/// from the same `Config`, one per worker.
pub fn connect(config: &Config) -> Result<Client> {
    let client = config.connect(NoTls)?;
    Ok(client)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_refused_maps_to_store_error() {
        // Nothing listens on this port; the error must surface as Database,
        // not panic.
        let config: Config = "host=127.0.0.1 port=1 user=nobody dbname=none"
            .parse()
            .unwrap();
        let result = connect(&config);
        assert!(matches!(result, Err(StoreError::Database(_))));
    }
}
