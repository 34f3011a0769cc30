//! Validated table identifiers and shard-table handles.
//!
//! Shard tables follow fixed naming patterns (`range_part{i}`,
//! `rrobin_part{i}`) and metadata lives in two dedicated single-row
//! tables. The handles here are built once per partition set and handed
//! around as values, so no other module ever formats a table name into
//! SQL on its own.

use crate::error::{Result, StoreError};
use std::fmt;

/// Prefix for range shard tables: `range_part0`, `range_part1`, ...
pub const RANGE_SHARD_PREFIX: &str = "range_part";

/// Prefix for round-robin shard tables: `rrobin_part0`, `rrobin_part1`, ...
pub const RROBIN_SHARD_PREFIX: &str = "rrobin_part";

/// Table holding the `{min, max, partitions}` record for range routing.
pub const RANGE_METADATA_TABLE: &str = "range_metadata";

/// Table holding the `{next_index, partitions}` cursor for round-robin routing.
pub const RROBIN_METADATA_TABLE: &str = "rrobin_metadata";

// Postgres truncates identifiers beyond this; reject instead of truncating.
const MAX_IDENT_LEN: usize = 63;

/// A table name that has been checked to be a plain SQL identifier.
///
/// Accepts lowercase ASCII letters, digits and underscores, not starting
/// with a digit. That covers every table this system creates and keeps
/// caller-supplied primary-table names out of injection territory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableName(String);

impl TableName {
    pub fn new(name: &str) -> Result<Self> {
        if name.is_empty() {
            return Err(StoreError::InvalidTableName {
                name: name.to_string(),
                reason: "empty name",
            });
        }
        if name.len() > MAX_IDENT_LEN {
            return Err(StoreError::InvalidTableName {
                name: name.to_string(),
                reason: "longer than 63 bytes",
            });
        }
        match name.chars().next() {
            Some(first) if first.is_ascii_lowercase() || first == '_' => {}
            _ => {
                return Err(StoreError::InvalidTableName {
                    name: name.to_string(),
                    reason: "must start with a lowercase letter or underscore",
                });
            }
        }
        if !name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        {
            return Err(StoreError::InvalidTableName {
                name: name.to_string(),
                reason: "only lowercase letters, digits and underscores allowed",
            });
        }
        Ok(TableName(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for TableName {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self> {
        TableName::new(s)
    }
}

/// The closed set of shard-table handles for one partition set.
///
/// Built once per operation from a prefix and a partition count; indexing
/// past the end is an error rather than a silently formatted new name.
#[derive(Debug, Clone)]
pub struct ShardSet {
    names: Vec<TableName>,
}

impl ShardSet {
    fn with_prefix(prefix: &str, partitions: usize) -> Self {
        let names = (0..partitions)
            .map(|i| TableName(format!("{prefix}{i}")))
            .collect();
        ShardSet { names }
    }

    /// Handles for `range_part0..range_part{n-1}`.
    pub fn range(partitions: usize) -> Self {
        Self::with_prefix(RANGE_SHARD_PREFIX, partitions)
    }

    /// Handles for `rrobin_part0..rrobin_part{n-1}`.
    pub fn round_robin(partitions: usize) -> Self {
        Self::with_prefix(RROBIN_SHARD_PREFIX, partitions)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// The handle for shard `index`.
    pub fn shard(&self, index: usize) -> Result<&TableName> {
        self.names
            .get(index)
            .ok_or(StoreError::ShardIndexOutOfRange {
                index,
                partitions: self.names.len(),
            })
    }

    /// Iterate handles in shard order.
    pub fn iter(&self) -> impl Iterator<Item = &TableName> {
        self.names.iter()
    }
}
