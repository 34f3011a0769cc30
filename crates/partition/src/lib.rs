//! # Partition Crate
//!
//! This crate reorganizes the primary ratings table into N shard tables
//! and routes ongoing single-record inserts to the correct shard.
//!
//! ## Main Components
//!
//! - **range**: value-based partitioning: N contiguous rating bins
//!   computed from the observed min/max, plus the `range_insert` router
//! - **round_robin**: position-based partitioning: rows distributed by
//!   dense rank mod N, plus the cursor-driven `round_robin_insert` router
//! - **error**: Error types for partition building and routing
//!
//! Both schemes keep the primary table authoritative: every routed insert
//! writes the primary table and the destination shard in one transaction,
//! so the two can never diverge on a committed record.
//!
//! ## Example Usage
//!
//! ```ignore
//! use partition::{build_round_robin_partitions, round_robin_insert};
//! use store::TableName;
//!
//! let table = TableName::new("ratings")?;
//! let counts = build_round_robin_partitions(&table, 3, &mut client)?;
//! println!("rows per shard: {counts:?}");
//!
//! // Later inserts continue the cursor sequence atomically.
//! let shard = round_robin_insert(&table, 8, 8, 4.5, &mut client)?;
//! println!("routed to rrobin_part{shard}");
//! ```

pub mod error;
pub mod range;
pub mod round_robin;

pub use error::{PartitionError, Result};
pub use range::{RangeMetadata, build_range_partitions, range_insert};
pub use round_robin::{RoundRobinCursor, build_round_robin_partitions, round_robin_insert};

use postgres::Transaction;
use store::TableName;

/// Shard tables share the primary table's schema and key convention:
/// `(userid, itemid)` is the upsert key everywhere, so the same record
/// never appears twice in one table under either scheme.
pub(crate) fn create_shard_table(
    transaction: &mut Transaction<'_>,
    table: &TableName,
) -> std::result::Result<(), postgres::Error> {
    transaction.batch_execute(&format!(
        "DROP TABLE IF EXISTS {table};
         CREATE TABLE {table} (
             userid INT NOT NULL,
             itemid INT NOT NULL,
             rating DOUBLE PRECISION NOT NULL,
             PRIMARY KEY (userid, itemid)
         )"
    ))
}

/// Upsert one record into `table` within the caller's transaction.
pub(crate) fn upsert_row(
    transaction: &mut Transaction<'_>,
    table: &TableName,
    user_id: i32,
    item_id: i32,
    rating: f64,
) -> std::result::Result<(), postgres::Error> {
    let statement = format!(
        "INSERT INTO {table} (userid, itemid, rating) VALUES ($1, $2, $3) \
         ON CONFLICT (userid, itemid) DO UPDATE SET rating = EXCLUDED.rating"
    );
    transaction
        .execute(statement.as_str(), &[&user_id, &item_id, &rating])
        .map(|_| ())
}
