//! Round-robin partitioning: rows distributed by position, not value.
//!
//! The bulk build assigns every existing row a stable rank through a
//! deterministic total order (`userid, itemid, rating`) and routes rank
//! `r` to shard `r mod N`, so the same table always partitions the same
//! way regardless of scan order. Ongoing inserts are driven by a durable
//! cursor in `rrobin_metadata`: a monotonically increasing `next_index`
//! whose value mod N names the destination shard.
//!
//! The cursor is deliberately decoupled from the bulk distribution: a
//! rebuild resets it to 0 no matter how many rows were just seeded.

use crate::error::{PartitionError, Result};
use crate::{create_shard_table, upsert_row};
use postgres::error::SqlState;
use postgres::{Client, Transaction};
use store::{RROBIN_METADATA_TABLE, ShardSet, TableName};
use tracing::{info, instrument};

/// A snapshot of the durable round-robin cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundRobinCursor {
    /// Monotonically increasing insert counter; never wraps.
    pub next_index: i64,
    pub partitions: usize,
}

impl RoundRobinCursor {
    /// The shard that receives the next insert.
    pub fn shard(&self) -> usize {
        (self.next_index % self.partitions as i64) as usize
    }
}

/// Build N round-robin shards and reset the insert cursor.
///
/// Drops and recreates the `rrobin_part{i}` tables and the single-row
/// cursor record, distributes every existing primary-table row with one
/// rank-driven set-based query per shard, and leaves the cursor at 0,
/// all in a single transaction. Returns the row count per shard.
#[instrument(skip(client), fields(table = %table))]
pub fn build_round_robin_partitions(
    table: &TableName,
    partitions: usize,
    client: &mut Client,
) -> Result<Vec<u64>> {
    if partitions == 0 {
        return Err(PartitionError::InvalidPartitionCount(0));
    }

    let mut transaction = client.transaction()?;

    let shards = ShardSet::round_robin(partitions);
    for shard in shards.iter() {
        create_shard_table(&mut transaction, shard)?;
    }

    transaction.batch_execute(&format!(
        "DROP TABLE IF EXISTS {RROBIN_METADATA_TABLE};
         CREATE TABLE {RROBIN_METADATA_TABLE} (
             next_index BIGINT NOT NULL,
             partitions INT NOT NULL
         )"
    ))?;
    let seed_cursor =
        format!("INSERT INTO {RROBIN_METADATA_TABLE} (next_index, partitions) VALUES (0, $1)");
    transaction.execute(seed_cursor.as_str(), &[&(partitions as i32)])?;

    let mut counts = Vec::with_capacity(partitions);
    for (index, shard) in shards.iter().enumerate() {
        let distribute = format!(
            "INSERT INTO {shard} (userid, itemid, rating) \
             SELECT userid, itemid, rating FROM ( \
                 SELECT userid, itemid, rating, \
                        ROW_NUMBER() OVER (ORDER BY userid, itemid, rating) - 1 AS rank \
                 FROM {table} \
             ) ranked WHERE rank % $1::int8 = $2::int8"
        );
        let seeded =
            transaction.execute(distribute.as_str(), &[&(partitions as i64), &(index as i64)])?;
        counts.push(seeded);
    }

    // Seeding does not consume the cursor; bulk-assigned rows and the
    // live insert index are independent.
    let reset = format!("UPDATE {RROBIN_METADATA_TABLE} SET next_index = 0");
    transaction.execute(reset.as_str(), &[])?;

    transaction.commit()?;
    info!("built {partitions} round-robin shards; rows per shard: {counts:?}");
    Ok(counts)
}

/// Lock and read the cursor row inside the caller's transaction.
///
/// The exclusive row lock is what keeps concurrent inserts sequential:
/// two callers can never observe the same `next_index`, so no shard is
/// double-assigned or skipped.
fn lock_cursor(transaction: &mut Transaction<'_>) -> Result<RoundRobinCursor> {
    let query = format!(
        "SELECT next_index, partitions FROM {RROBIN_METADATA_TABLE} FOR UPDATE"
    );
    let row = match transaction.query_opt(query.as_str(), &[]) {
        Ok(Some(row)) => row,
        Ok(None) => {
            return Err(PartitionError::NotInitialized {
                scheme: "round-robin",
            });
        }
        Err(err) if err.code() == Some(&SqlState::UNDEFINED_TABLE) => {
            return Err(PartitionError::NotInitialized {
                scheme: "round-robin",
            });
        }
        Err(err) => return Err(err.into()),
    };

    let next_index: i64 = row.get(0);
    let partitions: i32 = row.get(1);
    if partitions <= 0 {
        return Err(PartitionError::NotInitialized {
            scheme: "round-robin",
        });
    }
    Ok(RoundRobinCursor {
        next_index,
        partitions: partitions as usize,
    })
}

/// Route one new record to the cursor's shard and advance the cursor.
///
/// The whole read-index / write-data / increment-index sequence runs
/// under one transaction holding the cursor row lock; both table writes
/// and the increment commit together or not at all. Returns the shard
/// index the record landed in.
#[instrument(skip(client), fields(table = %table))]
pub fn round_robin_insert(
    table: &TableName,
    user_id: i32,
    item_id: i32,
    rating: f64,
    client: &mut Client,
) -> Result<usize> {
    let mut transaction = client.transaction()?;

    let cursor = lock_cursor(&mut transaction)?;
    let shard_index = cursor.shard();
    let shards = ShardSet::round_robin(cursor.partitions);
    let shard = shards.shard(shard_index)?;

    upsert_row(&mut transaction, table, user_id, item_id, rating)?;
    upsert_row(&mut transaction, shard, user_id, item_id, rating)?;
    let advance = format!("UPDATE {RROBIN_METADATA_TABLE} SET next_index = $1");
    transaction.execute(advance.as_str(), &[&(cursor.next_index + 1)])?;

    transaction.commit()?;
    info!("routed ({user_id}, {item_id}, {rating}) to {shard}");
    Ok(shard_index)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_shard_cycles_through_partitions() {
        for (index, expected) in [(0, 0), (1, 1), (2, 2), (3, 0), (7, 1)] {
            let cursor = RoundRobinCursor {
                next_index: index,
                partitions: 3,
            };
            assert_eq!(cursor.shard(), expected, "index {index}");
        }
    }

    #[test]
    fn test_cursor_stays_valid_for_large_indices() {
        let cursor = RoundRobinCursor {
            next_index: i64::MAX,
            partitions: 3,
        };
        assert!(cursor.shard() < 3);
    }

    #[test]
    fn test_single_partition_always_shard_zero() {
        for index in 0..5 {
            let cursor = RoundRobinCursor {
                next_index: index,
                partitions: 1,
            };
            assert_eq!(cursor.shard(), 0);
        }
    }
}
