//! Range partitioning: N contiguous rating bins over the observed
//! `[min, max]`.
//!
//! Bins are computed once, at partition-build time, and persisted to
//! `range_metadata`. They are *not* recomputed when later inserts move
//! the true min/max; the router always works against the boundaries
//! recorded when the shards were built.
//!
//! Boundary rule: bin `i` covers `[min + i*width, min + (i+1)*width)`,
//! half-open, except the last bin which is closed at `max` so the maximal
//! rating is never lost to a half-open gap.

use crate::error::{PartitionError, Result};
use crate::{create_shard_table, upsert_row};
use postgres::Client;
use postgres::error::SqlState;
use store::{RANGE_METADATA_TABLE, ShardSet, TableName};
use tracing::{info, instrument};

/// The `{min, max, partitions}` record captured when range shards were
/// last built. Immutable until the next full re-partition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RangeMetadata {
    pub min: f64,
    pub max: f64,
    pub partitions: usize,
}

impl RangeMetadata {
    /// Width of each bin; zero when every observed rating was identical.
    pub fn bin_width(&self) -> f64 {
        (self.max - self.min) / self.partitions as f64
    }

    /// The shard index whose bin contains `rating`.
    ///
    /// Ratings at or below the recorded min clamp to bin 0, at or above
    /// the recorded max to the last bin. Interior values floor into their
    /// half-open bin, capped at the last index against float rounding.
    pub fn shard_for(&self, rating: f64) -> usize {
        if rating <= self.min {
            0
        } else if rating >= self.max {
            self.partitions - 1
        } else {
            let bin = ((rating - self.min) / self.bin_width()) as usize;
            bin.min(self.partitions - 1)
        }
    }

    /// The `[lo, hi)` boundaries of bin `index` (`hi == max` for the last
    /// bin, which is closed).
    fn bin_bounds(&self, index: usize) -> (f64, f64) {
        let lo = self.min + index as f64 * self.bin_width();
        let hi = if index == self.partitions - 1 {
            self.max
        } else {
            self.min + (index + 1) as f64 * self.bin_width()
        };
        (lo, hi)
    }
}

/// Build N range shards from the primary table's current contents.
///
/// Reads the observed min/max rating, drops and recreates the
/// `range_part{i}` tables and the metadata record, then copies matching
/// rows into each shard with one set-based query per bin, all inside a
/// single transaction, so the router can never observe shards without
/// metadata. Returns the row count per shard.
#[instrument(skip(client), fields(table = %table))]
pub fn build_range_partitions(
    table: &TableName,
    partitions: usize,
    client: &mut Client,
) -> Result<Vec<u64>> {
    if partitions == 0 {
        return Err(PartitionError::InvalidPartitionCount(0));
    }

    let mut transaction = client.transaction()?;

    let bounds_query = format!("SELECT MIN(rating), MAX(rating) FROM {table}");
    let row = transaction.query_one(bounds_query.as_str(), &[])?;
    let min: Option<f64> = row.get(0);
    let max: Option<f64> = row.get(1);
    let (Some(min), Some(max)) = (min, max) else {
        return Err(PartitionError::EmptySource {
            table: table.to_string(),
        });
    };
    let metadata = RangeMetadata {
        min,
        max,
        partitions,
    };

    let shards = ShardSet::range(partitions);
    for shard in shards.iter() {
        create_shard_table(&mut transaction, shard)?;
    }

    transaction.batch_execute(&format!(
        "DROP TABLE IF EXISTS {RANGE_METADATA_TABLE};
         CREATE TABLE {RANGE_METADATA_TABLE} (
             min_rating DOUBLE PRECISION NOT NULL,
             max_rating DOUBLE PRECISION NOT NULL,
             partitions INT NOT NULL
         )"
    ))?;
    let persist = format!(
        "INSERT INTO {RANGE_METADATA_TABLE} (min_rating, max_rating, partitions) VALUES ($1, $2, $3)"
    );
    transaction.execute(persist.as_str(), &[&min, &max, &(partitions as i32)])?;

    let mut counts = Vec::with_capacity(partitions);
    for (index, shard) in shards.iter().enumerate() {
        let (lo, hi) = metadata.bin_bounds(index);
        let predicate = if index == partitions - 1 {
            "rating >= $1 AND rating <= $2"
        } else {
            "rating >= $1 AND rating < $2"
        };
        let copy = format!(
            "INSERT INTO {shard} (userid, itemid, rating) \
             SELECT userid, itemid, rating FROM {table} WHERE {predicate}"
        );
        let copied = transaction.execute(copy.as_str(), &[&lo, &hi])?;
        counts.push(copied);
    }

    transaction.commit()?;
    info!("built {partitions} range shards over [{min}, {max}]; rows per shard: {counts:?}");
    Ok(counts)
}

/// Read the persisted range metadata, if any partition set exists.
pub fn fetch_range_metadata(client: &mut Client) -> Result<Option<RangeMetadata>> {
    let query = format!(
        "SELECT min_rating, max_rating, partitions FROM {RANGE_METADATA_TABLE}"
    );
    let row = match client.query_opt(query.as_str(), &[]) {
        Ok(row) => row,
        // No metadata table at all: same as no partition set.
        Err(err) if err.code() == Some(&SqlState::UNDEFINED_TABLE) => return Ok(None),
        Err(err) => return Err(err.into()),
    };
    Ok(row.map(|row| {
        let partitions: i32 = row.get(2);
        RangeMetadata {
            min: row.get(0),
            max: row.get(1),
            partitions: partitions.max(0) as usize,
        }
    }))
}

/// Route one new record by the *stored* range boundaries and write it to
/// both the primary table and its shard in one transaction.
///
/// Returns the shard index the record landed in. The shard decision is a
/// pure function of immutable metadata and the rating, so no lock is
/// taken beyond the transaction itself.
#[instrument(skip(client), fields(table = %table))]
pub fn range_insert(
    table: &TableName,
    user_id: i32,
    item_id: i32,
    rating: f64,
    client: &mut Client,
) -> Result<usize> {
    let metadata = fetch_range_metadata(client)?.ok_or(PartitionError::NotInitialized {
        scheme: "range",
    })?;
    if metadata.partitions == 0 {
        return Err(PartitionError::NotInitialized { scheme: "range" });
    }

    let shard_index = metadata.shard_for(rating);
    let shards = ShardSet::range(metadata.partitions);
    let shard = shards.shard(shard_index)?;

    let mut transaction = client.transaction()?;
    upsert_row(&mut transaction, table, user_id, item_id, rating)?;
    upsert_row(&mut transaction, shard, user_id, item_id, rating)?;
    transaction.commit()?;

    info!("routed ({user_id}, {item_id}, {rating}) to {shard}");
    Ok(shard_index)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata(min: f64, max: f64, partitions: usize) -> RangeMetadata {
        RangeMetadata {
            min,
            max,
            partitions,
        }
    }

    #[test]
    fn test_bin_width() {
        assert_eq!(metadata(1.0, 5.0, 5).bin_width(), 0.8);
        assert_eq!(metadata(2.5, 2.5, 4).bin_width(), 0.0);
    }

    #[test]
    fn test_max_rating_lands_in_last_closed_bin() {
        // Ratings {1.0..5.0}, N=5: width 0.8, last bin [4.2, 5.0] closed.
        let meta = metadata(1.0, 5.0, 5);
        assert_eq!(meta.shard_for(5.0), 4);
        assert_eq!(meta.shard_for(4.2), 4);
        assert_eq!(meta.shard_for(4.19), 3);
    }

    #[test]
    fn test_interior_bins_are_half_open() {
        let meta = metadata(1.0, 5.0, 5);
        assert_eq!(meta.shard_for(1.0), 0);
        assert_eq!(meta.shard_for(1.79), 0);
        assert_eq!(meta.shard_for(1.8), 1);
        assert_eq!(meta.shard_for(2.6), 2);
        assert_eq!(meta.shard_for(3.5), 3);
    }

    #[test]
    fn test_out_of_range_ratings_clamp() {
        let meta = metadata(1.0, 5.0, 5);
        assert_eq!(meta.shard_for(0.5), 0);
        assert_eq!(meta.shard_for(-3.0), 0);
        assert_eq!(meta.shard_for(5.5), 4);
    }

    #[test]
    fn test_degenerate_all_identical_ratings() {
        // min == max: the bulk build puts every row in the last bin (all
        // half-open bins are empty); the router clamps at-or-below min to
        // bin 0 and at-or-above max to the last bin, per the stated rules.
        let meta = metadata(3.0, 3.0, 4);
        assert_eq!(meta.bin_width(), 0.0);
        assert_eq!(meta.shard_for(3.0), 0);
        assert_eq!(meta.shard_for(2.9), 0);
        assert_eq!(meta.shard_for(3.1), 3);
    }

    #[test]
    fn test_single_partition_takes_everything() {
        let meta = metadata(1.0, 5.0, 1);
        assert_eq!(meta.shard_for(0.0), 0);
        assert_eq!(meta.shard_for(3.3), 0);
        assert_eq!(meta.shard_for(9.9), 0);
    }

    #[test]
    fn test_bin_bounds_cover_range_without_gaps() {
        let meta = metadata(1.0, 5.0, 5);
        for index in 0..4 {
            let (_, hi) = meta.bin_bounds(index);
            let (next_lo, _) = meta.bin_bounds(index + 1);
            assert_eq!(hi, next_lo);
        }
        let (last_lo, last_hi) = meta.bin_bounds(4);
        assert!(last_lo < last_hi);
        assert_eq!(last_hi, 5.0);
    }
}
