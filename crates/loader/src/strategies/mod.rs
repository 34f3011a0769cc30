//! The three ingestion strategies behind the [`LoadStrategy`] trait.
//!
//! - [`StreamCopy`]: one COPY FROM STDIN stream, one transaction
//! - [`BatchedUpsert`]: multi-row upserts, one transaction per batch
//! - [`ParallelUpsert`]: batched upserts across a bounded connection pool
//!
//! [`LoadStrategy`]: crate::strategy::LoadStrategy

mod batched;
mod parallel;
mod stream_copy;

pub use batched::{BatchedUpsert, DEFAULT_BATCH_SIZE};
pub use parallel::{DEFAULT_CHUNK_SIZE, MAX_WORKERS, ParallelUpsert};
pub use stream_copy::StreamCopy;

use crate::types::Rating;
use postgres::GenericClient;
use store::TableName;

/// Upsert one batch of deduplicated rows with a single multi-row statement.
///
/// The rows arrive as three parallel arrays through UNNEST, so the
/// statement takes three parameters regardless of batch size. The batch
/// must not contain two rows with the same `(userid, itemid)` key;
/// `ON CONFLICT DO UPDATE` rejects a second hit on one key within a
/// statement. Callers run [`crate::types::dedupe_last_wins`] first.
pub(crate) fn upsert_batch<C: GenericClient>(
    client: &mut C,
    table: &TableName,
    rows: &[Rating],
) -> Result<u64, postgres::Error> {
    let mut users: Vec<i32> = Vec::with_capacity(rows.len());
    let mut items: Vec<i32> = Vec::with_capacity(rows.len());
    let mut values: Vec<f64> = Vec::with_capacity(rows.len());
    for row in rows {
        users.push(row.user_id);
        items.push(row.item_id);
        values.push(row.rating);
    }

    let statement = format!(
        "INSERT INTO {table} (userid, itemid, rating) \
         SELECT * FROM UNNEST($1::int4[], $2::int4[], $3::float8[]) AS t(userid, itemid, rating) \
         ON CONFLICT (userid, itemid) DO UPDATE SET rating = EXCLUDED.rating"
    );
    client.execute(statement.as_str(), &[&users, &items, &values])
}
