//! Post-load index maintenance for the primary table.

use crate::error::Result;
use postgres::Client;
use store::TableName;
use tracing::{debug, warn};

/// Rebuild the supporting `(rating)` index after a bulk load.
///
/// Tries `CREATE INDEX CONCURRENTLY` first so concurrent readers of the
/// primary table are not stalled. A failed concurrent build leaves an
/// INVALID index behind, so on failure the leftover is dropped and the
/// build degrades to a plain blocking `CREATE INDEX`.
pub fn rebuild_rating_index(table: &TableName, client: &mut Client) -> Result<()> {
    let index = format!("{table}_rating_idx");

    client.batch_execute(&format!("DROP INDEX IF EXISTS {index}"))?;

    let concurrent = format!("CREATE INDEX CONCURRENTLY {index} ON {table} (rating)");
    if let Err(err) = client.batch_execute(&concurrent) {
        warn!("concurrent index build failed ({err}); retrying as blocking build");
        client.batch_execute(&format!("DROP INDEX IF EXISTS {index}"))?;
        client.batch_execute(&format!("CREATE INDEX {index} ON {table} (rating)"))?;
    }

    debug!("rating index {index} rebuilt");
    Ok(())
}
