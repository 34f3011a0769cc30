//! Parser for ratings source files.
//!
//! Format: one record per line, fields separated by `::`:
//!
//! ```text
//! userId::itemId::rating::timestamp
//! ```
//!
//! Only the first three fields matter; anything after them (the
//! timestamp, in the MovieLens files) is ignored. A line that cannot
//! produce a valid triple is a *skip*, not an error; the hot ingestion
//! loop never unwinds per line, it just counts what it dropped.

use crate::types::Rating;

/// Field separator of the source format.
pub const FIELD_DELIMITER: &str = "::";

/// Parse one source line into a rating, or signal a skip.
///
/// Returns `None` when fewer than three fields are present or any of the
/// first three fields fails to parse as its numeric type. The caller is
/// responsible for counting and logging skips.
pub fn parse_line(line: &str) -> Option<Rating> {
    let mut fields = line.trim().split(FIELD_DELIMITER);

    let user_id = fields.next()?.parse().ok()?;
    let item_id = fields.next()?.parse().ok()?;
    let rating = fields.next()?.parse().ok()?;

    Some(Rating {
        user_id,
        item_id,
        rating,
    })
}
