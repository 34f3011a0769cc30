//! Core domain types for the ratings dataset.

use serde::{Deserialize, Serialize};

/// Unique identifier for a user
pub type UserId = i32;

/// Unique identifier for a rated item (a movie in the MovieLens files)
pub type ItemId = i32;

/// One `(user, item, rating)` triple from the source file.
///
/// The primary table keys on `(user_id, item_id)`; a later occurrence of
/// the same pair overwrites the rating (upsert semantics). The trailing
/// timestamp field of the source format is dropped at parse time and
/// never stored.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rating {
    pub user_id: UserId,
    pub item_id: ItemId,
    pub rating: f64,
}

impl Rating {
    pub fn new(user_id: UserId, item_id: ItemId, rating: f64) -> Self {
        Rating {
            user_id,
            item_id,
            rating,
        }
    }

    /// The upsert key of this record.
    pub fn key(&self) -> (UserId, ItemId) {
        (self.user_id, self.item_id)
    }
}

/// Collapse duplicate `(user, item)` keys within one batch, keeping the
/// rating from the last occurrence.
///
/// A multi-row `ON CONFLICT DO UPDATE` statement must not touch the same
/// key twice, so batches are deduplicated before hitting the server. Kept
/// rows stay in first-occurrence order, which is deterministic and
/// irrelevant to the final table state.
pub fn dedupe_last_wins(rows: Vec<Rating>) -> Vec<Rating> {
    use std::collections::HashMap;

    let mut out: Vec<Rating> = Vec::with_capacity(rows.len());
    let mut seen: HashMap<(UserId, ItemId), usize> = HashMap::with_capacity(rows.len());
    for row in rows {
        match seen.get(&row.key()) {
            Some(&pos) => out[pos] = row,
            None => {
                seen.insert(row.key(), out.len());
                out.push(row);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dedupe_keeps_last_rating() {
        let rows = vec![
            Rating::new(1, 10, 3.0),
            Rating::new(2, 20, 4.0),
            Rating::new(1, 10, 5.0),
        ];
        let deduped = dedupe_last_wins(rows);
        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped[0], Rating::new(1, 10, 5.0));
        assert_eq!(deduped[1], Rating::new(2, 20, 4.0));
    }

    #[test]
    fn test_dedupe_no_duplicates_is_identity() {
        let rows = vec![Rating::new(1, 1, 1.0), Rating::new(1, 2, 2.0)];
        assert_eq!(dedupe_last_wins(rows.clone()), rows);
    }

    #[test]
    fn test_same_pair_different_rating_is_duplicate() {
        // Keys compare on (user, item) only; the rating does not
        // distinguish two records.
        let rows = vec![Rating::new(7, 7, 1.0), Rating::new(7, 7, 2.0)];
        assert_eq!(dedupe_last_wins(rows), vec![Rating::new(7, 7, 2.0)]);
    }
}
