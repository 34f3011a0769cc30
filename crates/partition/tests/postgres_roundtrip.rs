//! Integration tests for the load -> partition -> insert flow.
//!
//! These need a live Postgres instance and are skipped unless
//! `DATABASE_URL` is set, e.g.:
//!
//! ```text
//! DATABASE_URL="host=localhost user=postgres dbname=ratings_test" cargo test -p partition
//! ```
//!
//! The partition metadata tables are process-global in the database, so
//! the tests serialize on one lock instead of racing each other.

use loader::load_ratings;
use partition::{
    PartitionError, build_range_partitions, build_round_robin_partitions, range_insert,
    round_robin_insert,
};
use postgres::{Client, NoTls};
use std::io::Write;
use std::sync::Mutex;
use store::TableName;
use tempfile::NamedTempFile;

static DB_LOCK: Mutex<()> = Mutex::new(());

fn test_client() -> Option<Client> {
    let dsn = match std::env::var("DATABASE_URL") {
        Ok(dsn) => dsn,
        Err(_) => {
            eprintln!("skipping: DATABASE_URL not set");
            return None;
        }
    };
    Some(Client::connect(&dsn, NoTls).expect("failed to connect to test database"))
}

fn write_source(lines: &[&str]) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("failed to create temp file");
    for line in lines {
        writeln!(file, "{line}").unwrap();
    }
    file.flush().unwrap();
    file
}

fn row_count(client: &mut Client, table: &str) -> i64 {
    let query = format!("SELECT COUNT(*) FROM {table}");
    client.query_one(query.as_str(), &[]).unwrap().get(0)
}

#[test]
fn test_load_applies_last_occurrence_of_duplicate_keys() {
    let Some(mut client) = test_client() else {
        return;
    };
    let _guard = DB_LOCK.lock().unwrap_or_else(|e| e.into_inner());

    let table = TableName::new("ratings_it_load").unwrap();
    let source = write_source(&[
        "1::10::3.0::978300000",
        "2::20::4.0::978300001",
        "not a rating line",
        "1::10::5.0::978300002",
    ]);

    let loaded = load_ratings(&table, source.path(), &mut client, None).unwrap();
    assert_eq!(loaded, 3, "malformed line skipped, valid records counted");

    assert_eq!(row_count(&mut client, table.as_str()), 2);
    let rating: f64 = client
        .query_one(
            "SELECT rating FROM ratings_it_load WHERE userid = 1 AND itemid = 10",
            &[],
        )
        .unwrap()
        .get(0);
    assert_eq!(rating, 5.0, "last occurrence in file order wins");
}

#[test]
fn test_round_robin_distribution_and_cursor() {
    let Some(mut client) = test_client() else {
        return;
    };
    let _guard = DB_LOCK.lock().unwrap_or_else(|e| e.into_inner());

    let table = TableName::new("ratings_it_rrobin").unwrap();
    let source = write_source(&[
        "1::1::1.0::0",
        "2::2::2.0::0",
        "3::3::3.0::0",
        "4::4::4.0::0",
        "5::5::5.0::0",
        "6::6::3.5::0",
        "7::7::2.5::0",
    ]);
    load_ratings(&table, source.path(), &mut client, None).unwrap();

    let counts = build_round_robin_partitions(&table, 3, &mut client).unwrap();

    // 7 rows over 3 shards: sizes {3, 2, 2} and nothing lost.
    assert_eq!(counts.iter().sum::<u64>(), 7);
    let mut sorted = counts.clone();
    sorted.sort_unstable();
    assert_eq!(sorted, vec![2, 2, 3]);

    let next_index: i64 = client
        .query_one("SELECT next_index FROM rrobin_metadata", &[])
        .unwrap()
        .get(0);
    assert_eq!(next_index, 0, "bulk distribution resets the cursor");

    // The next insert consumes cursor 0, then the cursor advances.
    let shard = round_robin_insert(&table, 8, 8, 4.5, &mut client).unwrap();
    assert_eq!(shard, 0);
    assert_eq!(row_count(&mut client, "rrobin_part0"), counts[0] as i64 + 1);
    assert_eq!(row_count(&mut client, table.as_str()), 8);

    let next_index: i64 = client
        .query_one("SELECT next_index FROM rrobin_metadata", &[])
        .unwrap()
        .get(0);
    assert_eq!(next_index, 1);

    // A run of inserts cycles 1, 2, 0, ...
    assert_eq!(round_robin_insert(&table, 9, 9, 1.5, &mut client).unwrap(), 1);
    assert_eq!(round_robin_insert(&table, 10, 10, 2.0, &mut client).unwrap(), 2);
    assert_eq!(round_robin_insert(&table, 11, 11, 3.0, &mut client).unwrap(), 0);
}

#[test]
fn test_range_partitions_union_and_boundary_rules() {
    let Some(mut client) = test_client() else {
        return;
    };
    let _guard = DB_LOCK.lock().unwrap_or_else(|e| e.into_inner());

    let table = TableName::new("ratings_it_range").unwrap();
    let source = write_source(&[
        "1::1::1.0::0",
        "2::2::2.0::0",
        "3::3::3.0::0",
        "4::4::4.0::0",
        "5::5::5.0::0",
    ]);
    load_ratings(&table, source.path(), &mut client, None).unwrap();

    let counts = build_range_partitions(&table, 5, &mut client).unwrap();

    // min=1.0, max=5.0, width=0.8: one rating per bin, and the max
    // rating must land in the closed last bin rather than be dropped.
    assert_eq!(counts, vec![1, 1, 1, 1, 1]);
    let max_owner: i32 = client
        .query_one("SELECT userid FROM range_part4 WHERE rating = 5.0", &[])
        .unwrap()
        .get(0);
    assert_eq!(max_owner, 5);

    let union: u64 = counts.iter().sum();
    assert_eq!(union as i64, row_count(&mut client, table.as_str()));

    // Routed inserts use the stored boundaries, clamping out-of-range
    // ratings to the edge bins.
    assert_eq!(range_insert(&table, 9, 9, 0.5, &mut client).unwrap(), 0);
    assert_eq!(range_insert(&table, 10, 10, 9.0, &mut client).unwrap(), 4);
    assert_eq!(range_insert(&table, 11, 11, 4.5, &mut client).unwrap(), 4);
    assert_eq!(range_insert(&table, 12, 12, 2.5, &mut client).unwrap(), 1);
    assert_eq!(row_count(&mut client, table.as_str()), 9);

    // Re-inserting a key updates the primary table in place.
    range_insert(&table, 12, 12, 2.7, &mut client).unwrap();
    assert_eq!(row_count(&mut client, table.as_str()), 9);
    let rating: f64 = client
        .query_one(
            "SELECT rating FROM ratings_it_range WHERE userid = 12 AND itemid = 12",
            &[],
        )
        .unwrap()
        .get(0);
    assert_eq!(rating, 2.7);
}

#[test]
fn test_concurrent_round_robin_inserts_stay_sequential() {
    let dsn = match std::env::var("DATABASE_URL") {
        Ok(dsn) => dsn,
        Err(_) => {
            eprintln!("skipping: DATABASE_URL not set");
            return;
        }
    };
    let mut client = Client::connect(&dsn, NoTls).expect("failed to connect to test database");
    let _guard = DB_LOCK.lock().unwrap_or_else(|e| e.into_inner());

    let table = TableName::new("ratings_it_concurrent").unwrap();
    let source = write_source(&["1::1::1.0::0", "2::2::2.0::0", "3::3::3.0::0"]);
    load_ratings(&table, source.path(), &mut client, None).unwrap();
    let counts = build_round_robin_partitions(&table, 3, &mut client).unwrap();
    assert_eq!(counts, vec![1, 1, 1]);

    // Twelve writers, each on its own connection, each inserting one
    // distinct key. The cursor row is locked per insert, so the twelve
    // transactions consume cursor values 0..12 with no gaps and no
    // double-assignments, whatever order they win the lock in.
    const WRITERS: i32 = 12;
    let mut handles = Vec::new();
    for worker in 0..WRITERS {
        let dsn = dsn.clone();
        handles.push(std::thread::spawn(move || {
            let mut client = Client::connect(&dsn, NoTls).expect("worker failed to connect");
            let table = TableName::new("ratings_it_concurrent").unwrap();
            round_robin_insert(&table, 100 + worker, 100 + worker, 2.5, &mut client).unwrap()
        }));
    }
    let mut shards: Vec<_> = handles
        .into_iter()
        .map(|handle| handle.join().unwrap())
        .collect();
    shards.sort_unstable();

    // 12 consumed cursor values mod 3 shards: exactly four assignments each.
    assert_eq!(shards, vec![0, 0, 0, 0, 1, 1, 1, 1, 2, 2, 2, 2]);
    for index in 0..3 {
        let shard_table = format!("rrobin_part{index}");
        assert_eq!(row_count(&mut client, &shard_table), 5);
    }
    assert_eq!(row_count(&mut client, table.as_str()), 15);

    let next_index: i64 = client
        .query_one("SELECT next_index FROM rrobin_metadata", &[])
        .unwrap()
        .get(0);
    assert_eq!(next_index, i64::from(WRITERS), "one cursor step per insert");
}

#[test]
fn test_degenerate_range_build_fills_only_the_last_bin() {
    let Some(mut client) = test_client() else {
        return;
    };
    let _guard = DB_LOCK.lock().unwrap_or_else(|e| e.into_inner());

    let table = TableName::new("ratings_it_flat").unwrap();
    let source = write_source(&[
        "1::1::3.0::0",
        "2::2::3.0::0",
        "3::3::3.0::0",
        "4::4::3.0::0",
    ]);
    load_ratings(&table, source.path(), &mut client, None).unwrap();

    // min == max collapses every bin to zero width; the half-open bins
    // match nothing and the closed last bin takes the whole table.
    let counts = build_range_partitions(&table, 4, &mut client).unwrap();
    assert_eq!(counts, vec![0, 0, 0, 4]);
    assert_eq!(counts.iter().sum::<u64>() as i64, row_count(&mut client, table.as_str()));

    let bounds = client
        .query_one("SELECT min_rating, max_rating FROM range_metadata", &[])
        .unwrap();
    let min: f64 = bounds.get(0);
    let max: f64 = bounds.get(1);
    assert_eq!((min, max), (3.0, 3.0));

    // The router clamps at-or-below min to bin 0 before the max rule, so
    // the shared value routes to the first bin; only strictly greater
    // ratings take the last one.
    assert_eq!(range_insert(&table, 9, 9, 3.0, &mut client).unwrap(), 0);
    assert_eq!(range_insert(&table, 10, 10, 3.1, &mut client).unwrap(), 3);
}

#[test]
fn test_precondition_failures() {
    let Some(mut client) = test_client() else {
        return;
    };
    let _guard = DB_LOCK.lock().unwrap_or_else(|e| e.into_inner());

    let table = TableName::new("ratings_it_pre").unwrap();
    client
        .batch_execute(
            "DROP TABLE IF EXISTS ratings_it_pre;
             CREATE TABLE ratings_it_pre (
                 userid INT NOT NULL,
                 itemid INT NOT NULL,
                 rating DOUBLE PRECISION NOT NULL,
                 PRIMARY KEY (userid, itemid)
             );
             DROP TABLE IF EXISTS range_metadata;
             DROP TABLE IF EXISTS rrobin_metadata",
        )
        .unwrap();

    // Empty primary table: no bins can be derived.
    let result = build_range_partitions(&table, 3, &mut client);
    assert!(matches!(result, Err(PartitionError::EmptySource { .. })));

    // Zero partitions are rejected before any writes.
    let result = build_round_robin_partitions(&table, 0, &mut client);
    assert!(matches!(
        result,
        Err(PartitionError::InvalidPartitionCount(0))
    ));

    // Routing before any partition build fails cleanly.
    let result = range_insert(&table, 1, 1, 3.0, &mut client);
    assert!(matches!(
        result,
        Err(PartitionError::NotInitialized { scheme: "range" })
    ));
    let result = round_robin_insert(&table, 1, 1, 3.0, &mut client);
    assert!(matches!(
        result,
        Err(PartitionError::NotInitialized {
            scheme: "round-robin"
        })
    ));
    // And the failed routing attempts left no partial writes behind.
    assert_eq!(row_count(&mut client, table.as_str()), 0);
}
