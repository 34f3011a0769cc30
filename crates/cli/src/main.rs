use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use colored::Colorize;
use partition::{
    build_range_partitions, build_round_robin_partitions, range_insert, round_robin_insert,
};
use postgres::Config;
use std::path::PathBuf;
use std::time::Instant;
use store::TableName;

/// ratings-shard - Partitioned ratings store
#[derive(Parser)]
#[command(name = "ratings-shard")]
#[command(about = "Bulk-load a ratings file and shard it by range or round-robin", long_about = None)]
struct Cli {
    /// Connection string (falls back to the DATABASE_URL environment variable)
    #[arg(long)]
    dsn: Option<String>,

    /// Primary ratings table
    #[arg(long, default_value = "ratings")]
    table: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Bulk-load a ratings file into the primary table
    Load {
        /// Path to the ratings file (userId::itemId::rating::timestamp)
        path: PathBuf,
    },

    /// Split the primary table into N shards by rating range
    RangePartition {
        /// Number of shards to create
        #[arg(long, default_value = "5")]
        partitions: usize,
    },

    /// Split the primary table into N shards round-robin
    RrobinPartition {
        /// Number of shards to create
        #[arg(long, default_value = "3")]
        partitions: usize,
    },

    /// Insert one record, routed by the stored range boundaries
    RangeInsert {
        #[arg(long)]
        user_id: i32,
        #[arg(long)]
        item_id: i32,
        #[arg(long)]
        rating: f64,
    },

    /// Insert one record, routed by the round-robin cursor
    RrobinInsert {
        #[arg(long)]
        user_id: i32,
        #[arg(long)]
        item_id: i32,
        #[arg(long)]
        rating: f64,
    },
}

fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let dsn = match cli.dsn {
        Some(dsn) => dsn,
        None => std::env::var("DATABASE_URL")
            .map_err(|_| anyhow!("no connection string: pass --dsn or set DATABASE_URL"))?,
    };
    let config: Config = dsn.parse().context("Failed to parse connection string")?;

    let table = TableName::new(&cli.table).context("Invalid primary table name")?;

    let mut client = store::connect(&config).context("Failed to connect to database")?;
    println!("{} Connected to database", "✓".green());

    match cli.command {
        Commands::Load { path } => handle_load(&table, &path, &mut client, &config)?,
        Commands::RangePartition { partitions } => {
            let start = Instant::now();
            let counts = build_range_partitions(&table, partitions, &mut client)?;
            println!(
                "{} Built {} range shards in {:?}",
                "✓".green(),
                partitions,
                start.elapsed()
            );
            print_shard_counts("range_part", &counts);
        }
        Commands::RrobinPartition { partitions } => {
            let start = Instant::now();
            let counts = build_round_robin_partitions(&table, partitions, &mut client)?;
            println!(
                "{} Built {} round-robin shards in {:?}",
                "✓".green(),
                partitions,
                start.elapsed()
            );
            print_shard_counts("rrobin_part", &counts);
        }
        Commands::RangeInsert {
            user_id,
            item_id,
            rating,
        } => {
            let shard = range_insert(&table, user_id, item_id, rating, &mut client)?;
            println!(
                "{} ({user_id}, {item_id}, {rating}) -> range_part{shard}",
                "✓".green()
            );
        }
        Commands::RrobinInsert {
            user_id,
            item_id,
            rating,
        } => {
            let shard = round_robin_insert(&table, user_id, item_id, rating, &mut client)?;
            println!(
                "{} ({user_id}, {item_id}, {rating}) -> rrobin_part{shard}",
                "✓".green()
            );
        }
    }

    Ok(())
}

/// Handle the 'load' command
fn handle_load(
    table: &TableName,
    path: &PathBuf,
    client: &mut postgres::Client,
    config: &Config,
) -> Result<()> {
    println!("Loading ratings from {}...", path.display());
    let start = Instant::now();
    let loaded = loader::load_ratings(table, path, client, Some(config))
        .context("Failed to load ratings file")?;
    println!(
        "{} Loaded {} records into {} in {:?}",
        "✓".green(),
        loaded,
        table,
        start.elapsed()
    );
    Ok(())
}

/// Print per-shard row counts so undercounting is visible immediately
fn print_shard_counts(prefix: &str, counts: &[u64]) {
    for (index, count) in counts.iter().enumerate() {
        println!("  {} {}{}: {} rows", "•".cyan(), prefix, index, count);
    }
    println!("  total: {} rows", counts.iter().sum::<u64>());
}
