mod import;
mod inspect;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use uuid::Uuid;

#[derive(Debug, Parser)]
#[command(name = "restock-cli")]
#[command(about = "restock command line interface")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Submit an import batch from a file and process it inline.
    Import {
        /// File with one entry per line: `reference[,title[,cost[,category]]]`.
        file: PathBuf,
        /// Skip identifiers already present in the catalog.
        #[arg(long)]
        skip_existing: bool,
        /// Bypass the enrichment provider's cache.
        #[arg(long)]
        skip_cache: bool,
        /// Enable fuzzy-title duplicate detection against the catalog.
        #[arg(long)]
        fuzzy: bool,
        /// Markup percentage override (e.g. 70 for a 1.70x list price).
        #[arg(long)]
        markup: Option<rust_decimal::Decimal>,
        /// Fixed pricing seed for reproducible competitor draws.
        #[arg(long)]
        seed: Option<u64>,
        /// Push upserted entries to the storefront (requires configuration).
        #[arg(long)]
        push: bool,
    },
    /// List recent import jobs.
    Jobs {
        #[arg(long, default_value_t = 20)]
        limit: i64,
    },
    /// Show one job with its full error list.
    Status { job_id: Uuid },
    /// Show today's enrichment token budget.
    Budget,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Import {
            file,
            skip_existing,
            skip_cache,
            fuzzy,
            markup,
            seed,
            push,
        } => {
            import::run_import(
                &file,
                restock_pipeline::BatchOptions {
                    skip_existing,
                    skip_cache,
                    fuzzy_dedup: fuzzy,
                    markup_percent: markup,
                    seed,
                },
                push,
            )
            .await
        }
        Commands::Jobs { limit } => inspect::list_jobs(limit).await,
        Commands::Status { job_id } => inspect::show_job(job_id).await,
        Commands::Budget => inspect::show_budget().await,
    }
}
