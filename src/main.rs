use std::path::PathBuf;

use chrono::Local;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use revscrap::analyze::analyze_reviews;
use revscrap::categorize::Categorizer;
use revscrap::config::Config;
use revscrap::output::write_reviews;
use revscrap::pacing::PacingPolicy;
use revscrap::process::Harvester;
use revscrap::request::HttpPageFetcher;
use revscrap::store::SqliteStore;
use revscrap::{info_time, Result};

#[derive(Parser)]
#[command(name = "revscrap")]
#[command(about = "Scrape product reviews and categorize the negative ones")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Harvest the reviews of a product and save them as CSV
    Harvest {
        /// Product page URL, must contain `/dp/<product id>`
        url: String,

        /// Maximum number of reviews to collect
        #[arg(short, long)]
        max_reviews: Option<usize>,

        /// Output CSV file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Chart ratings of a review CSV and store categorized negative reviews
    Analyze {
        /// Review CSV file
        input: PathBuf,

        /// SQLite database file
        #[arg(short, long)]
        database: Option<PathBuf>,

        /// Collection the negative reviews are stored in
        #[arg(long)]
        collection: Option<String>,

        /// Output file for the ratings distribution
        #[arg(long)]
        chart: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = Config::load(cli.config.as_deref())?;
    init_logging(&config, cli.verbose);

    let start_time = Local::now();
    match cli.command {
        Commands::Harvest {
            url,
            max_reviews,
            output,
        } => {
            let max_reviews = max_reviews.unwrap_or(config.harvest.max_reviews);
            let output = output.unwrap_or_else(|| config.harvest.output_path.clone());

            let fetcher = HttpPageFetcher::new(&config.harvest)?;
            let pacing = PacingPolicy::new(config.pacing.clone());
            let harvester = Harvester::new(fetcher, pacing, config.harvest.clone())?;

            let reviews = harvester.harvest(&url, max_reviews).await?;
            write_reviews(&output, &reviews)?;
        }
        Commands::Analyze {
            input,
            database,
            collection,
            chart,
        } => {
            if let Some(database) = database {
                config.analysis.database_path = database;
            }
            if let Some(collection) = collection {
                config.analysis.collection = collection;
            }
            if let Some(chart) = chart {
                config.analysis.chart_path = chart;
            }

            let categorizer = config
                .categories
                .clone()
                .map(Categorizer::new)
                .unwrap_or_default();
            let store = SqliteStore::open(&config.analysis.database_path).await?;

            let summary = analyze_reviews(&input, &config.analysis, &categorizer, &store).await?;

            println!("\nNegative Review Categories Summary:");
            for (category, count) in &summary.categories {
                println!("{category}: {count} reviews");
            }
        }
    }
    info_time!(start_time, "Full program time:");

    Ok(())
}

fn init_logging(config: &Config, verbose: u8) {
    let default_level = match verbose {
        0 => config.logging.level.as_str(),
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
