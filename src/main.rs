//! Profesia-Harvest main entry point
//!
//! This is the command-line interface for the catalog crawler and the store harvester.

use clap::Parser;
use profesia_harvest::config::{load_config_with_hash, Config};
use profesia_harvest::crawler::{run_crawl, start_tasks};
use profesia_harvest::output::{export_dataset, format_run_summary, load_statistics, print_statistics};
use profesia_harvest::storage::SqliteSink;
use profesia_harvest::store::run_store_harvest;
use profesia_harvest::{ListingFilters, SiteProfile};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Profesia-Harvest: a route-driven scraper for a job catalog
///
/// Crawls listings, offer details, directory pages and partners of the
/// catalog into a local dataset store, or harvests every category of the
/// companion actor store.
#[derive(Parser, Debug)]
#[command(name = "profesia-harvest")]
#[command(version)]
#[command(about = "Route-driven job catalog scraper", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long, conflicts_with_all = ["stats", "export", "store"])]
    dry_run: bool,

    /// Show dataset statistics from the database and exit
    #[arg(long, conflicts_with_all = ["dry_run", "export", "store"])]
    stats: bool,

    /// Write a dataset to a JSON file and exit
    #[arg(long, num_args = 2, value_names = ["DATASET", "PATH"])]
    export: Option<Vec<String>>,

    /// Harvest the actor store instead of the job catalog
    #[arg(long, conflicts_with_all = ["dry_run", "stats", "export"])]
    store: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (cfg, hash)
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    // Handle different modes
    if cli.dry_run {
        handle_dry_run(&config)?;
    } else if cli.stats {
        handle_stats(&config)?;
    } else if let Some(args) = cli.export.as_deref() {
        handle_export(&config, &args[0], Path::new(&args[1]))?;
    } else if cli.store {
        handle_store(config, &config_hash).await?;
    } else {
        handle_crawl(config, &config_hash).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("profesia_harvest=info,warn"),
            1 => EnvFilter::new("profesia_harvest=debug,info"),
            2 => EnvFilter::new("profesia_harvest=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: validates config and shows what would be crawled
fn handle_dry_run(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Profesia-Harvest Dry Run ===\n");

    let site = SiteProfile::from_config(&config.site)?;
    println!("Site: {}", site.base_url());

    println!("\nCrawler Configuration:");
    println!("  Max concurrency: {}", config.crawler.max_concurrency);
    println!("  Max retries: {}", config.crawler.max_request_retries);
    println!(
        "  Timeouts: {}s (listings {}s)",
        config.crawler.request_timeout_secs, config.crawler.listing_timeout_secs
    );
    match config.crawler.max_requests_per_crawl {
        Some(max) => println!("  Max requests per crawl: {}", max),
        None => println!("  Max requests per crawl: unlimited"),
    }

    println!("\nInput:");
    println!("  Detailed: {}", config.input.detailed);
    println!("  Count only: {}", config.input.count_only);
    match config.input.max_entries {
        Some(max) => println!("  Max entries: {}", max),
        None => println!("  Max entries: unlimited"),
    }

    let tasks = start_tasks(config, &site)?;
    let filters = ListingFilters::from_input(&config.input);
    println!("\nStart URLs ({}):", tasks.len());
    for task in &tasks {
        println!("  - {}", task.url);
        if !filters.is_empty() {
            println!("    filtered listing: {}", filters.apply(&task.url));
        }
    }

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);
    println!("  Dataset: {}", config.output.dataset_id);
    println!("  Error reports: {}", config.output.reporting_dataset_id);

    if let Some(store) = &config.store {
        println!("\nStore:");
        println!("  Endpoint: {}", store.endpoint_url);
        if store.categories.is_empty() {
            println!("  Categories: all");
        } else {
            println!("  Categories: {}", store.categories.join(", "));
        }
    }

    println!("\n✓ Configuration is valid");
    println!("✓ Would start crawling with {} start URLs", tasks.len());

    Ok(())
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    println!("Database: {}\n", config.output.database_path);

    let sink = SqliteSink::new(Path::new(&config.output.database_path))?;
    let stats = load_statistics(&sink)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the --export mode: writes one dataset as JSON
fn handle_export(
    config: &Config,
    dataset: &str,
    path: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let sink = SqliteSink::new(Path::new(&config.output.database_path))?;
    let written = export_dataset(&sink, dataset, path)?;

    println!("✓ Exported {} items from '{}' to: {}", written, dataset, path.display());

    Ok(())
}

/// Handles the --store mode
async fn handle_store(config: Config, config_hash: &str) -> Result<(), Box<dyn std::error::Error>> {
    match run_store_harvest(config, config_hash).await {
        Ok(outcome) => {
            tracing::info!(
                "Store harvest completed: {} items from {} categories ({} facet loops failed)",
                outcome.items.len(),
                outcome.categories_selected,
                outcome.intercept.failed_facets
            );
            Ok(())
        }
        Err(e) => {
            tracing::error!("Store harvest failed: {}", e);
            Err(e.into())
        }
    }
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config, config_hash: &str) -> Result<(), Box<dyn std::error::Error>> {
    match run_crawl(config, config_hash).await {
        Ok(stats) => {
            tracing::info!("{}", format_run_summary(&stats));
            Ok(())
        }
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            Err(e.into())
        }
    }
}
