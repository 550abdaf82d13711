//! Search-Harvest main entry point
//!
//! This is the command-line interface for the Search-Harvest batch crawler.

use chrono::Utc;
use clap::Parser;
use search_harvest::config::{load_config_with_hash, Config};
use search_harvest::crawler::{BatchCrawler, CrawlPlan, CrawlSession, SessionOptions, WorkItem};
use search_harvest::input::load_work_items;
use search_harvest::output::{print_statistics, write_results_csv, RunStatistics};
use search_harvest::ExtractionPattern;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Number of search URLs shown by --dry-run
const DRY_RUN_PREVIEW: usize = 5;

/// Search-Harvest: batch-driven web discovery
///
/// Search-Harvest queries a search endpoint for every key in a work-item
/// file, records the status of each search, extracts the target link from
/// each result page, and archives the linked pages.
#[derive(Parser, Debug)]
#[command(name = "search-harvest")]
#[command(version = "1.0.0")]
#[command(about = "Batch search, extract and archive", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Path to the work-item file (`key,identifier` per line)
    #[arg(value_name = "ITEMS")]
    items: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and items and show what would be requested
    #[arg(long)]
    dry_run: bool,

    /// Do not archive linked pages even if an archive directory is configured
    #[arg(long)]
    no_archive: bool,

    /// Override the number of parallel workers
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u32).range(1..=64))]
    concurrency: Option<u32>,

    /// Override the results CSV path
    #[arg(short, long, value_name = "PATH")]
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let config = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            cfg
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    let items = match load_work_items(&cli.items) {
        Ok(items) => items,
        Err(e) => {
            tracing::error!("Failed to load work items: {}", e);
            return Err(e.into());
        }
    };

    let mut plan = CrawlPlan::from_config(&config);
    if let Some(concurrency) = cli.concurrency {
        plan.concurrency = concurrency as usize;
    }

    let results_path = cli
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(&config.output.results_path));
    let archive_dir = if cli.no_archive {
        None
    } else {
        config.output.archive_dir.as_ref().map(PathBuf::from)
    };

    if cli.dry_run {
        handle_dry_run(&config, &plan, &items, &results_path, archive_dir.as_deref());
        return Ok(());
    }

    handle_harvest(
        &config,
        plan,
        &items,
        &results_path,
        archive_dir.as_deref(),
    )
    .await
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("search_harvest=info,warn"),
            1 => EnvFilter::new("search_harvest=debug,info"),
            2 => EnvFilter::new("search_harvest=trace,debug"),
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

/// Handles the --dry-run mode: shows the resolved plan and first requests
fn handle_dry_run(
    config: &Config,
    plan: &CrawlPlan,
    items: &[WorkItem],
    results_path: &Path,
    archive_dir: Option<&Path>,
) {
    println!("=== Search-Harvest Dry Run ===\n");

    println!("Search:");
    println!("  Template: {}", plan.url_template);
    println!("  Placeholder: {}", plan.placeholder);
    println!("  Method: {}", if plan.use_post { "POST" } else { "GET" });
    println!("  Follow redirects: {}", plan.allow_redirects);
    if plan.use_post {
        for (name, value) in &plan.post_form {
            println!("  Form: {}={}", name, value);
        }
    }

    println!("\nFetch:");
    println!("  Max retries: {}", plan.max_retries);
    println!("  Wait between retries: {}s", plan.wait_seconds);
    println!("  Workers: {}", plan.concurrency);
    println!("  Timeout: {}s", config.fetch.timeout_seconds);

    println!("\nHeaders:");
    for (name, value) in plan.effective_headers() {
        println!("  {}: {}", name, value);
    }

    println!("\nPattern:");
    println!("  Container: <{}>", config.pattern.tag);
    for (name, value) in &config.pattern.attributes {
        println!("    {}=\"{}\"", name, value);
    }
    println!(
        "  Link: <{} {}>",
        config.pattern.link_tag, config.pattern.link_attribute
    );

    println!("\nOutput:");
    println!("  Results: {}", results_path.display());
    match archive_dir {
        Some(dir) => println!("  Archive: {}", dir.display()),
        None => println!("  Archive: disabled"),
    }

    println!("\nWork Items ({}):", items.len());
    for item in items.iter().take(DRY_RUN_PREVIEW) {
        println!("  - {} -> {}", item.identifier, plan.search_url(&item.key));
    }
    if items.len() > DRY_RUN_PREVIEW {
        println!("  ... and {} more", items.len() - DRY_RUN_PREVIEW);
    }

    println!("\n✓ Configuration is valid");
    println!("✓ Would search for {} keys", items.len());
}

/// Handles the main harvest operation
async fn handle_harvest(
    config: &Config,
    plan: CrawlPlan,
    items: &[WorkItem],
    results_path: &Path,
    archive_dir: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(dir) = archive_dir {
        std::fs::create_dir_all(dir)?;
        tracing::info!("Archiving linked pages to {}", dir.display());
    }

    let session = CrawlSession::new(&SessionOptions::from(&config.fetch))?;
    let crawler = BatchCrawler::new(&session, plan)?;
    let pattern = ExtractionPattern::from(&config.pattern);

    let started_at = Utc::now();
    let records = match crawler.harvest(items, &pattern, archive_dir).await {
        Ok(records) => records,
        Err(e) => {
            tracing::error!("Harvest failed: {}", e);
            println!("aborted: {}", e);
            return Err(e.into());
        }
    };
    let finished_at = Utc::now();

    write_results_csv(&records, results_path)?;

    let stats = RunStatistics::from_records(items.len(), &records, started_at, finished_at);
    print_statistics(&stats);

    Ok(())
}
