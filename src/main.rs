//! Bondharvest main entry point
//!
//! This is the command-line interface for the bondharvest disclosure
//! document harvester.

use bondharvest::account::RotationController;
use bondharvest::auth::BrowserEstablisher;
use bondharvest::batch::{load_entities, BatchDriver, BatchOptions, CheckpointStore, ErrorLog, PauseFlag};
use bondharvest::config::{load_config_with_hash, Config};
use bondharvest::export::{export_all, render_statistics};
use bondharvest::fetch::{build_api_client, DocumentFetcher};
use bondharvest::storage::DocumentStore;
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use url::Url;

/// Bondharvest: bond-issuance disclosure document harvester
///
/// Bondharvest walks a configured list of bond entities, pages through
/// the portal's notice-listing API under a rotating credential pool,
/// and persists every discovered disclosure document into SQLite.
/// Interrupted runs resume from a checkpoint.
#[derive(Parser, Debug)]
#[command(name = "bondharvest")]
#[command(version = "1.0.0")]
#[command(about = "Bond disclosure document harvester", long_about = None)]
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

    /// Index of the first entity to process
    #[arg(long, value_name = "N", default_value_t = 0)]
    start: usize,

    /// Cap on entities processed this run
    #[arg(long, value_name = "N")]
    max: Option<usize>,

    /// Continue from the last checkpoint
    #[arg(long)]
    resume: bool,

    /// Re-harvest entities that already have stored documents
    #[arg(long)]
    force: bool,

    /// Process a single entity to verify login and fetching
    #[arg(long, conflicts_with_all = ["max", "resume"])]
    test: bool,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with_all = ["dry_run", "export"])]
    stats: bool,

    /// Regenerate the spreadsheet exports from existing data and exit
    #[arg(long, conflicts_with_all = ["dry_run", "stats"])]
    export: bool,

    /// Validate config and show what would run without harvesting
    #[arg(long, conflicts_with_all = ["stats", "export"])]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

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

    if cli.dry_run {
        handle_dry_run(&config)?;
    } else if cli.stats {
        handle_stats(&config)?;
    } else if cli.export {
        handle_export(&config)?;
    } else {
        handle_harvest(config, config_hash, &cli).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("bondharvest=info,warn"),
            1 => EnvFilter::new("bondharvest=debug,info"),
            2 => EnvFilter::new("bondharvest=trace,debug"),
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

/// Handles the --dry-run mode: validates config and shows what would run
fn handle_dry_run(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Bondharvest Dry Run ===\n");

    println!("Portal:");
    println!("  Base URL: {}", config.site.base_url);
    println!("  Login page: {}", config.site.login_path);
    println!("  Listing API: {}", config.site.listing_path);

    println!("\nCredential Pool ({}):", config.pool.credentials.len());
    for entry in &config.pool.credentials {
        let login = if entry.secret.is_some() {
            "automatic"
        } else {
            "manual"
        };
        println!("  - {} ({} login)", entry.handle, login);
    }
    println!("  Error threshold: {}", config.pool.error_threshold);
    println!("  Cooldown: {}s", config.pool.cooldown_secs);
    println!("  Request quota: {}", config.pool.request_quota);

    println!("\nFetch:");
    println!("  Page size: {}", config.fetch.page_size);
    println!("  Page cap: {}", config.fetch.max_pages);
    println!("  Request timeout: {}s", config.fetch.request_timeout_secs);

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);
    println!("  Exports: {}", config.output.export_dir);

    let entities = load_entities(Path::new(&config.batch.entity_list_path))?;
    println!("\nEntities ({}):", entities.len());
    for entity in entities.iter().take(10) {
        println!("  - {}", entity.short_name);
    }
    if entities.len() > 10 {
        println!("  ... and {} more", entities.len() - 10);
    }

    println!("\n✓ Configuration is valid");
    println!("✓ Would harvest {} entities", entities.len());

    Ok(())
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    println!("Database: {}\n", config.output.database_path);

    let store = DocumentStore::new(Path::new(&config.output.database_path))?;
    print!("{}", render_statistics(&store)?);

    Ok(())
}

/// Handles the --export mode: regenerates the spreadsheet views
fn handle_export(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Exporting Document Spreadsheets ===\n");
    println!("Database: {}", config.output.database_path);
    println!("Output: {}", config.output.export_dir);
    println!();

    let store = DocumentStore::new(Path::new(&config.output.database_path))?;
    let report = export_all(&store, Path::new(&config.output.export_dir))?;

    for file in &report.files {
        println!("✓ {}", file.display());
    }
    println!("✓ Exported {} documents", report.documents);

    Ok(())
}

/// Handles the main harvest operation
async fn handle_harvest(
    config: Config,
    config_hash: String,
    cli: &Cli,
) -> Result<(), Box<dyn std::error::Error>> {
    let entities = load_entities(Path::new(&config.batch.entity_list_path))?;

    let base_url = Url::parse(&config.site.base_url)?;
    let client = build_api_client(
        &config.site.user_agent,
        Duration::from_secs(config.fetch.request_timeout_secs),
    )?;
    let fetcher = DocumentFetcher::new(
        client,
        &base_url,
        &config.site.listing_path,
        config.fetch.clone(),
    )?;

    let store = DocumentStore::new(Path::new(&config.output.database_path))?;
    let pool = RotationController::from_config(&config.pool)?;

    let login_url = base_url.join(&config.site.login_path)?;
    let establisher = BrowserEstablisher::new(
        login_url.to_string(),
        Duration::from_secs(config.auth.login_timeout_secs),
        Duration::from_secs(config.auth.poll_interval_secs),
    );

    let interrupt = Arc::new(AtomicBool::new(false));
    spawn_interrupt_handler(interrupt.clone());

    let mut driver = BatchDriver::new(
        fetcher,
        store,
        pool,
        Box::new(establisher),
        CheckpointStore::new(&config.batch.checkpoint_path),
        ErrorLog::new(&config.batch.error_log_path),
        PauseFlag::new(&config.batch.pause_file_path),
        config.batch.clone(),
        config_hash,
        interrupt,
    );

    let options = if cli.test {
        tracing::info!("Test mode: processing a single entity");
        BatchOptions {
            start: cli.start,
            max: Some(1),
            resume: false,
            force: cli.force,
        }
    } else {
        BatchOptions {
            start: cli.start,
            max: cli.max,
            resume: cli.resume,
            force: cli.force,
        }
    };

    match driver.run(&entities, &options).await {
        Ok(stats) => {
            println!("\n=== Harvest Complete ===");
            println!("Processed: {}", stats.processed);
            println!("Succeeded: {}", stats.succeeded);
            println!("Failed:    {}", stats.failed);
            println!("Inserted:  {} documents", stats.inserted);
            Ok(())
        }
        Err(e) => {
            tracing::error!("Harvest halted: {}", e);
            Err(e.into())
        }
    }
}

/// First Ctrl-C requests a clean halt between entities; a second one
/// kills the process outright.
fn spawn_interrupt_handler(interrupt: Arc<AtomicBool>) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received; finishing current entity before halting");
            interrupt.store(true, Ordering::SeqCst);
        }
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::error!("Second interrupt; exiting immediately");
            std::process::exit(130);
        }
    });
}
