//! Comment-Harvest main entry point
//!
//! This is the command-line interface for the Comment-Harvest feed harvester.

use anyhow::Context;
use clap::Parser;
use comment_harvest::config::{load_config_with_hash, Config};
use comment_harvest::crawler::run_harvest;
use comment_harvest::output::{load_statistics, print_statistics};
use comment_harvest::storage::{
    open_checkpoint_store, open_record_sink, rewind_checkpoint, CheckpointStore,
};
use comment_harvest::{AddressingScheme, HarvestOutcome, UrlStrategy};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Comment-Harvest: a resumable comment feed harvester
///
/// Walks a paginated comment feed page by page, appends every comment not
/// seen before to a record store and checkpoints after each page, so an
/// interrupted run resumes where it stopped.
#[derive(Parser, Debug)]
#[command(name = "comment-harvest")]
#[command(version)]
#[command(about = "A resumable comment feed harvester", long_about = None)]
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

    /// Start again from page 1, keeping the comments already stored
    #[arg(long, conflicts_with_all = ["dry_run", "stats"])]
    fresh: bool,

    /// Validate config and show where the harvest would start without fetching
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show statistics from the checkpoint and record store and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if cli.dry_run {
        handle_dry_run(&config)
    } else if cli.stats {
        handle_stats(&config)
    } else {
        handle_harvest(config, cli.fresh).await
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("comment_harvest=info,warn"),
            1 => EnvFilter::new("comment_harvest=debug,info"),
            2 => EnvFilter::new("comment_harvest=trace,debug"),
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

/// Handles the --dry-run mode: shows settings and the resume point
fn handle_dry_run(config: &Config) -> anyhow::Result<()> {
    let checkpoint = open_checkpoint_store(&config.output)
        .load()
        .context("failed to read checkpoint")?;
    let strategy = UrlStrategy::new(config.feed.base_url.clone());
    let first_page = checkpoint.resume_page();

    println!("=== Comment-Harvest Dry Run ===\n");

    println!("Feed:");
    println!("  Base URL: {}", config.feed.base_url);
    println!("  URL mode: {}", config.feed.url_mode);
    println!("  Max pages: {}", config.feed.max_pages);
    println!("  Content marker: {}", config.feed.content_marker);

    println!("\nSession:");
    println!("  Profile: {}", config.session.profile_dir.display());
    match &config.session.fallback_profile_dir {
        Some(dir) => println!("  Fallback profile: {}", dir.display()),
        None => println!("  Fallback profile: none"),
    }
    println!("  Recycle every: {} pages", config.session.recycle_every_pages);
    println!("  Attempts per page: {}", config.fetch.max_attempts);

    println!("\nPacing:");
    println!(
        "  Delay between pages: {}-{}ms",
        config.pacing.min_delay_ms, config.pacing.max_delay_ms
    );
    println!(
        "  Long pause every {} pages for {}-{}s",
        config.pacing.long_pause_every_pages,
        config.pacing.long_pause_min_secs,
        config.pacing.long_pause_max_secs
    );
    match config.pacing.max_runtime() {
        Some(limit) => println!("  Max runtime: {:?}", limit),
        None => println!("  Max runtime: unbounded"),
    }

    println!("\nUser Agent: {}", config.user_agent.header_value());

    println!("\nOutput:");
    println!(
        "  Records: {} ({:?})",
        config.output.records_path, config.output.format
    );
    println!("  Checkpoint: {}", config.output.checkpoint_path);

    println!("\n✓ Configuration is valid");
    println!(
        "✓ Would resume at page {} ({} fingerprints known): {}",
        first_page,
        checkpoint.seen_fingerprints.len(),
        strategy.candidate(first_page, config.feed.url_mode.primary_scheme())
    );
    if config.feed.url_mode.allows_fallback() {
        println!(
            "  Fallback URL: {}",
            strategy.candidate(first_page, AddressingScheme::QueryStyle)
        );
    }

    Ok(())
}

/// Handles the --stats mode: summarizes checkpoint and record store
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    println!("Checkpoint: {}", config.output.checkpoint_path);
    println!("Records: {}\n", config.output.records_path);

    let checkpoints = open_checkpoint_store(&config.output);
    let sink = open_record_sink(&config.output);
    let stats = load_statistics(&checkpoints, sink.as_ref()).context("failed to read stores")?;

    print_statistics(&stats);
    Ok(())
}

/// Handles the main harvest operation
async fn handle_harvest(config: Config, fresh: bool) -> anyhow::Result<()> {
    if fresh {
        let mut checkpoints = open_checkpoint_store(&config.output);
        let sink = open_record_sink(&config.output);
        let carried = rewind_checkpoint(&mut checkpoints, sink.as_ref())
            .context("failed to reset checkpoint")?;
        tracing::info!(
            "Starting fresh harvest from page 1 ({} stored fingerprints kept)",
            carried
        );
    } else {
        tracing::info!("Starting harvest (resumes from checkpoint if present)");
    }

    let cancel = CancellationToken::new();
    spawn_interrupt_watchers(&config, cancel.clone());

    let outcome = run_harvest(config, cancel.clone()).await;
    cancel.cancel();

    match outcome? {
        HarvestOutcome::Completed { last_page } => {
            tracing::info!("Feed exhausted; last committed page {}", last_page)
        }
        HarvestOutcome::PageLimitReached { last_page } => {
            tracing::info!("Page limit reached; last committed page {}", last_page)
        }
        HarvestOutcome::Interrupted { last_page } => {
            tracing::info!("Stopped early; resume will start after page {}", last_page)
        }
    }
    Ok(())
}

/// Cancels `cancel` on Ctrl-C or when the configured runtime runs out
fn spawn_interrupt_watchers(config: &Config, cancel: CancellationToken) {
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                match result {
                    Ok(()) => {
                        tracing::warn!("Ctrl-C received, stopping after the current step");
                        on_signal.cancel();
                    }
                    Err(e) => tracing::warn!("Cannot listen for Ctrl-C: {}", e),
                }
            }
            _ = on_signal.cancelled() => {}
        }
    });

    if let Some(limit) = config.pacing.max_runtime() {
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(limit) => {
                    tracing::warn!("Runtime limit of {:?} reached, stopping", limit);
                    cancel.cancel();
                }
                _ = cancel.cancelled() => {}
            }
        });
    }
}
