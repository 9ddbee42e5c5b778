//! menu-scraper command-line entry point
//!
//! `scrape` drives Chrome through a list of restaurant pages and writes the
//! import CSVs, archive and per-restaurant JSON. `convert` re-runs the export
//! from a previously written archive without touching the network.

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use menu_scraper::export::{self, ExportSummary};
use menu_scraper::targets::parse_targets;
use menu_scraper::{ChromeFetcherFactory, Config, JobRunner, ScrapeTarget, load_yaml_config};

#[derive(Parser, Debug)]
#[command(name = "menu-scraper")]
#[command(version)]
#[command(about = "Scrape restaurant menus into e-commerce import files", long_about = None)]
struct Cli {
    /// Increase logging verbosity (-v, -vv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Scrape restaurant pages and export the results
    Scrape(ScrapeArgs),
    /// Rebuild export files from a records archive
    Convert(ConvertArgs),
}

#[derive(Args, Debug)]
struct ScrapeArgs {
    /// File with one restaurant URL per line
    #[arg(value_name = "INPUT")]
    input: Option<PathBuf>,

    /// Restaurant URL to scrape; may be repeated
    #[arg(short, long = "url", value_name = "URL")]
    urls: Vec<String>,

    /// Output directory
    #[arg(short, long, value_name = "DIR")]
    output: Option<PathBuf>,

    /// YAML configuration file
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Concurrent browser sessions (1-8)
    #[arg(long)]
    workers: Option<usize>,

    /// Per-page timeout in seconds (10-120)
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Show the browser window
    #[arg(long)]
    no_headless: bool,

    /// Maximum scroll attempts per page
    #[arg(long, value_name = "N")]
    max_scroll_attempts: Option<u32>,
}

#[derive(Args, Debug)]
struct ConvertArgs {
    /// Archive written by a previous scrape
    #[arg(long, value_name = "FILE")]
    archive: PathBuf,

    /// Output directory; defaults to the archive's directory
    #[arg(short, long, value_name = "DIR")]
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose, cli.quiet);

    match cli.command {
        Command::Scrape(args) => scrape(args).await,
        Command::Convert(args) => convert(&args),
    }
}

fn setup_logging(verbose: u8, quiet: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if quiet {
            EnvFilter::new("error")
        } else {
            match verbose {
                0 => EnvFilter::new("menu_scraper=info,warn"),
                1 => EnvFilter::new("menu_scraper=debug,info"),
                _ => EnvFilter::new("menu_scraper=trace,debug"),
            }
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

async fn scrape(args: ScrapeArgs) -> Result<()> {
    let config = build_config(&args)?;
    let targets = load_targets(&args)?;

    let runner = JobRunner::new(config.clone(), Arc::new(ChromeFetcherFactory::new(&config)))?;
    let cancel = CancellationToken::new();

    let ctrl_c = {
        let cancel = cancel.clone();
        let grace = config.grace_period_secs;
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!(
                    "Interrupt received, finishing in-flight pages (grace period {}s)",
                    grace
                );
                cancel.cancel();
            }
        })
    };

    let mut events = runner.subscribe();
    let progress = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => match (&event.kind, &event.message) {
                    (Some(kind), Some(message)) => warn!(
                        "[{}/{}] {} failed ({}): {}",
                        event.completed, event.total, event.url, kind, message
                    ),
                    _ => info!("[{}/{}] {} done", event.completed, event.total, event.url),
                },
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Progress display fell behind, {} events skipped", skipped)
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    let report = runner.run(targets, cancel).await;
    ctrl_c.abort();
    // Closing the channel lets the logger drain the remaining events
    drop(runner);
    if let Err(e) = progress.await {
        warn!("Progress logger ended abnormally: {}", e);
    }

    let summary = export::write_outputs(&report.results, &config.output_directory)
        .with_context(|| {
            format!(
                "Failed to write output to {}",
                config.output_directory.display()
            )
        })?;

    print!("{}", report.summary());
    print_export(&summary);
    Ok(())
}

fn convert(args: &ConvertArgs) -> Result<()> {
    let dir = match &args.output {
        Some(dir) => dir.clone(),
        None => args
            .archive
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(".")),
    };
    let summary = export::convert_archive(&args.archive, &dir)
        .with_context(|| format!("Failed to convert archive {}", args.archive.display()))?;
    print_export(&summary);
    Ok(())
}

/// YAML file (or defaults) with command-line flags layered on top
fn build_config(args: &ScrapeArgs) -> Result<Config> {
    let mut config = load_yaml_config(args.config.as_deref())?;

    if let Some(workers) = args.workers {
        config.workers = workers;
    }
    if let Some(timeout) = args.timeout {
        config.timeout_secs = timeout;
    }
    if args.no_headless {
        config.headless = false;
    }
    if let Some(attempts) = args.max_scroll_attempts {
        config.max_scroll_attempts = attempts;
    }
    if let Some(output) = &args.output {
        config.output_directory = output.clone();
    }

    if let Err(e) = config.validate() {
        error!("Invalid configuration: {}", e);
        return Err(e.into());
    }
    Ok(config)
}

fn load_targets(args: &ScrapeArgs) -> Result<Vec<ScrapeTarget>> {
    let mut text = match &args.input {
        Some(input) => fs::read_to_string(input)
            .with_context(|| format!("Failed to read target list {}", input.display()))?,
        None => String::new(),
    };
    for url in &args.urls {
        text.push('\n');
        text.push_str(url);
    }

    if text.trim().is_empty() {
        bail!("No targets: pass an INPUT file or at least one --url");
    }

    let targets = parse_targets(&text)?;
    info!(count = targets.len(), "Targets loaded");
    Ok(targets)
}

fn print_export(summary: &ExportSummary) {
    println!(
        "Wrote {} item rows for {} restaurants ({} failures summarized)",
        summary.item_rows, summary.restaurants, summary.failures
    );
    for file in &summary.files {
        println!("  {}", file.display());
    }
}
