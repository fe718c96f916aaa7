//! # Archive Crawler
//!
//! Crawls dated newspaper e-paper archives and saves every article as a
//! plain-text file, one folder per edition date.
//!
//! ## Usage
//!
//! ```sh
//! archive_crawler --start 2024-01-01 --end 2024-01-31
//! archive_crawler --site xinhua-daily --start 2024-10-11 --end 2024-10-27 -a ./xinhua
//! ```
//!
//! ## Architecture
//!
//! The crawl walks the archive top-down, one date at a time:
//! 1. **Index**: fetch the edition index page built from the date
//! 2. **Layouts**: discover every layout (newspaper page) of the edition
//! 3. **Articles**: discover every article listed on each layout
//! 4. **Save**: fetch each article concurrently, extract title and body,
//!    write `<archive_root>/<YYYYMMDD>/<title>.txt`
//!
//! All requests share one concurrency gate and a fixed-delay retry policy.
//! URLs that still fail are appended to a failure log and skipped.

use clap::Parser;
use std::error::Error;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod cli;
mod config;
mod content;
mod crawler;
mod dates;
mod error;
mod fetcher;
mod links;
mod models;
mod persist;

use cli::Cli;
use config::{CrawlConfig, FileConfig};
use crawler::Crawler;
use dates::DateRange;
use persist::ensure_writable_dir;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("archive_crawler starting up");

    let args = Cli::parse();
    debug!(?args, "Parsed CLI arguments");

    // ---- Resolve configuration: site defaults < config file < flags ----
    let file = match &args.config {
        Some(path) => FileConfig::load(path).await?,
        None => FileConfig::default(),
    };
    let site = args.site.or(file.site).unwrap_or_default();
    let mut config = CrawlConfig::for_site(site);
    config.apply_file(file);
    args.apply_overrides(&mut config);

    let dates = DateRange::new(args.start, args.end, args.step_days)?;
    let crawler = Crawler::from_config(&config)?;

    // Early check: ensure the archive root is writable
    if let Err(e) = ensure_writable_dir(&config.archive_root).await {
        error!(
            path = %config.archive_root.display(),
            error = %e,
            "Archive root is not writable (fix perms or choose a different path)"
        );
        return Err(e.into());
    }
    info!(
        site = %config.site.name,
        start = %args.start,
        end = %args.end,
        step_days = args.step_days,
        concurrency = config.concurrency,
        max_attempts = config.max_attempts,
        retry_delay = ?config.retry_delay,
        archive_root = %config.archive_root.display(),
        log_path = %config.log_path.display(),
        "Configuration resolved"
    );

    // ---- Ctrl-C finishes the current date, then stops ----
    let (stop_tx, stop_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received; finishing the current date before stopping");
            let _ = stop_tx.send(true);
        }
    });

    let report = crawler.run(dates, stop_rx).await;

    if let Some(path) = &args.report {
        let json = serde_json::to_string_pretty(&report)?;
        if let Err(e) = tokio::fs::write(path, json).await {
            error!(path = %path.display(), error = %e, "Failed to write run report");
            return Err(e.into());
        }
        info!(path = %path.display(), "Wrote run report");
    }

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        dates = report.dates.len(),
        written = report.total_written(),
        skipped = report.total_skipped(),
        failed = report.total_failed(),
        interrupted = report.interrupted,
        "Execution complete"
    );

    Ok(())
}
