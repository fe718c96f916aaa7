//! Command-line interface definitions.
//!
//! Every tuning knob of [`CrawlConfig`] can also be set from a YAML file
//! (`--config`); flags given here win over the file.

use crate::config::{CrawlConfig, Site};
use chrono::NaiveDate;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

/// Command-line arguments.
///
/// # Examples
///
/// ```sh
/// # Every third day of April 2023 from People's Daily
/// archive_crawler --start 2023-04-11 --end 2023-04-30 --step-days 3
///
/// # One week of Xinhua Daily, gentler on the server
/// archive_crawler --site xinhua-daily --start 2024-10-11 --end 2024-10-17 --concurrency 2
///
/// # Settings from a file, writing a JSON summary
/// archive_crawler --config crawl.yaml --start 2024-01-01 --end 2024-01-31 --report run.json
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// First edition date to crawl (YYYY-MM-DD)
    #[arg(short, long)]
    pub start: NaiveDate,

    /// Last edition date to crawl, inclusive (YYYY-MM-DD)
    #[arg(short, long)]
    pub end: NaiveDate,

    /// Days to advance between crawled editions
    #[arg(long, default_value_t = 1)]
    pub step_days: u64,

    /// Archive to crawl [default: peoples-daily]
    #[arg(long, value_enum)]
    pub site: Option<Site>,

    /// Optional path to a YAML config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Directory that receives one folder per edition date
    #[arg(short, long)]
    pub archive_root: Option<PathBuf>,

    /// File that failed URLs are appended to
    #[arg(long)]
    pub log_path: Option<PathBuf>,

    /// Maximum number of simultaneous requests
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Attempts per URL before it is logged as failed
    #[arg(long)]
    pub max_attempts: Option<usize>,

    /// Seconds to wait between attempts
    #[arg(long)]
    pub retry_delay_secs: Option<u64>,

    /// Seconds to wait between two edition dates
    #[arg(long)]
    pub date_pause_secs: Option<u64>,

    /// Per-request timeout in seconds
    #[arg(long)]
    pub request_timeout_secs: Option<u64>,

    /// Write a JSON summary of the run to this file
    #[arg(long)]
    pub report: Option<PathBuf>,
}

impl Cli {
    /// Overlay the flags that were given onto `config`.
    pub fn apply_overrides(&self, config: &mut CrawlConfig) {
        if let Some(v) = &self.archive_root {
            config.archive_root = v.clone();
        }
        if let Some(v) = &self.log_path {
            config.log_path = v.clone();
        }
        if let Some(v) = self.concurrency {
            config.concurrency = v;
        }
        if let Some(v) = self.max_attempts {
            config.max_attempts = v;
        }
        if let Some(v) = self.retry_delay_secs {
            config.retry_delay = Duration::from_secs(v);
        }
        if let Some(v) = self.date_pause_secs {
            config.date_pause = Duration::from_secs(v);
        }
        if let Some(v) = self.request_timeout_secs {
            config.request_timeout = Duration::from_secs(v);
        }
    }
}
