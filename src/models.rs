//! Data models shared by the crawl pipeline.
//!
//! - [`EditionDate`]: one crawl unit (a single day's edition)
//! - [`FetchResult`]: outcome of one gated, retried fetch
//! - [`Article`]: title and body extracted from one article page
//! - [`FailureLogEntry`]: record appended to the failure log
//! - [`SaveOutcome`] / [`SkipReason`]: what the persistor did
//! - [`DateReport`] / [`RunReport`]: per-date and per-run counters

use crate::error::TransportFailure;
use chrono::{DateTime, Local, NaiveDate};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

/// A calendar date identifying one edition of the archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EditionDate(NaiveDate);

impl EditionDate {
    pub fn new(date: NaiveDate) -> Self {
        Self(date)
    }

    /// Render the date with a `strftime` pattern, e.g. `%Y%m%d` for folder names.
    pub fn format(&self, pattern: &str) -> String {
        self.0.format(pattern).to_string()
    }
}

impl From<NaiveDate> for EditionDate {
    fn from(date: NaiveDate) -> Self {
        Self(date)
    }
}

impl fmt::Display for EditionDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

/// Outcome of [`Fetcher::fetch`](crate::fetcher::Fetcher::fetch).
///
/// `Failed` holds the last attempt's failure; the failure log entry has
/// already been written by the time a caller sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchResult {
    Body(String),
    Failed(TransportFailure),
}

impl FetchResult {
    pub fn into_body(self) -> Option<String> {
        match self {
            FetchResult::Body(body) => Some(body),
            FetchResult::Failed(_) => None,
        }
    }
}

/// Text extracted from one article page.
///
/// Either field may be empty; the persistor decides what an empty title means.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Article {
    pub title: String,
    pub body: String,
}

/// A terminal fetch failure, appended to the shared failure log.
#[derive(Debug, Clone)]
pub struct FailureLogEntry {
    pub url: String,
    pub timestamp: Option<DateTime<Local>>,
    pub reason: String,
}

impl FailureLogEntry {
    pub fn new(url: &str, reason: &TransportFailure) -> Self {
        Self {
            url: url.to_string(),
            timestamp: Some(Local::now()),
            reason: reason.to_string(),
        }
    }

    /// The line written to the failure log file.
    pub fn to_line(&self) -> String {
        format!("Failed to fetch: {}\n", self.url)
    }
}

/// Why the persistor declined to write an article.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The title was empty after sanitization.
    NoTitle,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NoTitle => write!(f, "no title"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    Written(PathBuf),
    Skipped(SkipReason),
}

/// Counters for one crawled edition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DateReport {
    /// The edition date in `YYYY-MM-DD` form.
    pub date: String,
    /// `false` when the edition index could not be fetched and the date was abandoned.
    pub index_fetched: bool,
    pub layouts: usize,
    pub articles: usize,
    pub written: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Counters for a whole run over a date range.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub dates: Vec<DateReport>,
    /// `true` when a stop signal ended the run before the range was exhausted.
    pub interrupted: bool,
}

impl RunReport {
    pub fn total_written(&self) -> usize {
        self.dates.iter().map(|d| d.written).sum()
    }

    pub fn total_failed(&self) -> usize {
        self.dates.iter().map(|d| d.failed).sum()
    }

    pub fn total_skipped(&self) -> usize {
        self.dates.iter().map(|d| d.skipped).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edition_date_formatting() {
        let date = EditionDate::new(NaiveDate::from_ymd_opt(2024, 3, 7).unwrap());
        assert_eq!(date.to_string(), "2024-03-07");
        assert_eq!(date.format("%Y%m%d"), "20240307");
        assert_eq!(date.format("%Y-%m"), "2024-03");
    }

    #[test]
    fn test_fetch_result_into_body() {
        assert_eq!(
            FetchResult::Body("<html></html>".into()).into_body(),
            Some("<html></html>".to_string())
        );
        let failed = FetchResult::Failed(TransportFailure::Status(404));
        assert_eq!(failed.into_body(), None);
    }

    #[test]
    fn test_failure_log_line() {
        let entry = FailureLogEntry::new(
            "http://example.com/a.htm",
            &TransportFailure::Status(500),
        );
        assert_eq!(entry.to_line(), "Failed to fetch: http://example.com/a.htm\n");
        assert_eq!(entry.reason, "unexpected status code 500");
        assert!(entry.timestamp.is_some());
    }

    #[test]
    fn test_run_report_totals() {
        let report = RunReport {
            dates: vec![
                DateReport {
                    date: "2024-01-01".into(),
                    index_fetched: true,
                    layouts: 2,
                    articles: 5,
                    written: 3,
                    skipped: 1,
                    failed: 1,
                },
                DateReport {
                    date: "2024-01-02".into(),
                    index_fetched: false,
                    ..Default::default()
                },
            ],
            interrupted: false,
        };
        assert_eq!(report.total_written(), 3);
        assert_eq!(report.total_skipped(), 1);
        assert_eq!(report.total_failed(), 1);

        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"date\":\"2024-01-02\""));
        assert!(json.contains("\"index_fetched\":false"));
    }
}
