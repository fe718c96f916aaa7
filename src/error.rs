//! Error types for the crawl pipeline.
//!
//! Only [`CrawlError`] ever reaches `main`. The other two types describe
//! failures that are recovered locally inside the pipeline:
//!
//! - [`TransportFailure`] travels inside [`FetchResult::Failed`](crate::models::FetchResult)
//!   after the fetcher has exhausted its retries.
//! - [`ParseFailure`] is returned by the link extractor and turned into an
//!   empty link list by the orchestrator.

use thiserror::Error;

/// Fatal, run-level failures.
#[derive(Debug, Error)]
pub enum CrawlError {
    /// The YAML configuration file could not be read.
    #[error("failed to read config file {path}: {source}")]
    ConfigRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The YAML configuration file is not valid.
    #[error("invalid config file {path}: {source}")]
    ConfigParse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    /// A configuration value is out of range.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// The requested date range cannot be iterated.
    #[error("invalid date range: {0}")]
    InvalidDateRange(String),

    /// The site base URL does not parse.
    #[error("invalid base url {url}: {source}")]
    InvalidBaseUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    /// The HTTP client could not be built.
    #[error("failed to build http client: {0}")]
    Client(#[from] reqwest::Error),
}

/// A single fetch attempt that did not produce a body.
///
/// Every variant is retryable.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportFailure {
    /// The server answered with something other than `200 OK`.
    #[error("unexpected status code {0}")]
    Status(u16),

    /// Timeout, connection reset, DNS failure, body decode error.
    #[error("request failed: {0}")]
    Request(String),
}

/// Markup did not have the structure an extractor expected.
///
/// Never retried.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseFailure {
    #[error("invalid selector `{0}`")]
    InvalidSelector(String),

    /// The URL links are resolved against does not parse.
    #[error("invalid base url `{0}`")]
    InvalidBaseUrl(String),

    /// None of the configured containers exist in the document.
    #[error("no element matched {0}")]
    MissingElement(String),
}
