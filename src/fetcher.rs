//! Gated, retried page fetching.
//!
//! # Architecture
//!
//! - [`PageSource`]: one GET attempt, `Ok(body)` only on `200 OK`
//! - [`HttpSource`]: the `reqwest` implementation used in production
//! - [`Fetcher`]: wraps any [`PageSource`] with the shared concurrency gate,
//!   the fixed-delay retry loop, and the [`FailureLog`]
//!
//! # Retry Strategy
//!
//! - Up to `max_attempts` attempts per URL
//! - A fixed `retry_delay` between attempts, never after the last one
//! - No exponential growth and no jitter: the archives we crawl block
//!   clients that come back quickly
//! - The gate slot is held for the whole retry loop, so a flaky URL never
//!   lets extra requests through while it waits

use crate::config::CrawlConfig;
use crate::error::{CrawlError, TransportFailure};
use crate::models::{FailureLogEntry, FetchResult};
use reqwest::{Client, StatusCode};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, Semaphore};
use tokio::time::sleep;
use tracing::{debug, error, instrument, warn};

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// A single GET attempt.
///
/// Implementors return the body only for `200 OK`; every other outcome is a
/// [`TransportFailure`] the [`Fetcher`] may retry.
pub trait PageSource {
    async fn get(&self, url: &str) -> Result<String, TransportFailure>;
}

/// [`PageSource`] backed by a pooled `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpSource {
    client: Client,
}

impl HttpSource {
    /// Build a client with a per-request timeout, so a stuck connection is
    /// bounded by `timeout` plus the retry delays.
    pub fn new(timeout: Duration) -> Result<Self, CrawlError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self { client })
    }
}

impl PageSource for HttpSource {
    async fn get(&self, url: &str) -> Result<String, TransportFailure> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| TransportFailure::Request(e.to_string()))?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(TransportFailure::Status(status.as_u16()));
        }

        response
            .text()
            .await
            .map_err(|e| TransportFailure::Request(e.to_string()))
    }
}

/// Append-only log of URLs that exhausted their retries.
///
/// Appends are serialized through an async mutex so concurrent failures
/// never interleave within a line.
#[derive(Debug)]
pub struct FailureLog {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FailureLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn append(&self, entry: &FailureLogEntry) -> io::Result<()> {
        let _guard = self.lock.lock().await;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(entry.to_line().as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}

/// Fetches pages through a run-wide concurrency gate with fixed-delay retries.
#[derive(Debug)]
pub struct Fetcher<S> {
    source: S,
    gate: Arc<Semaphore>,
    concurrency: usize,
    max_attempts: usize,
    retry_delay: Duration,
    failure_log: FailureLog,
}

impl<S: PageSource> Fetcher<S> {
    pub fn new(source: S, config: &CrawlConfig) -> Self {
        Self::with_policy(
            source,
            config.concurrency,
            config.max_attempts,
            config.retry_delay,
            FailureLog::new(config.log_path.clone()),
        )
    }

    pub fn with_policy(
        source: S,
        concurrency: usize,
        max_attempts: usize,
        retry_delay: Duration,
        failure_log: FailureLog,
    ) -> Self {
        let concurrency = concurrency.max(1);
        Self {
            source,
            gate: Arc::new(Semaphore::new(concurrency)),
            concurrency,
            max_attempts: max_attempts.max(1),
            retry_delay,
            failure_log,
        }
    }

    /// Size of the concurrency gate.
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Fetch `url`, retrying up to the configured number of attempts.
    ///
    /// Never returns an error: after the last failed attempt the URL is
    /// appended to the failure log and [`FetchResult::Failed`] is returned.
    #[instrument(level = "info", skip(self))]
    pub async fn fetch(&self, url: &str) -> FetchResult {
        let _permit = match self.gate.acquire().await {
            Ok(permit) => permit,
            Err(_) => {
                let failure = TransportFailure::Request("fetch gate closed".into());
                self.record_failure(url, &failure).await;
                return FetchResult::Failed(failure);
            }
        };

        let total_t0 = Instant::now();
        let mut attempt = 0usize;

        loop {
            attempt += 1;
            match self.source.get(url).await {
                Ok(body) => {
                    debug!(
                        attempt,
                        bytes = body.len(),
                        elapsed_ms_total = total_t0.elapsed().as_millis(),
                        "Fetched page"
                    );
                    return FetchResult::Body(body);
                }
                Err(failure) => {
                    if attempt >= self.max_attempts {
                        error!(
                            attempt,
                            max = self.max_attempts,
                            elapsed_ms_total = total_t0.elapsed().as_millis(),
                            error = %failure,
                            "Fetch exhausted retries"
                        );
                        self.record_failure(url, &failure).await;
                        return FetchResult::Failed(failure);
                    }

                    warn!(
                        attempt,
                        max = self.max_attempts,
                        delay = ?self.retry_delay,
                        error = %failure,
                        "Fetch attempt failed; retrying after delay"
                    );
                    sleep(self.retry_delay).await;
                }
            }
        }
    }

    async fn record_failure(&self, url: &str, failure: &TransportFailure) {
        let entry = FailureLogEntry::new(url, failure);
        match self.failure_log.append(&entry).await {
            Ok(()) => debug!(
                url = %entry.url,
                reason = %entry.reason,
                timestamp = ?entry.timestamp,
                "Recorded failed URL"
            ),
            Err(e) => error!(
                %url,
                log_path = %self.failure_log.path().display(),
                error = %e,
                "Failed to append to failure log"
            ),
        }
    }
}
