//! The crawl orchestrator.
//!
//! Each edition date goes through the same stages:
//!
//! 1. **IndexFetch**: fetch the edition index built from the date
//! 2. **LayoutDiscovery**: extract layout links from the index
//! 3. **ArticleDiscovery**: fetch every layout, extract its article links
//! 4. **ArticleFetchAndSave**: fetch, extract and save every article
//!
//! Layouts are fetched one after another, so article URLs keep layout
//! document order. Articles run through `buffer_unordered` and
//! are collected in full before the date is reported, so date *k+1* never
//! starts while date *k* still has work in flight. Every fetch, at every
//! level, goes through the one [`Fetcher`] gate.
//!
//! Nothing below this module fails a date: a missing index abandons the date,
//! a missing layout contributes no articles, and a missing or untitled
//! article is counted and skipped.

use crate::config::{CrawlConfig, SiteProfile};
use crate::content::extract_article;
use crate::error::CrawlError;
use crate::fetcher::{Fetcher, HttpSource, PageSource};
use crate::links::{extract_article_links, extract_layout_links};
use crate::models::{DateReport, EditionDate, FetchResult, RunReport, SaveOutcome};
use crate::persist::Persistor;
use futures::stream::{self, StreamExt};
use itertools::Itertools;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};

enum ArticleOutcome {
    Written,
    Skipped,
    Failed,
}

/// Crawls edition dates one at a time.
#[derive(Debug)]
pub struct Crawler<S> {
    site: SiteProfile,
    fetcher: Fetcher<S>,
    persistor: Persistor,
    date_pause: Duration,
}

impl Crawler<HttpSource> {
    /// Validate `config` and build a crawler over a real HTTP client.
    pub fn from_config(config: &CrawlConfig) -> Result<Self, CrawlError> {
        config.validate()?;
        let source = HttpSource::new(config.request_timeout)?;
        Ok(Self::new(source, config))
    }
}

impl<S: PageSource> Crawler<S> {
    pub fn new(source: S, config: &CrawlConfig) -> Self {
        Self {
            site: config.site.clone(),
            fetcher: Fetcher::new(source, config),
            persistor: Persistor::new(
                config.archive_root.clone(),
                &config.site.date_folder_format,
            ),
            date_pause: config.date_pause,
        }
    }

    /// Crawl `dates` strictly in order, pausing between consecutive dates.
    ///
    /// `stop` is checked before each date and cuts the pause short. The date
    /// in progress always runs to completion.
    #[instrument(level = "info", skip_all, fields(site = %self.site.name))]
    pub async fn run<I>(&self, dates: I, mut stop: watch::Receiver<bool>) -> RunReport
    where
        I: IntoIterator<Item = EditionDate>,
    {
        let mut report = RunReport::default();
        let mut dates = dates.into_iter().peekable();

        while let Some(date) = dates.next() {
            let stopped = *stop.borrow();
            if stopped {
                warn!(%date, "Stop requested; not starting remaining dates");
                report.interrupted = true;
                break;
            }

            report.dates.push(self.crawl_date(date).await);

            if dates.peek().is_some() && !self.date_pause.is_zero() {
                debug!(pause = ?self.date_pause, "Pausing before next date");
                tokio::select! {
                    _ = sleep(self.date_pause) => {}
                    Ok(()) = stop.changed() => {}
                }
            }
        }

        info!(
            dates = report.dates.len(),
            written = report.total_written(),
            skipped = report.total_skipped(),
            failed = report.total_failed(),
            interrupted = report.interrupted,
            "Crawl finished"
        );
        report
    }

    /// Crawl a single edition and wait for all of its work to finish.
    #[instrument(level = "info", skip_all, fields(%date))]
    pub async fn crawl_date(&self, date: EditionDate) -> DateReport {
        let mut report = DateReport {
            date: date.to_string(),
            ..Default::default()
        };

        let index_url = self.site.index_url(date);
        let index = match self.fetcher.fetch(&index_url).await {
            FetchResult::Body(body) => body,
            FetchResult::Failed(e) => {
                warn!(%index_url, error = %e, "Edition index unavailable; abandoning date");
                return report;
            }
        };
        report.index_fetched = true;

        let layouts = extract_layout_links(&index, &index_url, &self.site.layout_selectors)
            .unwrap_or_else(|e| {
                warn!(%index_url, error = %e, "No layouts found on edition index");
                Vec::new()
            });
        report.layouts = layouts.len();

        let article_urls = self.discover_articles(&layouts).await;
        report.articles = article_urls.len();

        let outcomes: Vec<ArticleOutcome> = stream::iter(article_urls.iter())
            .map(|url| self.process_article(date, url))
            .buffer_unordered(self.fetcher.concurrency())
            .collect()
            .await;

        for outcome in outcomes {
            match outcome {
                ArticleOutcome::Written => report.written += 1,
                ArticleOutcome::Skipped => report.skipped += 1,
                ArticleOutcome::Failed => report.failed += 1,
            }
        }

        info!(
            layouts = report.layouts,
            articles = report.articles,
            written = report.written,
            skipped = report.skipped,
            failed = report.failed,
            "Finished date"
        );
        report
    }

    /// Article URLs of every layout, in layout order, each listed once.
    async fn discover_articles(&self, layouts: &[String]) -> Vec<String> {
        let per_layout: Vec<Vec<String>> = stream::iter(layouts)
            .then(|layout_url| async move {
                match self.fetcher.fetch(layout_url).await {
                    FetchResult::Body(markup) => {
                        extract_article_links(&markup, layout_url, &self.site.article_link_selectors)
                            .unwrap_or_else(|e| {
                                warn!(%layout_url, error = %e, "No articles found on layout");
                                Vec::new()
                            })
                    }
                    FetchResult::Failed(e) => {
                        warn!(%layout_url, error = %e, "Layout unavailable; skipping its articles");
                        Vec::new()
                    }
                }
            })
            .collect()
            .await;

        per_layout.into_iter().flatten().unique().collect()
    }

    async fn process_article(&self, date: EditionDate, url: &str) -> ArticleOutcome {
        let Some(markup) = self.fetcher.fetch(url).await.into_body() else {
            return ArticleOutcome::Failed;
        };

        let article = extract_article(&markup, &self.site.article_selectors);
        match self.persistor.save(date, &article.title, &article.body).await {
            Ok(SaveOutcome::Written(path)) => {
                debug!(%url, path = %path.display(), "Article saved");
                ArticleOutcome::Written
            }
            Ok(SaveOutcome::Skipped(reason)) => {
                info!(%url, %reason, "Article skipped");
                ArticleOutcome::Skipped
            }
            Err(e) => {
                error!(%url, error = %e, "Failed to save article");
                ArticleOutcome::Failed
            }
        }
    }
}
