//! Run configuration and site profiles.
//!
//! A crawl is driven by one [`CrawlConfig`], built in three layers:
//!
//! 1. Defaults for the chosen [`Site`] ([`CrawlConfig::for_site`])
//! 2. An optional YAML file ([`FileConfig`]), every key optional
//! 3. Command-line overrides (see [`crate::cli::Cli::apply_overrides`])
//!
//! # YAML example
//!
//! ```yaml
//! site: xinhua-daily
//! concurrency: 2
//! max_attempts: 3
//! retry_delay_secs: 20
//! date_pause_secs: 2
//! request_timeout_secs: 30
//! log_path: ./log.txt
//! archive_root: ./xinhua
//! ```
//!
//! A `profile:` key may replace the built-in [`SiteProfile`] entirely, which
//! is how an archive with other markup is crawled without code changes.

use crate::error::CrawlError;
use crate::models::EditionDate;
use chrono::format::{Item, StrftimeItems};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

/// Built-in archives.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Site {
    /// People's Daily e-paper (paper.people.com.cn)
    #[default]
    PeoplesDaily,
    /// Xinhua Daily e-paper (xh.xhby.net)
    XinhuaDaily,
}

impl Site {
    pub fn profile(self) -> SiteProfile {
        match self {
            Site::PeoplesDaily => SiteProfile::peoples_daily(),
            Site::XinhuaDaily => SiteProfile::xinhua_daily(),
        }
    }
}

/// A container element and the link-bearing items inside it.
///
/// For every element matching `item` inside any `container` match,
/// the link is the element's own `href` when it is an anchor, otherwise the
/// `href` of its first descendant anchor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkSelector {
    pub container: String,
    pub item: String,
}

impl LinkSelector {
    pub fn new(container: &str, item: &str) -> Self {
        Self {
            container: container.to_string(),
            item: item.to_string(),
        }
    }
}

/// Where the title and body live on an article page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleSelectors {
    /// Heading selector. A comma list selects several heading levels, which
    /// are joined top to bottom.
    pub title: String,
    /// Content container.
    pub body: String,
    /// Paragraph elements inside the content container.
    #[serde(default = "default_paragraph")]
    pub paragraph: String,
}

fn default_paragraph() -> String {
    "p".to_string()
}

impl ArticleSelectors {
    pub fn new(title: &str, body: &str) -> Self {
        Self {
            title: title.to_string(),
            body: body.to_string(),
            paragraph: default_paragraph(),
        }
    }
}

/// Everything site-specific: URL template and markup selectors.
///
/// Every selector list is ordered: the current markup first, legacy markup
/// after it. Extractors try them in order on every page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteProfile {
    pub name: String,
    /// Archive root URL, without the date folders.
    pub base_url: String,
    /// `strftime` pattern for the year-month folder, e.g. `%Y-%m`.
    pub month_folder_format: String,
    /// Edition index page inside the day folder.
    pub index_filename: String,
    /// `strftime` pattern for the per-date output folder and `Date:` line.
    #[serde(default = "default_date_folder_format")]
    pub date_folder_format: String,
    pub layout_selectors: Vec<LinkSelector>,
    pub article_link_selectors: Vec<LinkSelector>,
    pub article_selectors: Vec<ArticleSelectors>,
}

fn default_date_folder_format() -> String {
    "%Y%m%d".to_string()
}

impl SiteProfile {
    pub fn peoples_daily() -> Self {
        Self {
            name: "peoples-daily".to_string(),
            base_url: "http://paper.people.com.cn/rmrb/html".to_string(),
            month_folder_format: "%Y-%m".to_string(),
            index_filename: "nbs.D110000renmrb_01.htm".to_string(),
            date_folder_format: default_date_folder_format(),
            layout_selectors: vec![
                LinkSelector::new(".swiper-container", "a"),
                LinkSelector::new("#pageList", "li"),
            ],
            article_link_selectors: vec![
                LinkSelector::new(".news-list", "li"),
                LinkSelector::new("#titleList", "li"),
            ],
            article_selectors: vec![
                ArticleSelectors::new(".article h1", "#ozoom"),
                ArticleSelectors::new(".text_c h1", "#ozoom"),
            ],
        }
    }

    pub fn xinhua_daily() -> Self {
        Self {
            name: "xinhua-daily".to_string(),
            base_url: "https://xh.xhby.net/pc/layout".to_string(),
            month_folder_format: "%Y%m".to_string(),
            index_filename: "node_1.html".to_string(),
            date_folder_format: default_date_folder_format(),
            layout_selectors: vec![LinkSelector::new(".Chunkiconlist", "p")],
            article_link_selectors: vec![LinkSelector::new(".newslist ul", "li")],
            article_selectors: vec![ArticleSelectors::new(".newsdetatit h3", ".newsdetatext")],
        }
    }

    /// `base-url/<month folder>/<day>/<index filename>`
    pub fn index_url(&self, date: EditionDate) -> String {
        format!(
            "{}/{}/{}/{}",
            self.base_url.trim_end_matches('/'),
            date.format(&self.month_folder_format),
            date.format("%d"),
            self.index_filename
        )
    }
}

/// The explicit configuration object handed to the crawler.
#[derive(Debug, Clone)]
pub struct CrawlConfig {
    /// Maximum number of fetches in flight across the whole run.
    pub concurrency: usize,
    /// Attempts per URL, including the first.
    pub max_attempts: usize,
    /// Fixed pause between attempts.
    pub retry_delay: Duration,
    /// Courtesy pause between two dates.
    pub date_pause: Duration,
    /// Per-request timeout applied by the HTTP client.
    pub request_timeout: Duration,
    /// Append-only failure log.
    pub log_path: PathBuf,
    /// Root of the `<date>/<title>.txt` tree.
    pub archive_root: PathBuf,
    pub site: SiteProfile,
}

impl CrawlConfig {
    /// Defaults tuned per archive: the Xinhua site is flakier and blocks
    /// sooner, so it gets fewer slots and more, slower retries.
    pub fn for_site(site: Site) -> Self {
        let (concurrency, max_attempts, retry_delay, archive_root) = match site {
            Site::PeoplesDaily => (4, 2, 10, "peoples_daily"),
            Site::XinhuaDaily => (3, 3, 20, "xinhua_daily"),
        };
        Self {
            concurrency,
            max_attempts,
            retry_delay: Duration::from_secs(retry_delay),
            date_pause: Duration::from_secs(2),
            request_timeout: Duration::from_secs(30),
            log_path: PathBuf::from("log.txt"),
            archive_root: PathBuf::from(archive_root),
            site: site.profile(),
        }
    }

    /// Overlay the values present in a config file.
    pub fn apply_file(&mut self, file: FileConfig) {
        if let Some(profile) = file.profile {
            self.site = profile;
        }
        if let Some(v) = file.concurrency {
            self.concurrency = v;
        }
        if let Some(v) = file.max_attempts {
            self.max_attempts = v;
        }
        if let Some(v) = file.retry_delay_secs {
            self.retry_delay = Duration::from_secs(v);
        }
        if let Some(v) = file.date_pause_secs {
            self.date_pause = Duration::from_secs(v);
        }
        if let Some(v) = file.request_timeout_secs {
            self.request_timeout = Duration::from_secs(v);
        }
        if let Some(v) = file.log_path {
            self.log_path = v;
        }
        if let Some(v) = file.archive_root {
            self.archive_root = v;
        }
    }

    /// Reject values the crawler cannot run with.
    pub fn validate(&self) -> Result<(), CrawlError> {
        if self.concurrency == 0 {
            return Err(CrawlError::InvalidConfig(
                "concurrency must be at least 1".into(),
            ));
        }
        if self.max_attempts == 0 {
            return Err(CrawlError::InvalidConfig(
                "max_attempts must be at least 1".into(),
            ));
        }
        if self.request_timeout.is_zero() {
            return Err(CrawlError::InvalidConfig(
                "request_timeout must be positive".into(),
            ));
        }
        if self.site.layout_selectors.is_empty()
            || self.site.article_link_selectors.is_empty()
            || self.site.article_selectors.is_empty()
        {
            return Err(CrawlError::InvalidConfig(format!(
                "site profile {} is missing selectors",
                self.site.name
            )));
        }
        for (key, pattern) in [
            ("month_folder_format", &self.site.month_folder_format),
            ("date_folder_format", &self.site.date_folder_format),
        ] {
            if !is_valid_date_pattern(pattern) {
                return Err(CrawlError::InvalidConfig(format!(
                    "{key} {pattern:?} is not a valid date format"
                )));
            }
        }
        Url::parse(&self.site.base_url).map_err(|source| CrawlError::InvalidBaseUrl {
            url: self.site.base_url.clone(),
            source,
        })?;
        Ok(())
    }
}

/// Whether chrono can render `pattern` without a formatting error.
fn is_valid_date_pattern(pattern: &str) -> bool {
    !StrftimeItems::new(pattern).any(|item| matches!(item, Item::Error))
}

/// Contents of the optional YAML config file.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub site: Option<Site>,
    pub profile: Option<SiteProfile>,
    pub concurrency: Option<usize>,
    pub max_attempts: Option<usize>,
    pub retry_delay_secs: Option<u64>,
    pub date_pause_secs: Option<u64>,
    pub request_timeout_secs: Option<u64>,
    pub log_path: Option<PathBuf>,
    pub archive_root: Option<PathBuf>,
}

impl FileConfig {
    pub fn from_yaml(path: &str, yaml: &str) -> Result<Self, CrawlError> {
        serde_yaml::from_str(yaml).map_err(|source| CrawlError::ConfigParse {
            path: path.to_string(),
            source,
        })
    }

    #[instrument(level = "info", skip_all, fields(path = %path.display()))]
    pub async fn load(path: &Path) -> Result<Self, CrawlError> {
        let display = path.display().to_string();
        let yaml = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| CrawlError::ConfigRead {
                path: display.clone(),
                source,
            })?;
        let file = Self::from_yaml(&display, &yaml)?;
        debug!(?file, "Loaded config file");
        Ok(file)
    }
}
