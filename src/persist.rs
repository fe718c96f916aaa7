//! Writing articles to the archive tree.
//!
//! # Output Structure
//!
//! ```text
//! archive_root/
//! └── 20240102/
//!     ├── Spring planting begins.txt
//!     └── 春耕开始.txt
//! ```
//!
//! Each file holds `Title: <title>\nDate: <date>\n\n<body>`. Files are written
//! to a hidden temp file in the same directory and renamed into place, so a
//! concurrent reader sees either the old file or the complete new one.

use crate::models::{EditionDate, SaveOutcome, SkipReason};
use rand::{Rng, rng};
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument, warn};

/// Longest file stem, in bytes, kept from a sanitized title. Leaves room for
/// the temp-file decoration under the usual 255-byte name limit.
const MAX_STEM_BYTES: usize = 200;

/// Keep alphanumerics, spaces, hyphens and underscores, then trim.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(sanitize_title("A/B: Test #1"), "AB Test 1");
/// assert_eq!(sanitize_title("  ?!  "), "");
/// ```
pub fn sanitize_title(title: &str) -> String {
    title
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '-' | '_'))
        .collect::<String>()
        .trim()
        .to_string()
}

/// Cut `name` to at most `max_bytes`, on a char boundary.
fn truncate_stem(name: &str, max_bytes: usize) -> &str {
    if name.len() <= max_bytes {
        return name;
    }
    let mut end = max_bytes;
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    name[..end].trim_end()
}

/// Writes articles under `<root>/<date folder>/`.
#[derive(Debug, Clone)]
pub struct Persistor {
    root: PathBuf,
    date_folder_format: String,
}

impl Persistor {
    pub fn new(root: impl Into<PathBuf>, date_folder_format: &str) -> Self {
        Self {
            root: root.into(),
            date_folder_format: date_folder_format.to_string(),
        }
    }

    /// Directory that holds every article of `date`.
    pub fn date_dir(&self, date: EditionDate) -> PathBuf {
        self.root.join(date.format(&self.date_folder_format))
    }

    /// Save one article.
    ///
    /// An empty sanitized title is not an error: nothing is written and
    /// [`SkipReason::NoTitle`] is returned. An existing file with the same
    /// name is replaced.
    #[instrument(level = "info", skip_all, fields(%date))]
    pub async fn save(&self, date: EditionDate, title: &str, body: &str) -> io::Result<SaveOutcome> {
        let sanitized = sanitize_title(title);
        if sanitized.is_empty() {
            warn!(%date, "Article has no usable title; skipping");
            return Ok(SaveOutcome::Skipped(SkipReason::NoTitle));
        }
        let stem = truncate_stem(&sanitized, MAX_STEM_BYTES);

        let folder = date.format(&self.date_folder_format);
        let dir = self.date_dir(date);
        // create_dir_all treats a directory created by a sibling task as success.
        fs::create_dir_all(&dir).await?;

        let path = dir.join(format!("{stem}.txt"));
        let tmp = dir.join(format!(".{stem}.{:016x}.tmp", rng().random::<u64>()));
        let contents = format!("Title: {title}\nDate: {folder}\n\n{body}");

        if let Err(e) = write_then_rename(&tmp, &path, contents.as_bytes()).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e);
        }

        debug!(path = %path.display(), bytes = contents.len(), "Saved article");
        Ok(SaveOutcome::Written(path))
    }
}

/// Create `path` if needed and check that files can be written into it.
///
/// Run once at startup so a read-only archive root fails the run up front
/// instead of failing every article.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn ensure_writable_dir(path: &Path) -> io::Result<()> {
    fs::create_dir_all(path).await?;
    let probe = path.join(".__probe_write__");
    fs::File::create(&probe).await?;
    let _ = fs::remove_file(&probe).await;
    info!("Archive root is writable");
    Ok(())
}

async fn write_then_rename(tmp: &Path, path: &Path, bytes: &[u8]) -> io::Result<()> {
    {
        let mut file = fs::File::create(tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        file.sync_all().await?;
    }
    fs::rename(tmp, path).await
}
