//! On-disk layout
//!
//! ```text
//! <download_dir>/recorded/<username>/   raw captures, possibly interrupted
//! <download_dir>/processed/<username>/  repaired or moved final files
//! ```
//!
//! Anything left in `recorded/` when the recorder starts is a leftover from
//! a previous run and gets processed before polling begins.

use std::path::{Path, PathBuf};

use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadLayout {
    recorded_dir: PathBuf,
    processed_dir: PathBuf,
}

impl DownloadLayout {
    pub fn new(download_dir: impl AsRef<Path>, username: &str) -> Self {
        let root = download_dir.as_ref();
        Self {
            recorded_dir: root.join("recorded").join(username),
            processed_dir: root.join("processed").join(username),
        }
    }

    #[must_use]
    pub fn recorded_dir(&self) -> &Path {
        &self.recorded_dir
    }

    #[must_use]
    pub fn processed_dir(&self) -> &Path {
        &self.processed_dir
    }

    /// Raw capture path for `filename`
    #[must_use]
    pub fn recorded_path(&self, filename: &str) -> PathBuf {
        self.recorded_dir.join(filename)
    }

    /// Final path for `filename`
    #[must_use]
    pub fn processed_path(&self, filename: &str) -> PathBuf {
        self.processed_dir.join(filename)
    }

    /// Create both directories if absent
    pub async fn ensure(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.recorded_dir).await?;
        tokio::fs::create_dir_all(&self.processed_dir).await?;
        Ok(())
    }

    /// Regular files currently in the recorded directory, sorted by name
    pub async fn leftovers(&self) -> Result<Vec<PathBuf>> {
        let mut entries = tokio::fs::read_dir(&self.recorded_dir).await?;
        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                files.push(entry.path());
            }
        }
        files.sort();
        Ok(files)
    }
}
