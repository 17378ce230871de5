//! Flat on-disk layout of uploads and their derived artifacts.
//!
//! ```text
//! <root>/<video_id>                  original upload
//! <root>/<video_id>_preview.gif      preview clip
//! <root>/<video_id>_thumbnail.jpg    thumbnail
//! ```
//!
//! A missing preview or thumbnail is a permanent, valid state: processing
//! failed and is never retried.

use std::io;
use std::path::{Path, PathBuf};

pub const PREVIEW_SUFFIX: &str = "_preview.gif";
pub const THUMBNAIL_SUFFIX: &str = "_thumbnail.jpg";
/// Only files with this suffix are listed as videos.
pub const VIDEO_SUFFIX: &str = ".mp4";

#[derive(Debug, Clone)]
pub struct MediaStore {
    root: PathBuf,
}

impl MediaStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Creates the storage root if it does not exist yet.
    pub async fn ensure(&self) -> io::Result<()> {
        tokio::fs::create_dir_all(&self.root).await
    }

    pub fn source_path(&self, video_id: &str) -> PathBuf {
        self.root.join(video_id)
    }

    pub fn preview_path(&self, video_id: &str) -> PathBuf {
        self.root.join(format!("{video_id}{PREVIEW_SUFFIX}"))
    }

    pub fn thumbnail_path(&self, video_id: &str) -> PathBuf {
        self.root.join(format!("{video_id}{THUMBNAIL_SUFFIX}"))
    }

    /// Names of stored source videos, sorted.
    pub async fn list_videos(&self) -> io::Result<Vec<String>> {
        let mut entries = tokio::fs::read_dir(&self.root).await?;
        let mut videos = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if name.ends_with(VIDEO_SUFFIX) {
                    videos.push(name.to_string());
                }
            }
        }

        videos.sort();
        Ok(videos)
    }
}
