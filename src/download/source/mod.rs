//! Media backend abstraction.
//!
//! A [`MediaBackend`] turns a link into metadata and downloads a chosen format
//! into a caller-owned directory. The bot ships with [`ytdlp::YtDlpBackend`];
//! tests plug in their own implementation.

pub mod ytdlp;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use url::Url;

use crate::download::error::JobError;
use crate::download::models::{MediaRequest, Resolved};
use crate::download::progress::ProgressSink;

/// Output of a successful fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedMedia {
    /// The single artifact inside the destination directory
    pub path: PathBuf,
    /// File size in bytes
    pub size: u64,
}

impl FetchedMedia {
    /// Extension of the artifact, "bin" when it has none.
    pub fn extension(&self) -> &str {
        self.path.extension().and_then(|ext| ext.to_str()).unwrap_or("bin")
    }
}

#[async_trait]
pub trait MediaBackend: Send + Sync {
    /// Human-readable name of this backend (e.g., "yt-dlp")
    fn name(&self) -> &str;

    /// Resolve a link into a single item or a playlist listing.
    async fn resolve(&self, url: &Url) -> Result<Resolved, JobError>;

    /// Download `request` into `dest`, reporting progress through `sink`.
    ///
    /// `dest` belongs to the caller, who removes it on every exit path.
    async fn fetch(&self, request: &MediaRequest, dest: &Path, sink: ProgressSink) -> Result<FetchedMedia, JobError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetched_media_extension() {
        let media = FetchedMedia {
            path: PathBuf::from("/tmp/yt_dl_x/download.mp4"),
            size: 1,
        };
        assert_eq!(media.extension(), "mp4");

        let bare = FetchedMedia {
            path: PathBuf::from("/tmp/yt_dl_x/download"),
            size: 1,
        };
        assert_eq!(bare.extension(), "bin");
    }
}
