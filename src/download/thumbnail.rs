//! Thumbnail preparation for uploads.
//!
//! The thumbnail URL from extraction is downloaded into the job directory.
//! Telegram only displays JPEG thumbnails, so other formats go through ffmpeg.
//! When no usable image exists, a frame is grabbed from the video itself.

use std::path::{Path, PathBuf};

use reqwest::Client;
use tokio::process::Command as TokioCommand;

use crate::core::config;
use crate::core::error::{AppError, AppResult};
use crate::download::models::{MediaKind, MediaRequest};

/// Image format detected by magic bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ImageFormat {
    Jpeg,
    Png,
    WebP,
    Unknown,
}

/// Detects image format from the first bytes of a file
pub(crate) fn detect_image_format(bytes: &[u8]) -> ImageFormat {
    match bytes {
        [0xFF, 0xD8, 0xFF, ..] => ImageFormat::Jpeg,
        [0x89, b'P', b'N', b'G', ..] => ImageFormat::Png,
        [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => ImageFormat::WebP,
        _ => ImageFormat::Unknown,
    }
}

#[derive(Debug, Clone)]
pub struct ThumbnailFetcher {
    http: Client,
    ffmpeg_bin: Option<String>,
}

impl ThumbnailFetcher {
    pub fn new(http: Client, ffmpeg_bin: Option<String>) -> Self {
        Self { http, ffmpeg_bin }
    }

    pub fn from_config() -> AppResult<Self> {
        let http = Client::builder()
            .timeout(config::network::thumbnail_timeout())
            .build()?;
        Ok(Self::new(http, config::FFMPEG_BIN.clone()))
    }

    /// Produces a JPEG thumbnail for `request` inside `dir`, if one can be had.
    ///
    /// Never fails the job: every problem is logged and yields `None`.
    pub async fn prepare(&self, request: &MediaRequest, media_path: &Path, dir: &Path) -> Option<PathBuf> {
        if let Some(url) = request.thumbnail_url.as_deref() {
            match self.download(url, dir).await {
                Ok(Some(path)) => return Some(path),
                Ok(None) => log::debug!("Thumbnail from {} is not usable", url),
                Err(e) => log::warn!("Failed to download thumbnail {}: {}", url, e),
            }
        }

        if request.kind == MediaKind::Video {
            return self.frame_from_video(media_path, dir).await;
        }
        None
    }

    async fn download(&self, url: &str, dir: &Path) -> AppResult<Option<PathBuf>> {
        let response = self.http.get(url).send().await?;
        if !response.status().is_success() {
            return Err(AppError::HttpStatus(response.status()));
        }
        let bytes = response.bytes().await?;

        let target = dir.join("thumb.jpg");
        match detect_image_format(&bytes) {
            ImageFormat::Jpeg => {
                fs_err::tokio::write(&target, &bytes).await?;
                Ok(Some(target))
            }
            ImageFormat::Png | ImageFormat::WebP => {
                let source = dir.join("thumb.src");
                fs_err::tokio::write(&source, &bytes).await?;
                let converted = self
                    .run_ffmpeg(&["-y", "-i", &source.display().to_string(), "-f", "image2"], &target)
                    .await;
                Ok(converted.then_some(target))
            }
            ImageFormat::Unknown => Ok(None),
        }
    }

    async fn frame_from_video(&self, media_path: &Path, dir: &Path) -> Option<PathBuf> {
        let target = dir.join("frame.jpg");
        let input = media_path.display().to_string();
        let args = [
            "-y",
            "-ss",
            "1",
            "-i",
            input.as_str(),
            "-vframes",
            "1",
            "-vf",
            "scale=320:320:force_original_aspect_ratio=decrease",
            "-q:v",
            "2",
            "-f",
            "image2",
        ];
        self.run_ffmpeg(&args, &target).await.then_some(target)
    }

    /// Runs ffmpeg with `args` followed by `output`. True when the file was written.
    async fn run_ffmpeg(&self, args: &[&str], output: &Path) -> bool {
        let Some(bin) = self.ffmpeg_bin.as_deref() else {
            return false;
        };

        match TokioCommand::new(bin)
            .args(args)
            .arg(output)
            .kill_on_drop(true)
            .output()
            .await
        {
            Ok(result) if result.status.success() => output.is_file(),
            Ok(result) => {
                log::warn!(
                    "ffmpeg failed to produce {}: {}",
                    output.display(),
                    String::from_utf8_lossy(&result.stderr).lines().last().unwrap_or("")
                );
                false
            }
            Err(e) => {
                log::warn!("Failed to run ffmpeg: {}", e);
                false
            }
        }
    }
}
