//! Format menu built from yt-dlp format descriptors.
//!
//! [`present_formats`] is pure: the same descriptors always give the same
//! ordered list, so a callback can recompute the menu and pick by index.

use itertools::Itertools;
use serde::Serialize;

use crate::core::utils::human_bytes;
use crate::download::error::JobError;
use crate::download::models::{MediaKind, RawFormat};

/// How the audio track of an option is obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioPairing {
    /// Video with its own audio track
    Muxed,
    /// Video-only, merged with the best audio stream at download time
    BestAudio,
    /// Video-only and the media has no audio stream to merge
    Unavailable,
    AudioOnly,
}

/// One entry of the format menu.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormatOption {
    pub format_id: String,
    pub container: String,
    /// "720p" or "128kbps"
    pub quality: String,
    /// Height for video, bitrate for audio; the sort key
    pub rank: u32,
    pub approx_size: Option<u64>,
    pub pairing: AudioPairing,
    pub label: String,
}

impl FormatOption {
    /// yt-dlp selector for this option.
    pub fn selector(&self) -> Result<String, JobError> {
        match self.pairing {
            AudioPairing::Muxed | AudioPairing::AudioOnly => Ok(self.format_id.clone()),
            AudioPairing::BestAudio => Ok(format!("{}+bestaudio", self.format_id)),
            AudioPairing::Unavailable => Err(JobError::UnsupportedFormat(format!(
                "{} has no audio track and the media has no audio stream to merge",
                self.quality
            ))),
        }
    }
}

/// Selector behind the "Best" button.
pub fn best_selector(kind: MediaKind) -> &'static str {
    match kind {
        MediaKind::Video => "bestvideo+bestaudio/best",
        MediaKind::Audio => "bestaudio/best",
    }
}

fn label(kind: MediaKind, quality: &str, container: &str, size: Option<u64>) -> String {
    let size = size.map(human_bytes).unwrap_or_else(|| "?".to_string());
    format!("{} {} | {} | {}", kind.emoji(), quality, container, size)
}

/// Builds the ordered, deduplicated menu for `kind`.
pub fn present_formats(formats: &[RawFormat], kind: MediaKind) -> Vec<FormatOption> {
    match kind {
        MediaKind::Video => video_options(formats),
        MediaKind::Audio => audio_options(formats),
    }
}

fn video_options(formats: &[RawFormat]) -> Vec<FormatOption> {
    let has_audio_stream = formats.iter().any(|f| f.has_audio() && !f.has_video());

    formats
        .iter()
        .filter(|f| f.has_video())
        .filter_map(|f| f.video_height().map(|height| (height, f)))
        // stable sort: within one height muxed comes first, then original order
        .sorted_by_key(|(height, f)| (*height, !f.has_audio()))
        .unique_by(|(height, _)| *height)
        .map(|(height, f)| {
            let pairing = if f.has_audio() {
                AudioPairing::Muxed
            } else if has_audio_stream {
                AudioPairing::BestAudio
            } else {
                AudioPairing::Unavailable
            };
            let quality = format!("{}p", height);
            FormatOption {
                label: label(MediaKind::Video, &quality, &f.ext, f.size()),
                format_id: f.format_id.clone(),
                container: f.ext.clone(),
                quality,
                rank: height,
                approx_size: f.size(),
                pairing,
            }
        })
        .collect()
}

fn audio_options(formats: &[RawFormat]) -> Vec<FormatOption> {
    formats
        .iter()
        .filter(|f| f.has_audio() && !f.has_video())
        .filter_map(|f| f.audio_bitrate().map(|kbps| (kbps, f)))
        .sorted_by_key(|(kbps, _)| *kbps)
        .unique_by(|(kbps, _)| *kbps)
        .map(|(kbps, f)| {
            let quality = format!("{}kbps", kbps);
            FormatOption {
                label: label(MediaKind::Audio, &quality, &f.ext, f.size()),
                format_id: f.format_id.clone(),
                container: f.ext.clone(),
                quality,
                rank: kbps,
                approx_size: f.size(),
                pairing: AudioPairing::AudioOnly,
            }
        })
        .collect()
}
