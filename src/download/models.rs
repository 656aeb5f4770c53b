//! Data carried between extraction, the format menu and download jobs.

use serde::{Deserialize, Deserializer, Serialize};
use strum::{AsRefStr, Display, EnumString};
use url::Url;

/// What the user wants out of a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, AsRefStr, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Video,
    Audio,
}

impl MediaKind {
    /// One-letter code used in callback data.
    pub fn code(self) -> &'static str {
        match self {
            MediaKind::Video => "v",
            MediaKind::Audio => "a",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "v" => Some(MediaKind::Video),
            "a" => Some(MediaKind::Audio),
            _ => None,
        }
    }

    pub fn emoji(self) -> &'static str {
        match self {
            MediaKind::Video => "🎥",
            MediaKind::Audio => "🎧",
        }
    }
}

/// Accepts integer or float JSON numbers (yt-dlp emits both for sizes).
fn lenient_u64<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<f64>::deserialize(deserializer)?;
    Ok(value.filter(|n| n.is_finite() && *n >= 0.0).map(|n| n as u64))
}

fn lenient_u32<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_u64(deserializer)?.and_then(|n| u32::try_from(n).ok()))
}

/// One format descriptor as reported by yt-dlp.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawFormat {
    pub format_id: String,
    pub ext: String,
    pub vcodec: Option<String>,
    pub acodec: Option<String>,
    #[serde(deserialize_with = "lenient_u32")]
    pub width: Option<u32>,
    #[serde(deserialize_with = "lenient_u32")]
    pub height: Option<u32>,
    pub resolution: Option<String>,
    pub format_note: Option<String>,
    pub abr: Option<f64>,
    pub tbr: Option<f64>,
    #[serde(deserialize_with = "lenient_u64")]
    pub filesize: Option<u64>,
    #[serde(deserialize_with = "lenient_u64")]
    pub filesize_approx: Option<u64>,
}

impl RawFormat {
    pub fn has_video(&self) -> bool {
        match self.vcodec.as_deref() {
            Some("none") => false,
            Some(_) => true,
            None => self.height.is_some(),
        }
    }

    pub fn has_audio(&self) -> bool {
        match self.acodec.as_deref() {
            Some("none") => false,
            Some(_) => true,
            None => !self.has_video() && self.abr.is_some(),
        }
    }

    /// Exact size when known, otherwise yt-dlp's estimate.
    pub fn size(&self) -> Option<u64> {
        self.filesize.or(self.filesize_approx)
    }

    /// Frame height, falling back to the "1280x720" resolution string.
    pub fn video_height(&self) -> Option<u32> {
        self.height.or_else(|| {
            let (_, height) = self.resolution.as_deref()?.split_once('x')?;
            let digits: String = height.chars().filter(char::is_ascii_digit).collect();
            digits.parse().ok()
        })
    }

    /// Audio bitrate in kbps, rounded.
    pub fn audio_bitrate(&self) -> Option<u32> {
        self.abr
            .or(self.tbr)
            .filter(|kbps| kbps.is_finite() && *kbps > 0.0)
            .map(|kbps| kbps.round() as u32)
    }
}

/// Metadata of a single media item.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaInfo {
    pub id: String,
    pub title: String,
    pub duration: Option<f64>,
    pub thumbnail: Option<String>,
    pub webpage_url: Option<String>,
    pub formats: Vec<RawFormat>,
}

/// One entry of a flat playlist listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistEntry {
    /// 1-based position in the playlist
    pub index: usize,
    pub url: String,
    pub title: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistInfo {
    pub title: String,
    pub entries: Vec<PlaylistEntry>,
}

/// Result of resolving a link.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolved {
    Single(MediaInfo),
    Playlist(PlaylistInfo),
}

/// A concrete download the user asked for.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaRequest {
    pub source_url: Url,
    /// yt-dlp `-f` selector
    pub selector: String,
    pub kind: MediaKind,
    /// Label shown in the caption, e.g. "720p" or "128kbps"
    pub quality: String,
    pub title: String,
    pub thumbnail_url: Option<String>,
    /// Size estimate from extraction, when yt-dlp reported one
    pub estimated_size: Option<u64>,
    pub playlist_index: Option<usize>,
}

impl MediaRequest {
    /// File name the artifact is delivered under.
    pub fn file_name(&self, ext: &str) -> String {
        let title = crate::core::utils::sanitize_title(&self.title);
        match self.playlist_index {
            Some(index) => format!("{}. {}.{}", index, title, ext),
            None => format!("{}.{}", title, ext),
        }
    }

    /// Caption attached to the delivered file.
    pub fn caption(&self, file_name: &str) -> String {
        let quality_icon = match self.kind {
            MediaKind::Video => "📺",
            MediaKind::Audio => "🔊",
        };
        format!("📄 Filename: {}\n{} Quality: {}", file_name, quality_icon, self.quality)
    }
}
