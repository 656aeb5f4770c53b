//! Classification of yt-dlp failures.
//!
//! yt-dlp reports everything through stderr text, so the job error is picked by
//! matching known phrases.

use crate::core::utils::truncate;
use crate::download::error::JobError;

/// Longest reason string carried into a user-facing error.
const MAX_REASON_CHARS: usize = 300;

/// Kinds of yt-dlp failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum YtDlpErrorType {
    /// Requested format id/selector cannot be satisfied
    FormatUnavailable,
    /// Local disk is full or not writable
    Storage,
    /// Private, removed, or region-blocked content
    ContentUnavailable,
    /// Login or fresh cookies required
    AuthenticationRequired,
    /// Timeouts, resets, DNS failures
    Network,
    /// Link not handled by any extractor
    UnsupportedUrl,
    Unknown,
}

/// Determines the failure kind from yt-dlp stderr
pub fn analyze_ytdlp_error(stderr: &str) -> YtDlpErrorType {
    let stderr_lower = stderr.to_lowercase();

    if stderr_lower.contains("requested format is not available")
        || stderr_lower.contains("requested format not available")
        || stderr_lower.contains("no video formats found")
    {
        return YtDlpErrorType::FormatUnavailable;
    }

    if stderr_lower.contains("no space left on device")
        || stderr_lower.contains("disk quota exceeded")
        || stderr_lower.contains("read-only file system")
        || stderr_lower.contains("permission denied")
    {
        return YtDlpErrorType::Storage;
    }

    if stderr_lower.contains("unsupported url") {
        return YtDlpErrorType::UnsupportedUrl;
    }

    if stderr_lower.contains("sign in to confirm")
        || stderr_lower.contains("please sign in")
        || stderr_lower.contains("login required")
        || stderr_lower.contains("use --cookies")
        || stderr_lower.contains("cookies are no longer valid")
    {
        return YtDlpErrorType::AuthenticationRequired;
    }

    if stderr_lower.contains("private video")
        || stderr_lower.contains("video unavailable")
        || stderr_lower.contains("this video is not available")
        || stderr_lower.contains("video has been removed")
        || stderr_lower.contains("not available in your country")
        || stderr_lower.contains("http error 404")
    {
        return YtDlpErrorType::ContentUnavailable;
    }

    if stderr_lower.contains("timed out")
        || stderr_lower.contains("timeout")
        || stderr_lower.contains("connection")
        || stderr_lower.contains("network")
        || stderr_lower.contains("temporary failure in name resolution")
        || stderr_lower.contains("http error 5")
    {
        return YtDlpErrorType::Network;
    }

    YtDlpErrorType::Unknown
}

/// The most relevant line of yt-dlp stderr: the last `ERROR:` line, otherwise
/// the last non-empty one.
pub fn error_summary(stderr: &str) -> String {
    let lines: Vec<&str> = stderr.lines().map(str::trim).filter(|line| !line.is_empty()).collect();

    let line = lines
        .iter()
        .rev()
        .find(|line| line.starts_with("ERROR:"))
        .or_else(|| lines.last())
        .map(|line| line.trim_start_matches("ERROR:").trim())
        .unwrap_or("yt-dlp failed without output");

    truncate(line, MAX_REASON_CHARS)
}

/// Maps a failed metadata lookup to a job error.
pub fn extraction_error(stderr: &str) -> JobError {
    let summary = error_summary(stderr);
    match analyze_ytdlp_error(stderr) {
        YtDlpErrorType::AuthenticationRequired => JobError::Extraction(format!(
            "{}\n\nThis content needs a login. Upload a cookies.txt file (see /add).",
            summary
        )),
        YtDlpErrorType::UnsupportedUrl => JobError::Extraction("This link is not supported.".to_string()),
        _ => JobError::Extraction(summary),
    }
}

/// Maps a failed download to a job error.
pub fn fetch_error(stderr: &str) -> JobError {
    let summary = error_summary(stderr);
    match analyze_ytdlp_error(stderr) {
        YtDlpErrorType::FormatUnavailable => JobError::UnsupportedFormat(summary),
        YtDlpErrorType::Storage => JobError::Disk(summary),
        YtDlpErrorType::ContentUnavailable | YtDlpErrorType::UnsupportedUrl => JobError::Extraction(summary),
        YtDlpErrorType::AuthenticationRequired => extraction_error(stderr),
        YtDlpErrorType::Network | YtDlpErrorType::Unknown => JobError::Network(summary),
    }
}
