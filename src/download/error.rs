use thiserror::Error;

use crate::core::utils::human_bytes;

/// Why a download job ended without delivering a file.
///
/// Every variant is terminal for the job: nothing is retried automatically and
/// the user has to send the link again.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum JobError {
    /// Bad or unsupported URL, private content, or a failed remote lookup
    #[error("extraction failed: {0}")]
    Extraction(String),

    /// The chosen format vanished or cannot be assembled
    #[error("format unavailable: {0}")]
    UnsupportedFormat(String),

    /// Transport failure during transfer or upload
    #[error("network error: {0}")]
    Network(String),

    /// Artifact exceeds the upload ceiling
    #[error("file is {size} bytes, upload limit is {limit} bytes")]
    SizeLimit { size: u64, limit: u64 },

    /// Local storage failure
    #[error("disk error: {0}")]
    Disk(String),

    /// Stopped by the user
    #[error("cancelled by user")]
    Cancelled,
}

impl JobError {
    /// Returns subcategory for logs
    pub fn subcategory(&self) -> &'static str {
        match self {
            JobError::Extraction(_) => "extraction",
            JobError::UnsupportedFormat(_) => "unsupported_format",
            JobError::Network(_) => "network",
            JobError::SizeLimit { .. } => "size_limit",
            JobError::Disk(_) => "disk",
            JobError::Cancelled => "cancelled",
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, JobError::Cancelled)
    }

    /// Short text shown on the status message when the job ends with this error.
    pub fn user_message(&self) -> String {
        match self {
            JobError::Extraction(reason) => format!("❌ Could not fetch this link.\n\n{}", reason),
            JobError::UnsupportedFormat(_) => {
                "❌ This format is no longer available.\n\nSend the link again and pick another one.".to_string()
            }
            JobError::Network(reason) => format!("❌ Network error.\n\n{}", reason),
            JobError::SizeLimit { size, limit } => format!(
                "❌ File is too large to send: {} (limit {}).\n\nTry a lower quality.",
                human_bytes(*size),
                human_bytes(*limit)
            ),
            JobError::Disk(_) => "❌ Storage error on the server. Try again later.".to_string(),
            JobError::Cancelled => "❌ Download cancelled.".to_string(),
        }
    }
}

impl From<std::io::Error> for JobError {
    fn from(err: std::io::Error) -> Self {
        JobError::Disk(err.to_string())
    }
}
