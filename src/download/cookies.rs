//! cookies.txt management for yt-dlp
//!
//! Admins can upload a Netscape-format cookies file so yt-dlp can reach
//! age-gated or login-only content. The file is validated before it replaces
//! the current one and is passed to every yt-dlp invocation while it exists.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::core::config;
use crate::core::error::{AppError, AppResult};

const NETSCAPE_HEADERS: [&str; 2] = ["# Netscape HTTP Cookie File", "# HTTP Cookie File"];

/// Number of tab-separated fields in a Netscape cookie line
const COOKIE_FIELDS: usize = 7;

/// Checks that `content` looks like a Netscape cookies export.
///
/// Returns a short reason when it does not.
pub fn validate_cookie_file(content: &str) -> Result<(), String> {
    let content = content.trim_start_matches('\u{feff}');
    let has_header = content
        .lines()
        .next()
        .map(str::trim)
        .is_some_and(|first| NETSCAPE_HEADERS.iter().any(|header| first.starts_with(header)));
    if !has_header {
        return Err("missing \"# Netscape HTTP Cookie File\" header".to_string());
    }

    let cookie_lines = content
        .lines()
        .map(|line| line.strip_prefix("#HttpOnly_").unwrap_or(line))
        .filter(|line| !line.trim().is_empty() && !line.starts_with('#'))
        .collect::<Vec<_>>();

    if cookie_lines.is_empty() {
        return Err("file contains no cookies".to_string());
    }

    if let Some(bad) = cookie_lines
        .iter()
        .position(|line| line.split('\t').count() < COOKIE_FIELDS)
    {
        return Err(format!(
            "cookie #{} has fewer than {} tab-separated fields",
            bad + 1,
            COOKIE_FIELDS
        ));
    }

    Ok(())
}

/// Location of the cookies file plus a lock serializing writes to it.
#[derive(Debug, Clone)]
pub struct CookieStore {
    path: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl CookieStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn from_config() -> Self {
        Self::new(config::COOKIES_FILE.clone())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Validates `bytes` and atomically replaces the cookies file with them.
    pub async fn install(&self, bytes: &[u8]) -> AppResult<()> {
        if bytes.len() > config::validation::MAX_COOKIES_FILE_BYTES as usize {
            return Err(AppError::Validation("cookies file is too large".to_string()));
        }
        let content = std::str::from_utf8(bytes)
            .map_err(|_| AppError::Validation("cookies file is not valid UTF-8 text".to_string()))?;
        validate_cookie_file(content).map_err(AppError::Validation)?;

        let _guard = self.write_lock.lock().await;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs_err::tokio::create_dir_all(parent).await?;
        }

        // Write to a sibling file first so a crash never leaves a half-written file
        let temp_path = PathBuf::from(format!("{}.tmp.{}", self.path.display(), std::process::id()));
        fs_err::tokio::write(&temp_path, content).await?;
        if let Err(e) = fs_err::tokio::rename(&temp_path, &self.path).await {
            let _ = fs_err::tokio::remove_file(&temp_path).await;
            return Err(e.into());
        }

        log::info!("✅ Cookies file updated: {}", self.path.display());
        Ok(())
    }

    /// Deletes the cookies file. Returns false when there was nothing to delete.
    pub async fn remove(&self) -> AppResult<bool> {
        let _guard = self.write_lock.lock().await;
        match fs_err::tokio::remove_file(&self.path).await {
            Ok(()) => {
                log::info!("🗑 Cookies file removed: {}", self.path.display());
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
