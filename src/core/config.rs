use once_cell::sync::Lazy;
use secrecy::SecretString;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Expands `~` in a configured path.
fn expand_path(raw: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(raw).as_ref())
}

/// Bot token
/// Read from BOT_TOKEN or TELOXIDE_TOKEN environment variable
pub static BOT_TOKEN: Lazy<SecretString> = Lazy::new(|| {
    let token = env::var("BOT_TOKEN")
        .or_else(|_| env::var("TELOXIDE_TOKEN"))
        .unwrap_or_default();
    SecretString::from(token)
});

/// Custom Bot API server URL (local telegram-bot-api)
/// Read from BOT_API_URL environment variable
pub static BOT_API_URL: Lazy<Option<String>> =
    Lazy::new(|| env::var("BOT_API_URL").ok().filter(|url| !url.trim().is_empty()));

/// Public webhook URL for Telegram updates
/// Read from WEBHOOK_URL environment variable
pub static WEBHOOK_URL: Lazy<Option<String>> = Lazy::new(|| env::var("WEBHOOK_URL").ok());

/// Local port the webhook listener binds to
/// Default: 8443
pub static WEBHOOK_PORT: Lazy<u16> = Lazy::new(|| {
    env::var("WEBHOOK_PORT")
        .ok()
        .and_then(|port| port.parse().ok())
        .unwrap_or(8443)
});

/// Cached yt-dlp binary path
/// Read once at startup from YTDL_BIN environment variable or defaults to "yt-dlp"
pub static YTDL_BIN: Lazy<String> = Lazy::new(|| env::var("YTDL_BIN").unwrap_or_else(|_| "yt-dlp".to_string()));

/// ffmpeg binary used for thumbnail frame grabs
/// Set FFMPEG_BIN to an empty string to disable the fallback
pub static FFMPEG_BIN: Lazy<Option<String>> = Lazy::new(|| match env::var("FFMPEG_BIN") {
    Ok(bin) if bin.trim().is_empty() => None,
    Ok(bin) => Some(bin),
    Err(_) => Some("ffmpeg".to_string()),
});

/// Netscape cookies file passed to yt-dlp when present
/// Read from COOKIES_FILE environment variable, supports tilde (~) expansion
/// Default: cookies.txt
pub static COOKIES_FILE: Lazy<PathBuf> =
    Lazy::new(|| expand_path(&env::var("COOKIES_FILE").unwrap_or_else(|_| "cookies.txt".to_string())));

/// Root for per-job scratch directories
/// Read from TEMP_FILES_DIR environment variable
/// Defaults to the system temp directory
pub static TEMP_FILES_DIR: Lazy<PathBuf> = Lazy::new(|| match env::var("TEMP_FILES_DIR") {
    Ok(dir) => expand_path(&dir),
    Err(_) => env::temp_dir(),
});

/// Log file path
/// Read from LOG_FILE_PATH environment variable
/// Default: clipdrop.log
pub static LOG_FILE_PATH: Lazy<String> =
    Lazy::new(|| env::var("LOG_FILE_PATH").unwrap_or_else(|_| "clipdrop.log".to_string()));

/// Telegram user ids allowed to manage cookies
/// Read from ADMIN_IDS (comma-separated). Empty means everyone.
pub static ADMIN_IDS: Lazy<Vec<u64>> = Lazy::new(|| {
    env::var("ADMIN_IDS")
        .unwrap_or_default()
        .split(',')
        .filter_map(|id| id.trim().parse().ok())
        .collect()
});

/// Whether a local Bot API server is configured.
///
/// If BOT_API_URL is set and not pointing to api.telegram.org, assume local server is used.
pub fn is_local_bot_api() -> bool {
    BOT_API_URL
        .as_deref()
        .is_some_and(|url| !url.contains("api.telegram.org"))
}

/// Status relay configuration
pub mod relay {
    use super::Duration;

    /// Interval between status message edits (in seconds)
    pub const INTERVAL_SECS: u64 = 6;

    /// Pause after a failed edit before the next attempt (in seconds)
    pub const BACKOFF_SECS: u64 = 3;

    /// Upper bound for a server-requested retry-after wait (in seconds)
    pub const MAX_BACKOFF_SECS: u64 = 30;

    pub fn interval() -> Duration {
        Duration::from_secs(INTERVAL_SECS)
    }

    pub fn backoff() -> Duration {
        Duration::from_secs(BACKOFF_SECS)
    }

    pub fn max_backoff() -> Duration {
        Duration::from_secs(MAX_BACKOFF_SECS)
    }
}

/// Metadata extraction configuration
pub mod extraction {
    use super::Duration;

    /// Timeout for a yt-dlp metadata lookup (in seconds)
    pub const TIMEOUT_SECS: u64 = 30;

    pub fn timeout() -> Duration {
        Duration::from_secs(TIMEOUT_SECS)
    }
}

/// Upload limits
pub mod upload {
    use super::{env, is_local_bot_api, Lazy};

    /// Upload ceiling of a local Bot API server (2 GiB)
    pub const LOCAL_API_MAX_BYTES: u64 = 2 * 1024 * 1024 * 1024;

    /// Upload ceiling of api.telegram.org (50 MiB)
    pub const CLOUD_API_MAX_BYTES: u64 = 50 * 1024 * 1024;

    /// Effective upload ceiling
    ///
    /// MAX_UPLOAD_BYTES overrides the default picked from the Bot API mode.
    pub static MAX_UPLOAD_BYTES: Lazy<u64> = Lazy::new(|| {
        env::var("MAX_UPLOAD_BYTES")
            .ok()
            .and_then(|limit| limit.parse().ok())
            .unwrap_or_else(|| {
                if is_local_bot_api() {
                    LOCAL_API_MAX_BYTES
                } else {
                    CLOUD_API_MAX_BYTES
                }
            })
    });
}

/// Playlist flow configuration
pub mod playlist {
    use super::Duration;

    /// Maximum number of entries downloaded per playlist job
    pub const MAX_ITEMS: usize = 25;

    /// Heights offered on the playlist resolution keyboard
    pub const RESOLUTIONS: [u32; 6] = [144, 240, 360, 480, 720, 1080];

    /// How long a pending playlist selection stays valid (in seconds)
    pub const SELECTION_TTL_SECS: u64 = 3600;

    pub fn selection_ttl() -> Duration {
        Duration::from_secs(SELECTION_TTL_SECS)
    }
}

/// Resolved-link cache configuration
pub mod cache {
    use super::Duration;

    /// How long a resolved link stays usable from its menu (in seconds)
    pub const LINK_TTL_SECS: u64 = 3600;

    /// Maximum number of cached links
    pub const LINK_CAPACITY: u64 = 10_000;

    pub fn link_ttl() -> Duration {
        Duration::from_secs(LINK_TTL_SECS)
    }
}

/// Network configuration
pub mod network {
    use super::Duration;

    /// Request timeout for Bot API requests (in seconds)
    /// Large uploads through a local Bot API server take a while
    pub const REQUEST_TIMEOUT_SECS: u64 = 900;

    /// Timeout for thumbnail downloads (in seconds)
    pub const THUMBNAIL_TIMEOUT_SECS: u64 = 30;

    pub fn timeout() -> Duration {
        Duration::from_secs(REQUEST_TIMEOUT_SECS)
    }

    pub fn thumbnail_timeout() -> Duration {
        Duration::from_secs(THUMBNAIL_TIMEOUT_SECS)
    }
}

/// Validation limits
pub mod validation {
    /// Maximum accepted URL length
    pub const MAX_URL_LENGTH: usize = 2048;

    /// Maximum accepted cookies.txt upload size (1 MiB)
    pub const MAX_COOKIES_FILE_BYTES: u32 = 1024 * 1024;
}
