//! Logging initialization and startup diagnostics
//!
//! This module provides:
//! - Logger initialization (console + file)
//! - Cookies file check at startup

use anyhow::Result;
use simplelog::*;
use std::fs::File;
use std::path::Path;

use crate::core::config;
use crate::download::cookies::validate_cookie_file;

/// Initialize logger for both console and file output
///
/// # Arguments
/// * `log_file_path` - Path to the log file
///
/// # Returns
/// * `Ok(())` - Logger initialized successfully
/// * `Err(anyhow::Error)` - Failed to initialize logger
pub fn init_logger(log_file_path: &str) -> Result<()> {
    let log_file = File::create(log_file_path).map_err(|e| anyhow::anyhow!("Failed to create log file: {}", e))?;

    CombinedLogger::init(vec![
        TermLogger::new(
            LevelFilter::Info,
            Config::default(),
            TerminalMode::Mixed,
            ColorChoice::Auto,
        ),
        WriteLogger::new(LevelFilter::Info, Config::default(), log_file),
    ])
    .map_err(|e| anyhow::anyhow!("Failed to initialize logger: {}", e))?;

    Ok(())
}

/// Logs the cookies file state at application startup
///
/// The bot works without cookies; they only matter for age-gated or
/// login-only content.
pub fn log_cookies_configuration() {
    log_cookies_file(&config::COOKIES_FILE);
}

fn log_cookies_file(path: &Path) {
    log::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    log::info!("🍪 Cookies Configuration Check");

    if !path.exists() {
        log::info!("⚪ COOKIES_FILE: {} (not present)", path.display());
        log::info!("   Upload cookies.txt to the bot or use /add to enable authenticated downloads");
    } else {
        match std::fs::read_to_string(path) {
            Ok(contents) => match validate_cookie_file(&contents) {
                Ok(()) => log::info!("✅ COOKIES_FILE: {} will be passed to yt-dlp", path.display()),
                Err(reason) => {
                    log::warn!("⚠️  COOKIES_FILE: {} looks invalid: {}", path.display(), reason);
                    log::warn!("   yt-dlp may reject it; remove it with /rm and upload a fresh export");
                }
            },
            Err(e) => log::error!("❌ COOKIES_FILE: {} cannot be read: {}", path.display(), e),
        }
    }

    log::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
}
