//! Core utilities, configuration, and common functionality

pub mod config;
pub mod error;
pub mod logging;
pub mod utils;

// Re-exports for convenience
pub use error::{AppError, AppResult};
pub use logging::{init_logger, log_cookies_configuration};
pub use utils::{extract_retry_after, format_duration, human_bytes, parse_range_string, sanitize_title, truncate};
