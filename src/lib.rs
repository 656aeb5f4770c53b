//! Clipdrop - Telegram bot that downloads videos and audio through yt-dlp
//!
//! A user pastes a link, picks video or audio and a format, and the bot
//! downloads the file while editing a status message with progress.
//!
//! # Module Structure
//!
//! - `core`: configuration, errors, logging and shared helpers
//! - `download`: extraction backend, download jobs, progress relay and delivery
//! - `telegram`: bot setup, gateway and update handlers
//! - `cli`: command line entry points

#![allow(clippy::too_many_arguments)]

pub mod cli;
pub mod core;
pub mod download;
pub mod telegram;

// Re-export commonly used types for convenience
pub use core::{config, AppError, AppResult};
pub use download::{JobContext, JobError, MediaBackend, SessionRegistry};
pub use telegram::{schema, ChatGateway, HandlerDeps};
