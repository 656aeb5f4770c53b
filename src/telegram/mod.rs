//! Telegram bot integration and handlers

pub mod bot;
pub mod cache;
pub mod gateway;
pub mod handlers;
pub mod preview;

use teloxide::types::InlineKeyboardButton;

pub type Bot = teloxide::Bot;

// Re-exports for convenience
pub use bot::{create_bot, setup_bot_commands, Command};
pub use cache::{CachedLink, LinkCache, PlaylistSelections};
pub use gateway::{ChatGateway, MediaUpload, TelegramGateway};
pub use handlers::{schema, HandlerDeps, HandlerError};

/// Inline button carrying callback data.
pub fn cb(text: impl Into<String>, data: impl Into<String>) -> InlineKeyboardButton {
    InlineKeyboardButton::callback(text.into(), data.into())
}
