//! Telegram bot handler tree configuration
//!
//! This module provides the main dispatcher schema for the Telegram bot.

mod callbacks;
mod commands;
mod links;
mod schema;
mod types;
mod uploads;

pub use schema::schema;
pub use types::{HandlerDeps, HandlerError};
