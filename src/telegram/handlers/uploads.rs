//! cookies.txt document uploads

use teloxide::net::Download;
use teloxide::prelude::*;
use teloxide::types::{Document, Message};

use super::types::{HandlerDeps, HandlerError};
use crate::core::config;
use crate::core::error::AppError;
use crate::telegram::Bot;

const COOKIES_FILE_NAME: &str = "cookies.txt";

/// Whether `doc` looks like a cookies export the bot should take.
pub(super) fn is_cookies_document(doc: &Document) -> bool {
    doc.file_name
        .as_deref()
        .is_some_and(|name| name.eq_ignore_ascii_case(COOKIES_FILE_NAME))
}

/// Handler for documents named cookies.txt
pub(super) async fn handle_cookies_upload(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> Result<(), HandlerError> {
    let chat_id = msg.chat.id;
    let Some(doc) = msg.document() else {
        return Ok(());
    };

    if !deps.can_manage_cookies(msg) {
        bot.send_message(chat_id, "⛔ Only bot admins can manage cookies.").await?;
        return Ok(());
    }

    if doc.file.size > config::validation::MAX_COOKIES_FILE_BYTES {
        bot.send_message(chat_id, "❌ This file is too large for a cookies export.")
            .await?;
        return Ok(());
    }

    let file = bot.get_file(doc.file.id.clone()).await?;
    let mut contents = Vec::with_capacity(doc.file.size as usize);
    bot.download_file(&file.path, &mut contents).await?;

    let reply = match deps.cookies.install(&contents).await {
        Ok(()) => "✅ Cookies saved. They will be used for the next downloads.".to_string(),
        Err(AppError::Validation(reason)) => format!("❌ This is not a valid cookies file: {}", reason),
        Err(e) => {
            log::error!("Failed to store cookies from chat {}: {}", chat_id, e);
            "❌ Could not save the cookies file.".to_string()
        }
    };
    bot.send_message(chat_id, reply).await?;
    Ok(())
}
