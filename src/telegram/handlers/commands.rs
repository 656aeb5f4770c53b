//! Command handler implementations (/start, /help, /cancel, /add, /rm)

use indoc::indoc;
use teloxide::prelude::*;
use teloxide::types::Message;

use super::types::{HandlerDeps, HandlerError};
use crate::telegram::Bot;

const WELCOME: &str = indoc! {"
    👋 Hi! Send me a link to a video and I will fetch it for you.

    Pick video or audio, choose a format, and I will upload the file here.
    Send /help for details."};

const HELP: &str = indoc! {"
    ℹ️ How to use:
    1. Send a link (YouTube and most sites supported by yt-dlp).
    2. Choose 🎥 Video or 🎧 Audio.
    3. Pick a format, or ⭐ Best.

    Playlists: send the playlist link, then a range like 1-5,8 (0 = all) and a resolution.

    /cancel stops the running download.
    /add explains how to upload cookies.txt for login-only content, /rm removes it."};

const ADD_COOKIES: &str = indoc! {"
    🍪 Send a file named cookies.txt exported from your browser in Netscape format.
    It is passed to yt-dlp for age-gated or login-only content."};

const NOT_ALLOWED: &str = "⛔ Only bot admins can manage cookies.";

pub(super) async fn handle_start_command(bot: &Bot, msg: &Message) -> Result<(), HandlerError> {
    bot.send_message(msg.chat.id, WELCOME).await?;
    Ok(())
}

pub(super) async fn handle_help_command(bot: &Bot, msg: &Message) -> Result<(), HandlerError> {
    bot.send_message(msg.chat.id, HELP).await?;
    Ok(())
}

/// Cancels the chat's running job and forgets a half-finished playlist dialog.
pub(super) async fn handle_cancel_command(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> Result<(), HandlerError> {
    let dropped_dialog = deps.playlists.take(msg.chat.id).await.is_some();
    let cancelled = deps.sessions.cancel(msg.chat.id);

    let reply = if cancelled || dropped_dialog {
        "❌ Download cancelled."
    } else {
        "⚠️ Nothing is running."
    };
    bot.send_message(msg.chat.id, reply).await?;
    Ok(())
}

pub(super) async fn handle_add_command(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> Result<(), HandlerError> {
    let reply = if deps.can_manage_cookies(msg) {
        ADD_COOKIES
    } else {
        NOT_ALLOWED
    };
    bot.send_message(msg.chat.id, reply).await?;
    Ok(())
}

pub(super) async fn handle_rm_command(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> Result<(), HandlerError> {
    if !deps.can_manage_cookies(msg) {
        bot.send_message(msg.chat.id, NOT_ALLOWED).await?;
        return Ok(());
    }

    let reply = match deps.cookies.remove().await {
        Ok(true) => "🗑 Cookies removed.".to_string(),
        Ok(false) => "⚠️ No cookies file to remove.".to_string(),
        Err(e) => {
            log::error!("Failed to remove cookies file: {}", e);
            format!("❌ Could not remove cookies: {}", e)
        }
    };
    bot.send_message(msg.chat.id, reply).await?;
    Ok(())
}
