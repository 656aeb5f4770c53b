//! Text messages: links to resolve and playlist range replies.

use once_cell::sync::Lazy;
use regex::Regex;
use teloxide::prelude::*;
use teloxide::types::Message;
use url::Url;

use super::types::{HandlerDeps, HandlerError};
use crate::core::config;
use crate::core::utils::parse_range_string;
use crate::download::models::Resolved;
use crate::telegram::cache::{CachedLink, PendingPlaylist, PlaylistStage};
use crate::telegram::preview::{kind_keyboard, resolution_keyboard};
use crate::telegram::Bot;

static URL_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"https?://[^\s<>"']+"#).expect("Failed to compile URL regex"));

/// First http(s) link in `text`, if it parses and is not absurdly long.
pub(crate) fn extract_url(text: &str) -> Option<Url> {
    let candidate = URL_REGEX.find(text)?.as_str();
    if candidate.len() > config::validation::MAX_URL_LENGTH {
        return None;
    }
    Url::parse(candidate).ok()
}

/// Playlist entries picked by a range reply, by position in the listing.
pub(crate) fn select_entries<T: Clone>(entries: &[T], range: &str) -> Vec<T> {
    parse_range_string(range, entries.len())
        .into_iter()
        .filter_map(|position| entries.get(position - 1).cloned())
        .collect()
}

pub(super) async fn handle_text_message(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> Result<(), HandlerError> {
    let Some(text) = msg.text() else {
        return Ok(());
    };

    if let Some(url) = extract_url(text) {
        return handle_link(bot, msg, deps, url).await;
    }

    match deps.playlists.get(msg.chat.id).await {
        Some(pending) if pending.stage == PlaylistStage::AwaitingRange => {
            handle_range_reply(bot, msg, deps, pending, text).await
        }
        _ => {
            bot.send_message(msg.chat.id, "🔗 Send me a link to download.").await?;
            Ok(())
        }
    }
}

async fn handle_link(bot: &Bot, msg: &Message, deps: &HandlerDeps, url: Url) -> Result<(), HandlerError> {
    let chat_id = msg.chat.id;
    if deps.sessions.is_active(chat_id) {
        bot.send_message(chat_id, "⏳ A download is already running. Send /cancel to stop it.")
            .await?;
        return Ok(());
    }

    log::info!("Resolving {} for chat {}", url, chat_id);
    let status = bot.send_message(chat_id, "🔍 Fetching info...").await?;

    match deps.jobs.backend.resolve(&url).await {
        Ok(Resolved::Single(info)) => {
            let key = deps.links.insert(CachedLink { url, info }).await;
            bot.edit_message_text(chat_id, status.id, "📦 What do you want to download?")
                .reply_markup(kind_keyboard(&key))
                .await?;
        }
        Ok(Resolved::Playlist(playlist)) => {
            if playlist.entries.is_empty() {
                bot.edit_message_text(chat_id, status.id, "❌ This playlist is empty.")
                    .await?;
                return Ok(());
            }
            let prompt = format!(
                "📁 Playlist with {} videos found.\n\nSend the numbers to download, e.g. 1-5,8 (0 = all).\nUp to {} videos per request.",
                playlist.entries.len(),
                config::playlist::MAX_ITEMS
            );
            deps.playlists
                .put(
                    chat_id,
                    PendingPlaylist {
                        title: playlist.title,
                        entries: playlist.entries,
                        stage: PlaylistStage::AwaitingRange,
                    },
                )
                .await;
            bot.edit_message_text(chat_id, status.id, prompt).await?;
        }
        Err(err) => {
            log::warn!("Resolve failed for chat {}: {}", chat_id, err);
            bot.edit_message_text(chat_id, status.id, err.user_message()).await?;
        }
    }
    Ok(())
}

async fn handle_range_reply(
    bot: &Bot,
    msg: &Message,
    deps: &HandlerDeps,
    pending: PendingPlaylist,
    text: &str,
) -> Result<(), HandlerError> {
    let chat_id = msg.chat.id;
    let selected = select_entries(&pending.entries, text);
    if selected.is_empty() {
        bot.send_message(chat_id, "❌ Invalid range. Try something like 1-5,8 or 0 for all.")
            .await?;
        return Ok(());
    }

    if selected.len() > config::playlist::MAX_ITEMS {
        bot.send_message(
            chat_id,
            format!(
                "⚠️ {} videos selected, only the first {} will be downloaded.",
                selected.len(),
                config::playlist::MAX_ITEMS
            ),
        )
        .await?;
    }

    deps.playlists
        .put(
            chat_id,
            PendingPlaylist {
                stage: PlaylistStage::AwaitingResolution(selected),
                ..pending
            },
        )
        .await;
    bot.send_message(chat_id, "🎚 Choose resolution:")
        .reply_markup(resolution_keyboard())
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_extract_url_from_text() {
        let url = extract_url("look at this https://youtu.be/abc?t=10 !").unwrap();
        assert_eq!(url.as_str(), "https://youtu.be/abc?t=10");
        assert!(extract_url("no links here").is_none());
        assert!(extract_url("ftp://example.com/file").is_none());
    }

    #[test]
    fn test_extract_url_rejects_huge_links() {
        let long = format!("https://example.com/{}", "a".repeat(config::validation::MAX_URL_LENGTH));
        assert!(extract_url(&long).is_none());
    }

    #[test]
    fn test_select_entries_by_position() {
        let entries = vec!["a", "b", "c", "d"];
        assert_eq!(select_entries(&entries, "2-3"), vec!["b", "c"]);
        assert_eq!(select_entries(&entries, "0"), entries);
        assert!(select_entries(&entries, "9").is_empty());
        assert!(select_entries(&entries, "x").is_empty());
    }
}
