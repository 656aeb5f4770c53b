//! Inline button presses: kind menu, format menu and playlist resolution.

use teloxide::prelude::*;
use teloxide::types::{ChatId, InlineKeyboardMarkup, MessageId};

use super::types::{HandlerDeps, HandlerError};
use crate::download::error::JobError;
use crate::download::job::Job;
use crate::download::models::{MediaKind, MediaRequest};
use crate::download::pipeline::run_single;
use crate::download::playlist::{run_playlist, PlaylistPlan};
use crate::download::session::SessionRegistry;
use crate::telegram::cache::{CachedLink, PlaylistSelections, PlaylistStage};
use crate::telegram::preview::{
    best_selector, format_keyboard, present_formats, CallbackAction, FormatChoice, FormatOption,
};
use crate::telegram::Bot;

const BUSY: &str = "⏳ A download is already running. Send /cancel to stop it.";
const EXPIRED: &str = "⌛ This menu has expired. Send the link again.";
const PLAYLIST_EXPIRED: &str = "⌛ Playlist session expired. Send the link again.";

/// Builds the request for a menu choice, recomputing the menu from the cache.
pub(crate) fn build_request(link: &CachedLink, kind: MediaKind, choice: FormatChoice) -> Result<MediaRequest, JobError> {
    let (selector, quality, estimated_size) = match choice {
        FormatChoice::Best => (best_selector(kind).to_string(), "Best".to_string(), None),
        FormatChoice::Index(index) => {
            let options = present_formats(&link.info.formats, kind);
            let option: &FormatOption = options
                .get(index)
                .ok_or_else(|| JobError::UnsupportedFormat(format!("menu entry {} no longer exists", index)))?;
            (option.selector()?, option.quality.clone(), option.approx_size)
        }
    };

    let title = if link.info.title.is_empty() {
        link.url.to_string()
    } else {
        link.info.title.clone()
    };

    Ok(MediaRequest {
        source_url: link.url.clone(),
        selector,
        kind,
        quality,
        title,
        thumbnail_url: link.info.thumbnail.clone(),
        estimated_size,
        playlist_index: None,
    })
}

pub(super) async fn handle_callback(bot: &Bot, q: &CallbackQuery, deps: &HandlerDeps) -> Result<(), HandlerError> {
    bot.answer_callback_query(q.id.clone()).await?;

    let Some((chat_id, message_id)) = q.message.as_ref().map(|m| (m.chat().id, m.id())) else {
        return Ok(());
    };
    let Some(action) = q.data.as_deref().and_then(CallbackAction::parse) else {
        log::warn!("Unknown callback data from chat {}: {:?}", chat_id, q.data);
        return Ok(());
    };
    log::debug!("Callback {:?} from chat {}", action, chat_id);

    match action {
        CallbackAction::Kind { link, kind } => show_formats(bot, deps, chat_id, message_id, &link, kind).await,
        CallbackAction::Download { link, kind, choice } => {
            start_download(bot, deps, chat_id, message_id, &link, kind, choice).await
        }
        CallbackAction::PlaylistResolution { height } => start_playlist(bot, deps, chat_id, message_id, height).await,
    }
}

async fn show_formats(
    bot: &Bot,
    deps: &HandlerDeps,
    chat_id: ChatId,
    message_id: MessageId,
    link: &str,
    kind: MediaKind,
) -> Result<(), HandlerError> {
    let Some(cached) = deps.links.get(link).await else {
        bot.edit_message_text(chat_id, message_id, EXPIRED).await?;
        return Ok(());
    };

    let options = present_formats(&cached.info.formats, kind);
    let text = if options.is_empty() {
        "🎚 No separate formats listed, use ⭐ Best:"
    } else {
        "🎚 Choose format:"
    };
    bot.edit_message_text(chat_id, message_id, text)
        .reply_markup(format_keyboard(link, kind, &options))
        .await?;
    Ok(())
}

async fn start_download(
    bot: &Bot,
    deps: &HandlerDeps,
    chat_id: ChatId,
    message_id: MessageId,
    link: &str,
    kind: MediaKind,
    choice: FormatChoice,
) -> Result<(), HandlerError> {
    let Some(cached) = deps.links.get(link).await else {
        bot.edit_message_text(chat_id, message_id, EXPIRED).await?;
        return Ok(());
    };

    let request = match build_request(&cached, kind, choice) {
        Ok(request) => request,
        Err(err) => {
            bot.edit_message_text(chat_id, message_id, err.user_message()).await?;
            return Ok(());
        }
    };

    let mut job = match deps.sessions.begin(chat_id, request) {
        Ok(job) => job,
        Err(_) => {
            bot.send_message(chat_id, BUSY).await?;
            return Ok(());
        }
    };

    // The menu message becomes the status message
    bot.edit_message_text(chat_id, message_id, format!("{} Starting download...", kind.emoji()))
        .reply_markup(InlineKeyboardMarkup::default())
        .await?;

    let ctx = deps.jobs.clone();
    tokio::spawn(async move {
        // the outcome is already on the status message
        if let Err(e) = run_single(&ctx, &mut job, message_id).await {
            log::debug!("Job in chat {} ended with {}: {}", chat_id, e.subcategory(), e);
        }
    });
    Ok(())
}

/// Why a resolution pick did not start a playlist run.
#[derive(Debug, PartialEq, Eq)]
enum PlaylistRefusal {
    Expired,
    EmptyRange,
    Busy,
}

/// Claims the chat's session for its pending playlist at `height`.
///
/// The pending selection is removed only once the session is claimed, so a
/// busy chat can press the button again after its current job ends.
async fn claim_playlist(
    playlists: &PlaylistSelections,
    sessions: &SessionRegistry,
    chat_id: ChatId,
    height: u32,
) -> Result<(Job, PlaylistPlan), PlaylistRefusal> {
    let pending = playlists.get(chat_id).await.ok_or(PlaylistRefusal::Expired)?;
    let PlaylistStage::AwaitingResolution(selected) = pending.stage else {
        return Err(PlaylistRefusal::Expired);
    };

    let (plan, _) = PlaylistPlan::from_selection(pending.title, selected, height);
    let first = plan
        .entries
        .first()
        .and_then(|entry| plan.request_for(entry))
        .ok_or(PlaylistRefusal::EmptyRange)?;

    let job = sessions.begin(chat_id, first).map_err(|_| PlaylistRefusal::Busy)?;
    playlists.take(chat_id).await;
    Ok((job, plan))
}

async fn start_playlist(
    bot: &Bot,
    deps: &HandlerDeps,
    chat_id: ChatId,
    message_id: MessageId,
    height: u32,
) -> Result<(), HandlerError> {
    let (mut job, plan) = match claim_playlist(&deps.playlists, &deps.sessions, chat_id, height).await {
        Ok(claimed) => claimed,
        Err(PlaylistRefusal::Expired) => {
            bot.edit_message_text(chat_id, message_id, PLAYLIST_EXPIRED).await?;
            return Ok(());
        }
        Err(PlaylistRefusal::EmptyRange) => {
            bot.edit_message_text(chat_id, message_id, "❌ Invalid range.").await?;
            return Ok(());
        }
        Err(PlaylistRefusal::Busy) => {
            bot.send_message(chat_id, BUSY).await?;
            return Ok(());
        }
    };

    bot.edit_message_text(
        chat_id,
        message_id,
        format!("📁 Downloading {} videos at {}p...", plan.entries.len(), height),
    )
    .reply_markup(InlineKeyboardMarkup::default())
    .await?;

    let ctx = deps.jobs.clone();
    tokio::spawn(async move {
        run_playlist(&ctx, &mut job, message_id, &plan).await;
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::download::models::{MediaInfo, PlaylistEntry, RawFormat};
    use crate::telegram::cache::PendingPlaylist;
    use url::Url;

    fn link() -> CachedLink {
        CachedLink {
            url: Url::parse("https://example.com/watch?v=1").unwrap(),
            info: MediaInfo {
                title: "Clip".into(),
                formats: vec![
                    RawFormat {
                        format_id: "18".into(),
                        ext: "mp4".into(),
                        vcodec: Some("avc1".into()),
                        acodec: Some("mp4a".into()),
                        height: Some(360),
                        filesize: Some(1000),
                        ..Default::default()
                    },
                    RawFormat {
                        format_id: "137".into(),
                        ext: "mp4".into(),
                        vcodec: Some("avc1".into()),
                        acodec: Some("none".into()),
                        height: Some(1080),
                        ..Default::default()
                    },
                ],
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_build_request_by_index() {
        let request = build_request(&link(), MediaKind::Video, FormatChoice::Index(0)).unwrap();
        assert_eq!(request.selector, "18");
        assert_eq!(request.quality, "360p");
        assert_eq!(request.estimated_size, Some(1000));
        assert_eq!(request.title, "Clip");
    }

    #[test]
    fn test_build_request_unpairable_video_only() {
        let err = build_request(&link(), MediaKind::Video, FormatChoice::Index(1)).unwrap_err();
        assert!(matches!(err, JobError::UnsupportedFormat(_)));
    }

    #[test]
    fn test_build_request_best_and_stale_index() {
        let best = build_request(&link(), MediaKind::Audio, FormatChoice::Best).unwrap();
        assert_eq!(best.selector, "bestaudio/best");
        assert_eq!(best.quality, "Best");

        assert!(build_request(&link(), MediaKind::Video, FormatChoice::Index(9)).is_err());
    }

    fn pending_playlist(range_chosen: bool) -> PendingPlaylist {
        let entries = vec![PlaylistEntry {
            index: 1,
            url: "https://example.com/watch?v=1".into(),
            title: "First".into(),
        }];
        let stage = if range_chosen {
            PlaylistStage::AwaitingResolution(entries.clone())
        } else {
            PlaylistStage::AwaitingRange
        };
        PendingPlaylist {
            title: "Mix".into(),
            entries,
            stage,
        }
    }

    #[tokio::test]
    async fn test_busy_chat_keeps_playlist_selection() {
        let playlists = PlaylistSelections::new();
        let sessions = SessionRegistry::new();
        let chat = ChatId(42);
        playlists.put(chat, pending_playlist(true)).await;

        let running = build_request(&link(), MediaKind::Audio, FormatChoice::Best).unwrap();
        let running = sessions.begin(chat, running).unwrap();

        let refused = claim_playlist(&playlists, &sessions, chat, 720).await;
        assert_eq!(refused.err(), Some(PlaylistRefusal::Busy));
        assert!(playlists.get(chat).await.is_some());

        drop(running);
        let (job, plan) = claim_playlist(&playlists, &sessions, chat, 720).await.unwrap();
        assert_eq!(job.request().playlist_index, Some(1));
        assert_eq!(plan.entries.len(), 1);
        assert!(playlists.get(chat).await.is_none());
    }

    #[tokio::test]
    async fn test_claim_playlist_before_range_is_expired() {
        let playlists = PlaylistSelections::new();
        let sessions = SessionRegistry::new();
        let chat = ChatId(42);

        let missing = claim_playlist(&playlists, &sessions, chat, 720).await;
        assert_eq!(missing.err(), Some(PlaylistRefusal::Expired));

        playlists.put(chat, pending_playlist(false)).await;
        let early = claim_playlist(&playlists, &sessions, chat, 720).await;
        assert_eq!(early.err(), Some(PlaylistRefusal::Expired));
        assert!(!sessions.is_active(chat));
    }
}
