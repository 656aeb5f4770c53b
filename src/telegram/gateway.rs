//! The slice of the Bot API used by download jobs.
//!
//! Jobs talk to Telegram only through [`ChatGateway`], which keeps the pipeline
//! and the status relay testable without a bot token.

use std::path::PathBuf;

use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{InputFile, MessageId};
use teloxide::RequestError;

use crate::core::error::AppResult;
use crate::core::utils::truncate;
use crate::download::error::JobError;
use crate::download::models::MediaKind;
use crate::download::progress::ProgressSink;
use crate::download::send::input_file_with_progress;
use crate::telegram::Bot;

/// A finished artifact ready to be sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaUpload {
    pub path: PathBuf,
    pub file_name: String,
    pub caption: String,
    pub title: String,
    pub thumbnail: Option<PathBuf>,
    pub kind: MediaKind,
    pub size: u64,
}

#[async_trait]
pub trait ChatGateway: Send + Sync {
    async fn send_text(&self, chat_id: ChatId, text: &str) -> AppResult<MessageId>;

    /// Replaces the text of a message. An unchanged text is not an error.
    async fn edit_text(&self, chat_id: ChatId, message_id: MessageId, text: &str) -> AppResult<()>;

    async fn delete_message(&self, chat_id: ChatId, message_id: MessageId) -> AppResult<()>;

    /// Uploads the artifact, reporting read progress to `sink`.
    async fn send_media(&self, chat_id: ChatId, upload: MediaUpload, sink: ProgressSink) -> Result<(), JobError>;
}

fn is_not_modified(err: &RequestError) -> bool {
    err.to_string().contains("message is not modified")
}

/// Maps an upload failure onto the job error taxonomy.
fn upload_error(err: &RequestError, size: u64, limit: u64) -> JobError {
    let text = err.to_string();
    let lower = text.to_lowercase();
    if lower.contains("too large") || lower.contains("too big") {
        return JobError::SizeLimit { size, limit };
    }
    JobError::Network(truncate(text.lines().next().unwrap_or("upload failed"), 300))
}

/// [`ChatGateway`] backed by a real bot.
#[derive(Clone)]
pub struct TelegramGateway {
    bot: Bot,
    max_upload_bytes: u64,
}

impl TelegramGateway {
    pub fn new(bot: Bot, max_upload_bytes: u64) -> Self {
        Self { bot, max_upload_bytes }
    }
}

#[async_trait]
impl ChatGateway for TelegramGateway {
    async fn send_text(&self, chat_id: ChatId, text: &str) -> AppResult<MessageId> {
        let message = self.bot.send_message(chat_id, text).await?;
        Ok(message.id)
    }

    async fn edit_text(&self, chat_id: ChatId, message_id: MessageId, text: &str) -> AppResult<()> {
        match self.bot.edit_message_text(chat_id, message_id, text).await {
            Ok(_) => Ok(()),
            Err(e) if is_not_modified(&e) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete_message(&self, chat_id: ChatId, message_id: MessageId) -> AppResult<()> {
        self.bot.delete_message(chat_id, message_id).await?;
        Ok(())
    }

    async fn send_media(&self, chat_id: ChatId, upload: MediaUpload, sink: ProgressSink) -> Result<(), JobError> {
        let input = input_file_with_progress(&upload.path, &upload.file_name, sink).await?;
        log::info!(
            "Uploading {} ({} bytes) to chat {}",
            upload.file_name,
            upload.size,
            chat_id
        );

        let result = match upload.kind {
            MediaKind::Video => {
                let mut request = self
                    .bot
                    .send_video(chat_id, input)
                    .caption(upload.caption.clone())
                    .supports_streaming(true);
                if let Some(thumbnail) = &upload.thumbnail {
                    request = request.thumbnail(InputFile::file(thumbnail.clone()));
                }
                request.await.map(|_| ())
            }
            MediaKind::Audio => {
                let mut request = self
                    .bot
                    .send_audio(chat_id, input)
                    .caption(upload.caption.clone())
                    .title(upload.title.clone());
                if let Some(thumbnail) = &upload.thumbnail {
                    request = request.thumbnail(InputFile::file(thumbnail.clone()));
                }
                request.await.map(|_| ())
            }
        };

        result.map_err(|e| {
            log::error!("Upload of {} failed: {}", upload.file_name, e);
            upload_error(&e, upload.size, self.max_upload_bytes)
        })
    }
}
