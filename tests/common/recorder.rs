//! Recording chat gateway
//!
//! Captures every call the pipeline makes instead of talking to Telegram.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use teloxide::types::{ChatId, MessageId};

use clipdrop::core::{AppError, AppResult};
use clipdrop::download::{JobError, ProgressSink};
use clipdrop::telegram::{ChatGateway, MediaUpload};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayCall {
    Send(String),
    Edit(String),
    Delete(MessageId),
    Upload(MediaUpload),
}

#[derive(Clone, Default)]
pub struct RecordingGateway {
    calls: Arc<Mutex<Vec<GatewayCall>>>,
    edit_attempts: Arc<AtomicUsize>,
    failing_edits: Arc<AtomicUsize>,
    failing_upload: Arc<Mutex<Option<JobError>>>,
    next_message_id: Arc<AtomicUsize>,
}

impl RecordingGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `n` edits fail with a rate limit error.
    pub fn fail_next_edits(&self, n: usize) {
        self.failing_edits.store(n, Ordering::SeqCst);
    }

    /// Makes the next upload fail with `err` after its bytes were streamed.
    pub fn fail_next_upload(&self, err: JobError) {
        *self.failing_upload.lock().unwrap() = Some(err);
    }

    pub fn calls(&self) -> Vec<GatewayCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Texts of successful edits, in order.
    pub fn edits(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                GatewayCall::Edit(text) => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn edit_attempts(&self) -> usize {
        self.edit_attempts.load(Ordering::SeqCst)
    }

    pub fn sent(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                GatewayCall::Send(text) => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn uploads(&self) -> Vec<MediaUpload> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                GatewayCall::Upload(upload) => Some(upload),
                _ => None,
            })
            .collect()
    }

    pub fn deleted(&self) -> Vec<MessageId> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                GatewayCall::Delete(id) => Some(id),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: GatewayCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl ChatGateway for RecordingGateway {
    async fn send_text(&self, _chat_id: ChatId, text: &str) -> AppResult<MessageId> {
        self.record(GatewayCall::Send(text.to_string()));
        let id = 1000 + self.next_message_id.fetch_add(1, Ordering::SeqCst);
        Ok(MessageId(id as i32))
    }

    async fn edit_text(&self, _chat_id: ChatId, _message_id: MessageId, text: &str) -> AppResult<()> {
        self.edit_attempts.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .failing_edits
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(AppError::Validation("Too Many Requests: retry after 1".to_string()));
        }
        self.record(GatewayCall::Edit(text.to_string()));
        Ok(())
    }

    async fn delete_message(&self, _chat_id: ChatId, message_id: MessageId) -> AppResult<()> {
        self.record(GatewayCall::Delete(message_id));
        Ok(())
    }

    async fn send_media(&self, _chat_id: ChatId, upload: MediaUpload, sink: ProgressSink) -> Result<(), JobError> {
        sink.add_bytes(upload.size);
        if let Some(err) = self.failing_upload.lock().unwrap().take() {
            return Err(err);
        }
        self.record(GatewayCall::Upload(upload));
        Ok(())
    }
}
