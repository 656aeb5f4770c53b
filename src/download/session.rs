//! Per-chat single-flight registry.
//!
//! At most one job runs per chat. Starting a second one while the first is
//! active fails with [`SessionError::Busy`]; the entry disappears when the
//! owning [`Job`] is dropped.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use teloxide::types::ChatId;
use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::download::job::Job;
use crate::download::models::MediaRequest;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("chat {0} already has a download running")]
    Busy(ChatId),
}

/// Registry entry of a running job.
#[derive(Debug, Clone)]
pub struct ActiveJob {
    pub job_id: Uuid,
    pub cancel: CancellationToken,
    pub started_at: Instant,
}

#[derive(Debug, Clone, Default)]
pub struct SessionRegistry {
    active: Arc<DashMap<ChatId, ActiveJob>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new job for `chat_id` unless one is already running.
    pub fn begin(&self, chat_id: ChatId, request: MediaRequest) -> Result<Job, SessionError> {
        match self.active.entry(chat_id) {
            Entry::Occupied(_) => {
                log::info!("Chat {} is busy, rejecting new job", chat_id);
                Err(SessionError::Busy(chat_id))
            }
            Entry::Vacant(slot) => {
                let job_id = Uuid::new_v4();
                let cancel = CancellationToken::new();
                slot.insert(ActiveJob {
                    job_id,
                    cancel: cancel.clone(),
                    started_at: Instant::now(),
                });
                log::info!("Job {} started for chat {}", job_id, chat_id);
                Ok(Job::new(job_id, chat_id, request, cancel, self.clone()))
            }
        }
    }

    /// Requests cancellation of the chat's running job. Returns false when idle.
    pub fn cancel(&self, chat_id: ChatId) -> bool {
        match self.active.get(&chat_id) {
            Some(active) => {
                log::info!("Cancelling job {} for chat {}", active.job_id, chat_id);
                active.cancel.cancel();
                true
            }
            None => false,
        }
    }

    pub fn is_active(&self, chat_id: ChatId) -> bool {
        self.active.contains_key(&chat_id)
    }

    pub fn lookup(&self, chat_id: ChatId) -> Option<ActiveJob> {
        self.active.get(&chat_id).map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    /// Drops the entry for `chat_id` only if it still belongs to `job_id`.
    pub(crate) fn remove(&self, chat_id: ChatId, job_id: Uuid) {
        if self.active.remove_if(&chat_id, |_, active| active.job_id == job_id).is_some() {
            log::debug!("Job {} for chat {} left the registry", job_id, chat_id);
        }
    }
}
