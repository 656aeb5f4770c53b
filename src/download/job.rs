//! A single download job and its lifecycle.
//!
//! States move strictly forward:
//! Pending → Downloading → (Merging) → Ready → Uploaded, with Failed and
//! Cancelled reachable from any non-terminal state. Cancellation is
//! cooperative: the pipeline calls [`Job::checkpoint`] between phases.

use strum::Display;
use teloxide::types::ChatId;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::download::error::JobError;
use crate::download::models::MediaRequest;
use crate::download::session::SessionRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum JobState {
    Pending,
    Downloading,
    Merging,
    Ready,
    Uploaded,
    Failed,
    Cancelled,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Uploaded | JobState::Failed | JobState::Cancelled)
    }

    pub fn can_advance_to(self, next: JobState) -> bool {
        use JobState::*;
        match (self, next) {
            (Pending, Downloading) => true,
            (Downloading, Merging) | (Downloading, Ready) => true,
            (Merging, Ready) => true,
            (Ready, Uploaded) => true,
            (from, Failed) | (from, Cancelled) => !from.is_terminal(),
            _ => false,
        }
    }
}

/// A registered job. Dropping it frees the chat's slot in the registry.
#[derive(Debug)]
pub struct Job {
    id: Uuid,
    chat_id: ChatId,
    request: MediaRequest,
    state: JobState,
    cancel: CancellationToken,
    registry: SessionRegistry,
}

impl Job {
    pub(crate) fn new(
        id: Uuid,
        chat_id: ChatId,
        request: MediaRequest,
        cancel: CancellationToken,
        registry: SessionRegistry,
    ) -> Self {
        Self {
            id,
            chat_id,
            request,
            state: JobState::Pending,
            cancel,
            registry,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn chat_id(&self) -> ChatId {
        self.chat_id
    }

    pub fn request(&self) -> &MediaRequest {
        &self.request
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Fails with [`JobError::Cancelled`] once the user asked to stop.
    pub fn checkpoint(&self) -> Result<(), JobError> {
        if self.is_cancelled() {
            log::info!("Job {} hit a cancellation checkpoint in state {}", self.id, self.state);
            return Err(JobError::Cancelled);
        }
        Ok(())
    }

    /// Moves to `next`; invalid transitions are logged and ignored.
    pub fn advance(&mut self, next: JobState) {
        if self.state.can_advance_to(next) {
            log::debug!("Job {}: {} -> {}", self.id, self.state, next);
            self.state = next;
        } else {
            log::warn!("Job {}: ignoring transition {} -> {}", self.id, self.state, next);
        }
    }

    /// Reuses this job for the next playlist item.
    ///
    /// Allowed after an item finished (or before the first one) as long as the
    /// job was not cancelled.
    pub fn restart_with(&mut self, request: MediaRequest) -> Result<(), JobError> {
        self.checkpoint()?;
        match self.state {
            JobState::Pending | JobState::Uploaded | JobState::Failed => {
                self.request = request;
                self.state = JobState::Pending;
                Ok(())
            }
            other => {
                log::warn!("Job {}: cannot restart from {}", self.id, other);
                Err(JobError::Cancelled)
            }
        }
    }

    /// Token for helpers that must stop together with the job.
    pub fn child_token(&self) -> CancellationToken {
        self.cancel.child_token()
    }
}

impl Drop for Job {
    fn drop(&mut self) {
        self.registry.remove(self.chat_id, self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::download::models::MediaKind;
    use url::Url;

    fn request(title: &str) -> MediaRequest {
        MediaRequest {
            source_url: Url::parse("https://example.com/v").unwrap(),
            selector: "best".into(),
            kind: MediaKind::Audio,
            quality: "128kbps".into(),
            title: title.into(),
            thumbnail_url: None,
            estimated_size: None,
            playlist_index: None,
        }
    }

    #[test]
    fn test_transitions() {
        use JobState::*;
        assert!(Pending.can_advance_to(Downloading));
        assert!(Downloading.can_advance_to(Merging));
        assert!(Downloading.can_advance_to(Ready));
        assert!(Ready.can_advance_to(Uploaded));
        assert!(Merging.can_advance_to(Cancelled));
        assert!(!Pending.can_advance_to(Ready));
        assert!(!Ready.can_advance_to(Downloading));
        assert!(!Uploaded.can_advance_to(Failed));
        assert!(!Cancelled.can_advance_to(Failed));
    }

    #[test]
    fn test_advance_ignores_invalid_transition() {
        let registry = SessionRegistry::new();
        let mut job = registry.begin(ChatId(1), request("a")).unwrap();
        job.advance(JobState::Uploaded);
        assert_eq!(job.state(), JobState::Pending);
        job.advance(JobState::Downloading);
        job.advance(JobState::Ready);
        assert_eq!(job.state(), JobState::Ready);
    }

    #[test]
    fn test_checkpoint_and_child_token() {
        let registry = SessionRegistry::new();
        let job = registry.begin(ChatId(1), request("a")).unwrap();
        let child = job.child_token();
        assert!(job.checkpoint().is_ok());

        registry.cancel(ChatId(1));
        assert_eq!(job.checkpoint(), Err(JobError::Cancelled));
        assert!(child.is_cancelled());
    }

    #[test]
    fn test_restart_with_for_playlist_items() {
        let registry = SessionRegistry::new();
        let mut job = registry.begin(ChatId(1), request("first")).unwrap();
        job.advance(JobState::Downloading);
        assert!(job.restart_with(request("second")).is_err());

        job.advance(JobState::Failed);
        job.restart_with(request("second")).unwrap();
        assert_eq!(job.state(), JobState::Pending);
        assert_eq!(job.request().title, "second");
    }
}
