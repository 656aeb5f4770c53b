//! Shared fixtures: a temp root for scratch dirs and a ready job context.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use teloxide::types::{ChatId, MessageId};
use url::Url;

use clipdrop::download::pipeline::PipelineSettings;
use clipdrop::download::thumbnail::ThumbnailFetcher;
use clipdrop::download::{JobContext, MediaKind, MediaRequest, RelaySettings};

use super::backend::FakeBackend;
use super::recorder::RecordingGateway;

pub const CHAT: ChatId = ChatId(42);
pub const STATUS: MessageId = MessageId(7);

pub const GIB: u64 = 1024 * 1024 * 1024;

/// Owns the directory scratch dirs are created in.
pub struct TestEnvironment {
    root: tempfile::TempDir,
}

impl TestEnvironment {
    pub fn new() -> Self {
        Self {
            root: tempfile::tempdir().unwrap(),
        }
    }

    pub fn temp_root(&self) -> &Path {
        self.root.path()
    }

    /// Everything left inside the temp root.
    pub fn leftovers(&self) -> Vec<PathBuf> {
        std::fs::read_dir(self.root.path())
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .collect()
    }
}

pub fn relay_settings(interval: Duration) -> RelaySettings {
    RelaySettings {
        interval,
        backoff: interval / 2,
        max_backoff: interval * 5,
    }
}

pub fn job_context(
    env: &TestEnvironment,
    backend: &FakeBackend,
    gateway: &RecordingGateway,
    max_upload_bytes: u64,
    relay: RelaySettings,
) -> JobContext {
    JobContext {
        backend: Arc::new(backend.clone()),
        gateway: Arc::new(gateway.clone()),
        thumbnails: ThumbnailFetcher::new(reqwest::Client::new(), None),
        settings: Arc::new(PipelineSettings {
            temp_root: env.temp_root().to_path_buf(),
            relay,
            max_upload_bytes,
        }),
    }
}

pub fn media_request(kind: MediaKind, title: &str) -> MediaRequest {
    MediaRequest {
        source_url: Url::parse("https://www.youtube.com/watch?v=dQw4w9WgXcQ").unwrap(),
        selector: "22".to_string(),
        kind,
        quality: "720p".to_string(),
        title: title.to_string(),
        thumbnail_url: None,
        estimated_size: None,
        playlist_index: None,
    }
}
