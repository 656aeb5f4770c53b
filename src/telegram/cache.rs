//! TTL caches backing inline menus and playlist selections.

use std::sync::Arc;

use moka::future::Cache;
use teloxide::types::ChatId;
use url::Url;
use uuid::Uuid;

use crate::core::config;
use crate::download::models::{MediaInfo, PlaylistEntry};

/// A resolved link, referenced from callback data by its cache key.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedLink {
    pub url: Url,
    pub info: MediaInfo,
}

/// Resolved links keyed by a short random id.
#[derive(Clone)]
pub struct LinkCache {
    inner: Cache<String, Arc<CachedLink>>,
}

impl LinkCache {
    pub fn new() -> Self {
        Self {
            inner: Cache::builder()
                .max_capacity(config::cache::LINK_CAPACITY)
                .time_to_live(config::cache::link_ttl())
                .build(),
        }
    }

    /// Stores `link` and returns the key to put into callback data.
    pub async fn insert(&self, link: CachedLink) -> String {
        let key = Uuid::new_v4().simple().to_string();
        self.inner.insert(key.clone(), Arc::new(link)).await;
        key
    }

    pub async fn get(&self, key: &str) -> Option<Arc<CachedLink>> {
        self.inner.get(key).await
    }
}

impl Default for LinkCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Where a chat is in the playlist dialog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaylistStage {
    /// Playlist found, waiting for a range message
    AwaitingRange,
    /// Range chosen, waiting for a resolution button
    AwaitingResolution(Vec<PlaylistEntry>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingPlaylist {
    pub title: String,
    pub entries: Vec<PlaylistEntry>,
    pub stage: PlaylistStage,
}

/// Pending playlist dialogs, one per chat.
#[derive(Clone)]
pub struct PlaylistSelections {
    inner: Cache<ChatId, PendingPlaylist>,
}

impl PlaylistSelections {
    pub fn new() -> Self {
        Self {
            inner: Cache::builder()
                .time_to_live(config::playlist::selection_ttl())
                .build(),
        }
    }

    pub async fn put(&self, chat_id: ChatId, pending: PendingPlaylist) {
        self.inner.insert(chat_id, pending).await;
    }

    pub async fn get(&self, chat_id: ChatId) -> Option<PendingPlaylist> {
        self.inner.get(&chat_id).await
    }

    /// Removes and returns the chat's dialog.
    pub async fn take(&self, chat_id: ChatId) -> Option<PendingPlaylist> {
        self.inner.remove(&chat_id).await
    }
}

impl Default for PlaylistSelections {
    fn default() -> Self {
        Self::new()
    }
}
