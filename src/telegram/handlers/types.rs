//! Handler types and dependencies

use std::sync::Arc;

use teloxide::types::Message;

use crate::download::cookies::CookieStore;
use crate::download::pipeline::JobContext;
use crate::download::session::SessionRegistry;
use crate::telegram::cache::{LinkCache, PlaylistSelections};

/// Error type for handlers
pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Dependencies required by handlers
#[derive(Clone)]
pub struct HandlerDeps {
    pub jobs: JobContext,
    pub sessions: SessionRegistry,
    pub links: LinkCache,
    pub playlists: PlaylistSelections,
    pub cookies: CookieStore,
    /// Users allowed to manage cookies; empty means everyone
    pub admin_ids: Arc<Vec<u64>>,
}

impl HandlerDeps {
    /// Create new handler dependencies
    pub fn new(jobs: JobContext, cookies: CookieStore, admin_ids: Vec<u64>) -> Self {
        Self {
            jobs,
            sessions: SessionRegistry::new(),
            links: LinkCache::new(),
            playlists: PlaylistSelections::new(),
            cookies,
            admin_ids: Arc::new(admin_ids),
        }
    }

    /// Whether the sender of `msg` may add or remove cookies.
    pub fn can_manage_cookies(&self, msg: &Message) -> bool {
        if self.admin_ids.is_empty() {
            return true;
        }
        msg.from
            .as_ref()
            .is_some_and(|user| self.admin_ids.contains(&user.id.0))
    }
}
