//! Download jobs: extraction, transfer, progress relay and delivery

pub mod cookies;
pub mod error;
pub mod job;
pub mod models;
pub mod pipeline;
pub mod playlist;
pub mod progress;
pub mod relay;
pub mod send;
pub mod session;
pub mod source;
pub mod thumbnail;
pub mod ytdlp_errors;

// Re-exports for convenience
pub use cookies::CookieStore;
pub use error::JobError;
pub use job::{Job, JobState};
pub use models::{MediaInfo, MediaKind, MediaRequest, PlaylistEntry, PlaylistInfo, RawFormat, Resolved};
pub use pipeline::{JobContext, PipelineSettings};
pub use progress::{Phase, ProgressSink, ProgressSnapshot, ProgressWatch};
pub use relay::{RelayHandle, RelaySettings, StatusRelay};
pub use session::{SessionError, SessionRegistry};
pub use source::{FetchedMedia, MediaBackend};
