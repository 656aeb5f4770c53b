//! Sequential playlist downloads.
//!
//! Entries run one by one through the same item pipeline, each in its own
//! scratch dir. Oversize entries are skipped with a note, other failures are
//! reported and the next entry proceeds. Cancellation stops the loop at the
//! next entry boundary.

use teloxide::types::MessageId;
use url::Url;

use crate::core::config;
use crate::core::utils::human_bytes;
use crate::download::error::JobError;
use crate::download::job::{Job, JobState};
use crate::download::models::{MediaKind, MediaRequest, PlaylistEntry};
use crate::download::pipeline::{fail_job, process_item, JobContext};

/// A confirmed playlist selection.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaylistPlan {
    pub title: String,
    pub entries: Vec<PlaylistEntry>,
    /// Upper bound for the video height
    pub max_height: u32,
}

/// yt-dlp selector for an mp4 of at most `height` pixels.
pub fn height_selector(height: u32) -> String {
    format!(
        "b[height<={h}][ext=mp4]/bv[height<={h}][ext=mp4]+ba[ext=m4a]",
        h = height
    )
}

impl PlaylistPlan {
    /// Builds the plan from a range selection, keeping at most the configured
    /// number of entries. Returns the plan and whether entries were dropped.
    pub fn from_selection(title: String, entries: Vec<PlaylistEntry>, max_height: u32) -> (Self, bool) {
        let truncated = entries.len() > config::playlist::MAX_ITEMS;
        let entries = entries.into_iter().take(config::playlist::MAX_ITEMS).collect();
        (
            Self {
                title,
                entries,
                max_height,
            },
            truncated,
        )
    }

    /// Request for one entry; `None` when the entry URL is unusable.
    pub fn request_for(&self, entry: &PlaylistEntry) -> Option<MediaRequest> {
        let source_url = Url::parse(&entry.url).ok()?;
        Some(MediaRequest {
            source_url,
            selector: height_selector(self.max_height),
            kind: MediaKind::Video,
            quality: format!("{}p", self.max_height),
            title: entry.title.clone(),
            thumbnail_url: None,
            estimated_size: None,
            playlist_index: Some(entry.index),
        })
    }
}

/// Counters reported when the playlist ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlaylistSummary {
    pub sent: usize,
    pub skipped: usize,
    pub failed: usize,
    pub total: usize,
    pub cancelled: bool,
}

impl PlaylistSummary {
    pub fn render(&self) -> String {
        if self.cancelled {
            return format!("❌ Playlist cancelled. Sent {} of {}.", self.sent, self.total);
        }
        let mut text = format!("✅ Playlist done. Sent {} of {}.", self.sent, self.total);
        if self.skipped > 0 {
            text.push_str(&format!("\n⏭ Skipped (too large): {}", self.skipped));
        }
        if self.failed > 0 {
            text.push_str(&format!("\n⚠️ Failed: {}", self.failed));
        }
        text
    }
}

/// Downloads every entry of `plan`, reusing `job` for each of them.
///
/// `status` carries progress and finally the summary.
pub async fn run_playlist(ctx: &JobContext, job: &mut Job, status: MessageId, plan: &PlaylistPlan) -> PlaylistSummary {
    let mut summary = PlaylistSummary {
        total: plan.entries.len(),
        ..Default::default()
    };
    let chat_id = job.chat_id();
    log::info!(
        "Job {}: playlist \"{}\" with {} entries at {}p",
        job.id(),
        plan.title,
        plan.entries.len(),
        plan.max_height
    );

    for (position, entry) in plan.entries.iter().enumerate() {
        let Some(request) = plan.request_for(entry) else {
            log::warn!("Skipping playlist entry with bad URL: {}", entry.url);
            summary.failed += 1;
            continue;
        };
        if job.restart_with(request).is_err() {
            summary.cancelled = true;
            break;
        }

        let header = format!("[{}/{}] {}", position + 1, plan.entries.len(), entry.title);
        match process_item(ctx, job, status, Some(header)).await {
            Ok(()) => summary.sent += 1,
            Err(JobError::Cancelled) => {
                summary.cancelled = true;
                break;
            }
            Err(JobError::SizeLimit { size, limit }) => {
                fail_job(job, &JobError::SizeLimit { size, limit });
                summary.skipped += 1;
                let note = format!("⏭ {}. {}: skipped (over {})", entry.index, entry.title, human_bytes(limit));
                notify(ctx, job, &note).await;
            }
            Err(err) => {
                fail_job(job, &err);
                summary.failed += 1;
                let note = format!("⚠️ {}. {}\n{}", entry.index, entry.title, err.user_message());
                notify(ctx, job, &note).await;
            }
        }
    }

    if summary.cancelled {
        job.advance(JobState::Cancelled);
    }
    log::info!("Job {} playlist finished: {:?}", job.id(), summary);

    if let Err(e) = ctx.gateway.edit_text(chat_id, status, &summary.render()).await {
        log::warn!("Failed to show playlist summary: {}", e);
    }
    summary
}

async fn notify(ctx: &JobContext, job: &Job, text: &str) {
    if let Err(e) = ctx.gateway.send_text(job.chat_id(), text).await {
        log::warn!("Failed to send playlist note: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn entries(n: usize) -> Vec<PlaylistEntry> {
        (1..=n)
            .map(|i| PlaylistEntry {
                index: i,
                url: format!("https://www.youtube.com/watch?v={}", i),
                title: format!("Song {}", i),
            })
            .collect()
    }

    #[test]
    fn test_height_selector() {
        assert_eq!(
            height_selector(720),
            "b[height<=720][ext=mp4]/bv[height<=720][ext=mp4]+ba[ext=m4a]"
        );
    }

    #[test]
    fn test_selection_is_capped() {
        let (plan, truncated) = PlaylistPlan::from_selection("Mix".into(), entries(30), 360);
        assert!(truncated);
        assert_eq!(plan.entries.len(), config::playlist::MAX_ITEMS);

        let (plan, truncated) = PlaylistPlan::from_selection("Mix".into(), entries(3), 360);
        assert!(!truncated);
        assert_eq!(plan.entries.len(), 3);
    }

    #[test]
    fn test_request_for_entry() {
        let (plan, _) = PlaylistPlan::from_selection("Mix".into(), entries(3), 480);
        let request = plan.request_for(&plan.entries[2]).unwrap();
        assert_eq!(request.quality, "480p");
        assert_eq!(request.playlist_index, Some(3));
        assert_eq!(request.file_name("mp4"), "3. Song 3.mp4");

        let bad = PlaylistEntry {
            index: 1,
            url: "not a url".into(),
            title: "x".into(),
        };
        assert_eq!(plan.request_for(&bad), None);
    }

    #[test]
    fn test_summary_render() {
        let summary = PlaylistSummary {
            sent: 2,
            skipped: 1,
            failed: 0,
            total: 3,
            cancelled: false,
        };
        assert_eq!(
            summary.render(),
            "✅ Playlist done. Sent 2 of 3.\n⏭ Skipped (too large): 1"
        );

        let cancelled = PlaylistSummary {
            cancelled: true,
            total: 3,
            ..Default::default()
        };
        assert_eq!(cancelled.render(), "❌ Playlist cancelled. Sent 0 of 3.");
    }
}
