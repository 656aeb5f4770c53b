//! Item pipeline shared by single downloads and playlist entries.
//!
//! One item goes through: scratch dir → download (relay running) → size check →
//! thumbnail → upload (relay running) → relay finished → scratch dir removed.
//! The scratch dir is removed on every exit path, including errors and
//! cancellation.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use teloxide::types::MessageId;

use crate::core::config;
use crate::download::error::JobError;
use crate::download::job::{Job, JobState};
use crate::download::progress::{Phase, ProgressSink};
use crate::download::relay::{RelaySettings, StatusRelay};
use crate::download::source::MediaBackend;
use crate::download::thumbnail::ThumbnailFetcher;
use crate::telegram::gateway::{ChatGateway, MediaUpload};

/// Prefix of per-item scratch directories
pub const SCRATCH_PREFIX: &str = "yt_dl_";

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Parent of the per-item scratch directories
    pub temp_root: PathBuf,
    pub relay: RelaySettings,
    pub max_upload_bytes: u64,
}

impl PipelineSettings {
    pub fn from_config() -> Self {
        Self {
            temp_root: config::TEMP_FILES_DIR.clone(),
            relay: RelaySettings::from_config(),
            max_upload_bytes: *config::upload::MAX_UPLOAD_BYTES,
        }
    }
}

/// Everything a job task needs, cheap to clone into spawned tasks.
#[derive(Clone)]
pub struct JobContext {
    pub backend: Arc<dyn MediaBackend>,
    pub gateway: Arc<dyn ChatGateway>,
    pub thumbnails: ThumbnailFetcher,
    pub settings: Arc<PipelineSettings>,
}

/// Fails with [`JobError::SizeLimit`] when a known size is over `limit`.
pub fn check_upload_size(size: Option<u64>, limit: u64) -> Result<(), JobError> {
    match size {
        Some(size) if size > limit => Err(JobError::SizeLimit { size, limit }),
        _ => Ok(()),
    }
}

/// Runs the job's current request through the item pipeline.
///
/// Leaves the job in `Uploaded` on success; the caller decides how a failure is
/// reported and which terminal state it maps to.
pub async fn process_item(
    ctx: &JobContext,
    job: &mut Job,
    status: MessageId,
    header: Option<String>,
) -> Result<(), JobError> {
    fs_err::tokio::create_dir_all(&ctx.settings.temp_root).await?;
    let scratch = tempfile::Builder::new()
        .prefix(SCRATCH_PREFIX)
        .tempdir_in(&ctx.settings.temp_root)?;
    log::debug!("Job {} uses scratch dir {}", job.id(), scratch.path().display());

    let result = transfer(ctx, job, status, header, scratch.path()).await;

    let scratch_path = scratch.path().to_path_buf();
    if let Err(e) = scratch.close() {
        log::warn!("Failed to remove scratch dir {}: {}", scratch_path.display(), e);
    }
    result
}

/// Download and upload with the relay running for the whole transfer.
async fn transfer(
    ctx: &JobContext,
    job: &mut Job,
    status: MessageId,
    header: Option<String>,
    dir: &Path,
) -> Result<(), JobError> {
    job.checkpoint()?;
    let request = job.request().clone();
    check_upload_size(request.estimated_size, ctx.settings.max_upload_bytes)?;

    job.advance(JobState::Downloading);
    let sink = ProgressSink::new();
    sink.begin_phase(Phase::Downloading, request.estimated_size);

    let mut relay = StatusRelay::new(ctx.gateway.clone(), job.chat_id(), status, ctx.settings.relay);
    if let Some(header) = header {
        relay = relay.with_header(header);
    }
    let relay = relay.spawn(sink.subscribe(), job.child_token());

    let outcome = download_and_upload(ctx, job, dir, &sink).await;
    match &outcome {
        Ok(()) => relay.finish().await,
        Err(_) => relay.stop().await,
    }
    outcome
}

async fn download_and_upload(ctx: &JobContext, job: &mut Job, dir: &Path, sink: &ProgressSink) -> Result<(), JobError> {
    let request = job.request().clone();
    log::info!(
        "Job {}: downloading {} via {} ({})",
        job.id(),
        request.source_url,
        ctx.backend.name(),
        request.selector
    );

    let fetched = ctx.backend.fetch(&request, dir, sink.clone()).await;
    // Cancellation is observed once the transfer has returned
    job.checkpoint()?;
    let fetched = fetched?;

    if sink.phase() == Phase::Merging {
        job.advance(JobState::Merging);
    }
    job.advance(JobState::Ready);
    check_upload_size(Some(fetched.size), ctx.settings.max_upload_bytes)?;

    let thumbnail = ctx.thumbnails.prepare(&request, &fetched.path, dir).await;
    job.checkpoint()?;

    let file_name = request.file_name(fetched.extension());
    let upload = MediaUpload {
        caption: request.caption(&file_name),
        path: fetched.path.clone(),
        file_name,
        title: request.title.clone(),
        thumbnail,
        kind: request.kind,
        size: fetched.size,
    };

    sink.begin_phase(Phase::Uploading, Some(fetched.size));
    ctx.gateway.send_media(job.chat_id(), upload, sink.clone()).await?;
    job.advance(JobState::Uploaded);
    log::info!("Job {}: delivered {} bytes", job.id(), fetched.size);
    Ok(())
}

/// Marks the job terminal for `err` and logs it.
pub(crate) fn fail_job(job: &mut Job, err: &JobError) {
    if err.is_cancelled() {
        log::info!("Job {} cancelled", job.id());
        job.advance(JobState::Cancelled);
    } else {
        log::warn!("Job {} failed ({}): {}", job.id(), err.subcategory(), err);
        job.advance(JobState::Failed);
    }
}

/// Runs a single-item job end to end and reports the outcome on `status`.
///
/// On success the status message is deleted; on failure it shows the error.
pub async fn run_single(ctx: &JobContext, job: &mut Job, status: MessageId) -> Result<(), JobError> {
    let result = process_item(ctx, job, status, None).await;

    match &result {
        Ok(()) => {
            if let Err(e) = ctx.gateway.delete_message(job.chat_id(), status).await {
                log::warn!("Failed to delete status message: {}", e);
            }
        }
        Err(err) => {
            fail_job(job, err);
            if let Err(e) = ctx.gateway.edit_text(job.chat_id(), status, &err.user_message()).await {
                log::warn!("Failed to report job error: {}", e);
            }
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_upload_size() {
        assert!(check_upload_size(None, 10).is_ok());
        assert!(check_upload_size(Some(10), 10).is_ok());
        assert_eq!(
            check_upload_size(Some(11), 10),
            Err(JobError::SizeLimit { size: 11, limit: 10 })
        );
    }
}
