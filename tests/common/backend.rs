//! Scripted media backend
//!
//! Stands in for yt-dlp: every fetch follows a [`FetchPlan`] and writes a
//! sparse file of the requested size, so multi-gigabyte artifacts cost nothing.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;
use url::Url;

use clipdrop::download::{FetchedMedia, JobError, MediaBackend, MediaRequest, ProgressSink, Resolved};

/// What the next fetch does.
#[derive(Debug, Clone)]
pub enum FetchPlan {
    /// Writes a file of this many bytes and succeeds
    File(u64),
    /// Returns this error without writing anything
    Fail(JobError),
    /// Reports half of the bytes, then parks until [`FakeBackend::release`]
    Gated(u64),
}

#[derive(Default)]
struct State {
    plans: VecDeque<FetchPlan>,
    fetches: Vec<(MediaRequest, PathBuf)>,
    sink: Option<ProgressSink>,
}

#[derive(Clone, Default)]
pub struct FakeBackend {
    state: Arc<Mutex<State>>,
    started: Arc<Notify>,
    release: Arc<Notify>,
    resolved: Arc<Mutex<Option<Resolved>>>,
}

impl FakeBackend {
    pub fn new(plans: impl IntoIterator<Item = FetchPlan>) -> Self {
        let backend = Self::default();
        backend.state.lock().unwrap().plans = plans.into_iter().collect();
        backend
    }

    pub fn with_resolved(self, resolved: Resolved) -> Self {
        *self.resolved.lock().unwrap() = Some(resolved);
        self
    }

    /// Requests and destination dirs of every fetch so far.
    pub fn fetches(&self) -> Vec<(MediaRequest, PathBuf)> {
        self.state.lock().unwrap().fetches.clone()
    }

    /// Sink of the most recent fetch, for pushing progress from the test.
    pub fn sink(&self) -> Option<ProgressSink> {
        self.state.lock().unwrap().sink.clone()
    }

    /// Waits until a gated fetch is parked.
    pub async fn wait_started(&self) {
        self.started.notified().await;
    }

    /// Lets a parked fetch finish.
    pub fn release(&self) {
        self.release.notify_one();
    }
}

fn write_sparse(path: &Path, size: u64) -> std::io::Result<()> {
    let file = std::fs::File::create(path)?;
    file.set_len(size)
}

#[async_trait]
impl MediaBackend for FakeBackend {
    fn name(&self) -> &str {
        "fake"
    }

    async fn resolve(&self, _url: &Url) -> Result<Resolved, JobError> {
        self.resolved
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| JobError::Extraction("nothing scripted".to_string()))
    }

    async fn fetch(&self, request: &MediaRequest, dest: &Path, sink: ProgressSink) -> Result<FetchedMedia, JobError> {
        let plan = {
            let mut state = self.state.lock().unwrap();
            state.fetches.push((request.clone(), dest.to_path_buf()));
            state.sink = Some(sink.clone());
            state.plans.pop_front().unwrap_or(FetchPlan::File(1024))
        };

        let size = match plan {
            FetchPlan::Fail(err) => return Err(err),
            FetchPlan::File(size) => size,
            FetchPlan::Gated(size) => {
                sink.report(size / 2, Some(size));
                self.started.notify_one();
                self.release.notified().await;
                size
            }
        };

        sink.report(size, Some(size));
        let path = dest.join("download.mp4");
        write_sparse(&path, size)?;
        Ok(FetchedMedia { path, size })
    }
}
