//! Progress snapshots shared between a transfer and its status relay.
//!
//! The transfer side writes through a [`ProgressSink`]; every write replaces the
//! whole [`ProgressSnapshot`] in a single-slot `watch` channel, so the relay only
//! ever sees complete values. Dropping the last sink closes the channel.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use strum::Display;
use tokio::sync::watch;
use tokio::time::Instant;

use crate::core::utils::{format_duration, human_bytes};

/// Transfer phase a snapshot belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum Phase {
    Downloading,
    Merging,
    Uploading,
}

impl Phase {
    fn emoji(self) -> &'static str {
        match self {
            Phase::Downloading => "⬇️",
            Phase::Merging => "🔀",
            Phase::Uploading => "⬆️",
        }
    }
}

/// Latest known progress of a job.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressSnapshot {
    pub phase: Phase,
    pub bytes_transferred: u64,
    pub total_bytes: Option<u64>,
    pub elapsed: Duration,
}

impl ProgressSnapshot {
    /// Completion in percent, when the total is known.
    pub fn percent(&self) -> Option<u8> {
        let total = self.total_bytes.filter(|total| *total > 0)?;
        let percent = (u128::from(self.bytes_transferred) * 100 / u128::from(total)).min(100);
        Some(percent as u8)
    }

    /// Average rate in bytes per second since the phase started.
    pub fn rate(&self) -> Option<f64> {
        let secs = self.elapsed.as_secs_f64();
        (secs > 0.0 && self.bytes_transferred > 0).then(|| self.bytes_transferred as f64 / secs)
    }

    pub fn eta(&self) -> Option<Duration> {
        let remaining = self.total_bytes?.checked_sub(self.bytes_transferred)?;
        let rate = self.rate()?;
        Duration::try_from_secs_f64(remaining as f64 / rate).ok()
    }

    /// Renders the snapshot using its own percentage.
    pub fn render(&self) -> String {
        self.render_with_percent(self.percent())
    }

    /// Renders the snapshot with an externally clamped percentage.
    pub fn render_with_percent(&self, percent: Option<u8>) -> String {
        let mut lines = vec![format!("{} {}", self.phase.emoji(), self.phase)];

        if self.phase == Phase::Merging {
            lines.push("Combining video and audio streams...".to_string());
            return lines.join("\n");
        }

        if let Some(percent) = percent {
            lines.push(format!("{} {}%", progress_bar(percent), percent));
        }
        match self.total_bytes {
            Some(total) => lines.push(format!(
                "📦 {} of {}",
                human_bytes(self.bytes_transferred),
                human_bytes(total)
            )),
            None => lines.push(format!("📦 {}", human_bytes(self.bytes_transferred))),
        }
        if let Some(rate) = self.rate() {
            lines.push(format!("⚡ {}/s", human_bytes(rate as u64)));
        }
        if let Some(eta) = self.eta() {
            lines.push(format!("⏳ ETA: {}", format_duration(eta)));
        }

        lines.join("\n")
    }
}

/// Ten-cell bar, one cell per 10%.
fn progress_bar(percent: u8) -> String {
    let filled = usize::from(percent.min(100) / 10);
    format!("[{}{}]", "█".repeat(filled), "░".repeat(10 - filled))
}

/// Read side of the snapshot slot.
pub type ProgressWatch = watch::Receiver<Option<ProgressSnapshot>>;

#[derive(Debug)]
struct Tracker {
    phase: Phase,
    started: Instant,
    /// Bytes of streams that already finished in this phase
    completed_streams: u64,
    stream_bytes: u64,
    stream_total: Option<u64>,
    bytes: u64,
    total: Option<u64>,
}

impl Tracker {
    fn new(phase: Phase, total: Option<u64>) -> Self {
        Self {
            phase,
            started: Instant::now(),
            completed_streams: 0,
            stream_bytes: 0,
            stream_total: None,
            bytes: 0,
            total,
        }
    }

    fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            phase: self.phase,
            bytes_transferred: self.bytes,
            total_bytes: self.total,
            elapsed: self.started.elapsed(),
        }
    }
}

struct SinkInner {
    slot: watch::Sender<Option<ProgressSnapshot>>,
    tracker: Mutex<Tracker>,
}

/// Write side of the snapshot slot, cloned into whatever performs the transfer.
///
/// Bytes reported within one phase never decrease. yt-dlp restarts its counter
/// for every stream of a multi-stream download; [`ProgressSink::begin_stream`]
/// carries the finished stream over as an offset. A dip inside one stream, as
/// when an estimated total shrinks, leaves the byte count where it was.
#[derive(Clone)]
pub struct ProgressSink {
    inner: Arc<SinkInner>,
}

impl ProgressSink {
    pub fn new() -> Self {
        let (slot, _) = watch::channel(None);
        Self {
            inner: Arc::new(SinkInner {
                slot,
                tracker: Mutex::new(Tracker::new(Phase::Downloading, None)),
            }),
        }
    }

    pub fn subscribe(&self) -> ProgressWatch {
        self.inner.slot.subscribe()
    }

    /// Current phase of the tracker.
    pub fn phase(&self) -> Phase {
        self.with_tracker(|tracker| tracker.phase)
    }

    /// Starts a new phase and publishes a zero-progress snapshot for it.
    pub fn begin_phase(&self, phase: Phase, total_hint: Option<u64>) {
        self.update(|tracker| *tracker = Tracker::new(phase, total_hint));
    }

    /// Banks the current stream and starts counting the next one from zero.
    pub fn begin_stream(&self) {
        self.update(|tracker| {
            tracker.completed_streams += tracker.stream_total.unwrap_or(0).max(tracker.stream_bytes);
            tracker.stream_bytes = 0;
            tracker.stream_total = None;
        });
    }

    /// Records yt-dlp style progress: `current` bytes of the current stream.
    pub fn report(&self, current: u64, stream_total: Option<u64>) {
        self.update(|tracker| {
            tracker.stream_bytes = current;
            tracker.stream_total = stream_total;

            tracker.bytes = tracker.bytes.max(tracker.completed_streams + current);
            if let Some(stream_total) = stream_total {
                tracker.total = Some(tracker.completed_streams + stream_total.max(current));
            }
        });
    }

    /// Adds bytes to the running counter, used by the upload reader.
    pub fn add_bytes(&self, bytes: u64) {
        self.update(|tracker| tracker.bytes = tracker.bytes.saturating_add(bytes));
    }

    /// Latest published snapshot.
    pub fn snapshot(&self) -> Option<ProgressSnapshot> {
        self.inner.slot.borrow().clone()
    }

    fn with_tracker<T>(&self, f: impl FnOnce(&Tracker) -> T) -> T {
        let tracker = self.inner.tracker.lock().unwrap_or_else(PoisonError::into_inner);
        f(&tracker)
    }

    fn update(&self, f: impl FnOnce(&mut Tracker)) {
        let snapshot = {
            let mut tracker = self.inner.tracker.lock().unwrap_or_else(PoisonError::into_inner);
            f(&mut tracker);
            tracker.snapshot()
        };
        self.inner.slot.send_replace(Some(snapshot));
    }
}

impl Default for ProgressSink {
    fn default() -> Self {
        Self::new()
    }
}
