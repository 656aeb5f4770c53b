//! Background task mirroring job progress into the chat's status message.
//!
//! The relay only reads the [`ProgressWatch`] slot. On every tick it renders the
//! newest snapshot and edits the status message when the text differs from the
//! last one delivered. Failed edits are logged, followed by a back-off; the text
//! goes out again on the next tick.

use std::cmp::{max, min};
use std::sync::Arc;
use std::time::Duration;

use teloxide::types::{ChatId, MessageId};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::core::config;
use crate::core::utils::extract_retry_after;
use crate::download::progress::{Phase, ProgressSnapshot, ProgressWatch};
use crate::telegram::gateway::ChatGateway;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelaySettings {
    /// Time between renders
    pub interval: Duration,
    /// Pause after a failed edit
    pub backoff: Duration,
    /// Upper bound for server-requested waits
    pub max_backoff: Duration,
}

impl RelaySettings {
    pub fn from_config() -> Self {
        Self {
            interval: config::relay::interval(),
            backoff: config::relay::backoff(),
            max_backoff: config::relay::max_backoff(),
        }
    }
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self::from_config()
    }
}

/// Percentage floor of the current phase.
#[derive(Debug, Default)]
struct RenderState {
    last_delivered: Option<String>,
    floor: Option<(Phase, u8)>,
}

impl RenderState {
    /// Percent that never goes below what was already shown for this phase.
    fn clamp_percent(&mut self, snapshot: &ProgressSnapshot) -> Option<u8> {
        let percent = snapshot.percent()?;
        let percent = match self.floor {
            Some((phase, floor)) if phase == snapshot.phase => max(floor, percent),
            _ => percent,
        };
        self.floor = Some((snapshot.phase, percent));
        Some(percent)
    }
}

/// Why the run loop stopped waiting.
enum Wake {
    Tick,
    Stop,
    Finish,
}

pub struct StatusRelay {
    gateway: Arc<dyn ChatGateway>,
    chat_id: ChatId,
    message_id: MessageId,
    header: Option<String>,
    settings: RelaySettings,
}

impl StatusRelay {
    pub fn new(gateway: Arc<dyn ChatGateway>, chat_id: ChatId, message_id: MessageId, settings: RelaySettings) -> Self {
        Self {
            gateway,
            chat_id,
            message_id,
            header: None,
            settings,
        }
    }

    /// Line shown above the progress, e.g. "[2/5] Title".
    pub fn with_header(mut self, header: impl Into<String>) -> Self {
        self.header = Some(header.into());
        self
    }

    /// Starts the relay task. It ends when `stop` is cancelled, when
    /// [`RelayHandle::finish`] is called, or when every writer of `source` is gone.
    pub fn spawn(self, source: ProgressWatch, stop: CancellationToken) -> RelayHandle {
        let (finish_tx, finish_rx) = oneshot::channel();
        let task = tokio::spawn(self.run(source, stop.clone(), finish_rx));
        RelayHandle {
            stop,
            finish: Some(finish_tx),
            task: Some(task),
        }
    }

    async fn run(self, mut source: ProgressWatch, stop: CancellationToken, mut finish: oneshot::Receiver<()>) {
        let mut state = RenderState::default();

        // Nothing to show until the job publishes its first snapshot
        while source.borrow().is_none() {
            tokio::select! {
                biased;
                _ = stop.cancelled() => return,
                signal = &mut finish => {
                    if signal.is_ok() {
                        let _ = self.render(&source, &mut state, true).await;
                    }
                    return;
                }
                changed = source.changed() => {
                    if changed.is_err() {
                        return;
                    }
                }
            }
        }

        let mut ticker = interval(self.settings.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            let wake = tokio::select! {
                biased;
                _ = stop.cancelled() => Wake::Stop,
                signal = &mut finish => if signal.is_ok() { Wake::Finish } else { Wake::Stop },
                _ = ticker.tick() => Wake::Tick,
            };

            match wake {
                Wake::Stop => return,
                Wake::Finish => {
                    let _ = self.render(&source, &mut state, true).await;
                    return;
                }
                Wake::Tick => {}
            }

            let writers_gone = source.has_changed().is_err();
            if writers_gone {
                let _ = self.render(&source, &mut state, true).await;
                return;
            }

            if let Err(wait) = self.render(&source, &mut state, false).await {
                tokio::select! {
                    biased;
                    _ = stop.cancelled() => return,
                    signal = &mut finish => {
                        if signal.is_ok() {
                            let _ = self.render(&source, &mut state, true).await;
                        }
                        return;
                    }
                    _ = sleep(wait) => {}
                }
            }
        }
    }

    /// Renders the newest snapshot. `force` edits even when the text is unchanged.
    ///
    /// On a failed edit returns how long to wait before the next attempt.
    async fn render(&self, source: &ProgressWatch, state: &mut RenderState, force: bool) -> Result<(), Duration> {
        let Some(snapshot) = source.borrow().clone() else {
            return Ok(());
        };
        let percent = state.clamp_percent(&snapshot);
        let body = snapshot.render_with_percent(percent);
        let text = match &self.header {
            Some(header) => format!("{}\n\n{}", header, body),
            None => body,
        };

        if !force && state.last_delivered.as_deref() == Some(text.as_str()) {
            return Ok(());
        }

        match self.gateway.edit_text(self.chat_id, self.message_id, &text).await {
            Ok(()) => {
                state.last_delivered = Some(text);
                Ok(())
            }
            Err(e) => {
                let requested = extract_retry_after(&e.to_string()).map(Duration::from_secs);
                let wait = min(
                    max(self.settings.backoff, requested.unwrap_or_default()),
                    self.settings.max_backoff,
                );
                log::warn!(
                    "Status edit failed for chat {}: {}; retrying in {}s",
                    self.chat_id,
                    e,
                    wait.as_secs()
                );
                Err(wait)
            }
        }
    }
}

/// Control handle of a running relay. Dropping it stops the relay.
pub struct RelayHandle {
    stop: CancellationToken,
    finish: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl RelayHandle {
    /// Stops the relay without another edit and waits for it to exit.
    pub async fn stop(mut self) {
        self.stop.cancel();
        self.join().await;
    }

    /// Performs one final render and waits for the relay to exit.
    pub async fn finish(mut self) {
        if let Some(finish) = self.finish.take() {
            let _ = finish.send(());
        }
        self.join().await;
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, JoinHandle::is_finished)
    }

    async fn join(&mut self) {
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                log::error!("Status relay task failed: {}", e);
            }
        }
    }
}

impl Drop for RelayHandle {
    fn drop(&mut self) {
        self.stop.cancel();
    }
}
