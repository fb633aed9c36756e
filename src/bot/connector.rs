//! Connector lifecycle: start/stop, polling, conflict/error backoff.
//!
//! The lifecycle is an explicit loop over four states:
//!
//! ```text
//! Starting ──ok──▶ Polling ──err──▶ BackingOff(kind) ──▶ Starting
//!     │                                    ▲
//!     └──────────────err──────────────────┘
//! (cancellation exits any state into Stopped)
//! ```
//!
//! A 409 conflict means another process is consuming the same update feed —
//! hammering the API will not fix that, so the conflict backoff (30 s) is
//! much longer than the generic-error backoff (5 s). Both sleeps race the
//! cancellation token, so `stop()` never waits out a pending retry.
//!
//! Only one connector may poll a token at a time; [`Supervisor`] enforces
//! that by fully stopping the active connector before spawning its
//! replacement.

use crate::bot::api::{BotApiError, BotClient};
use crate::bot::handlers;
use crate::process::FilePipeline;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Why a start/poll attempt failed, for backoff selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Another instance is consuming the same update feed (HTTP 409).
    Conflict,
    /// Anything else: transport errors, 5xx, malformed responses.
    Other,
}

/// Map an API failure onto a backoff class.
pub fn classify(err: &BotApiError) -> FailureKind {
    match err {
        BotApiError::Api {
            code: Some(409), ..
        } => FailureKind::Conflict,
        _ => FailureKind::Other,
    }
}

/// Fixed retry delays per failure kind.
#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    pub conflict: Duration,
    pub error: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            conflict: Duration::from_secs(30),
            error: Duration::from_secs(5),
        }
    }
}

impl BackoffPolicy {
    /// The single retry delay scheduled for a failure of `kind`.
    pub fn delay_for(&self, kind: FailureKind) -> Duration {
        match kind {
            FailureKind::Conflict => self.conflict,
            FailureKind::Other => self.error,
        }
    }
}

/// Observable connector lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectorState {
    Starting,
    Polling,
    BackingOff(FailureKind),
    Stopped,
}

/// The long-lived chat connector. Owns no global state: everything it needs
/// is in the struct, and its lifecycle is controlled through the
/// [`ConnectorHandle`] returned by [`Connector::spawn`].
pub struct Connector {
    client: BotClient,
    pipeline: Arc<FilePipeline>,
    backoff: BackoffPolicy,
    send_delay: Duration,
    poll_timeout_secs: u64,
}

impl Connector {
    pub fn new(client: BotClient, pipeline: Arc<FilePipeline>) -> Self {
        Self {
            client,
            pipeline,
            backoff: BackoffPolicy::default(),
            send_delay: Duration::from_millis(500),
            poll_timeout_secs: 30,
        }
    }

    /// Override the backoff policy (tests use millisecond delays).
    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    /// Spawn the receive loop onto a task and hand back its controls.
    pub fn spawn(self) -> ConnectorHandle {
        let cancel = CancellationToken::new();
        let (state_tx, state_rx) = watch::channel(ConnectorState::Starting);
        let task = tokio::spawn(self.run(cancel.clone(), state_tx));
        ConnectorHandle {
            cancel,
            task,
            state: state_rx,
        }
    }

    async fn run(self, cancel: CancellationToken, state: watch::Sender<ConnectorState>) {
        loop {
            let _ = state.send(ConnectorState::Starting);

            let startup = tokio::select! {
                _ = cancel.cancelled() => break,
                me = self.client.get_me() => me,
            };

            let failure = match startup {
                Ok(me) => {
                    info!(
                        "Connector started as @{}",
                        me.username.as_deref().unwrap_or("unknown")
                    );
                    let _ = state.send(ConnectorState::Polling);
                    match self.poll_loop(&cancel).await {
                        PollOutcome::Cancelled => break,
                        PollOutcome::Failed(kind) => kind,
                    }
                }
                Err(e) => {
                    let kind = classify(&e);
                    warn!("Connector start failed ({kind:?}): {e}");
                    kind
                }
            };

            let delay = self.backoff.delay_for(failure);
            let _ = state.send(ConnectorState::BackingOff(failure));
            warn!("Connector backing off {delay:?} after {failure:?} failure");

            // The backoff sleep is the pending retry timer; cancellation
            // replaces it, so a stopped connector never fires a stale retry.
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        let _ = state.send(ConnectorState::Stopped);
        info!("Connector stopped");
    }

    async fn poll_loop(&self, cancel: &CancellationToken) -> PollOutcome {
        let mut offset: i64 = 0;
        loop {
            let batch = tokio::select! {
                _ = cancel.cancelled() => return PollOutcome::Cancelled,
                r = self.client.get_updates(offset, self.poll_timeout_secs) => r,
            };

            match batch {
                Ok(updates) => {
                    for update in updates {
                        offset = offset.max(update.update_id + 1);
                        if cancel.is_cancelled() {
                            return PollOutcome::Cancelled;
                        }
                        if let Some(message) = update.message {
                            // Handler failures are per-message affairs; they
                            // are reported to the chat and must not tear
                            // down the receive loop.
                            handlers::dispatch(
                                &self.client,
                                &self.pipeline,
                                self.send_delay,
                                message,
                            )
                            .await;
                        }
                    }
                }
                Err(e) => {
                    let kind = classify(&e);
                    error!("Polling failed ({kind:?}): {e}");
                    return PollOutcome::Failed(kind);
                }
            }
        }
    }
}

enum PollOutcome {
    Cancelled,
    Failed(FailureKind),
}

/// Controls for a spawned connector.
pub struct ConnectorHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
    state: watch::Receiver<ConnectorState>,
}

impl ConnectorHandle {
    /// Last lifecycle state published by the connector task.
    pub fn state(&self) -> ConnectorState {
        *self.state.borrow()
    }

    /// True once the receive loop has fully exited.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Cancel the receive loop and any pending retry timer, then wait for
    /// the task to finish.
    pub async fn stop(self) {
        self.cancel.cancel();
        let _ = self.task.await;
    }
}

/// Owns the single active connector. Starting a new one stops the existing
/// one first — supersession, never two concurrent receive loops.
#[derive(Default)]
pub struct Supervisor {
    active: Option<ConnectorHandle>,
}

impl Supervisor {
    /// Stop any active connector, then spawn `connector` in its place.
    pub async fn start(&mut self, connector: Connector) {
        if let Some(existing) = self.active.take() {
            info!("Superseding active connector");
            existing.stop().await;
        }
        self.active = Some(connector.spawn());
    }

    /// Stop the active connector, if any. Idempotent.
    pub async fn stop(&mut self) {
        if let Some(existing) = self.active.take() {
            existing.stop().await;
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.as_ref().is_some_and(|h| !h.is_finished())
    }
}
