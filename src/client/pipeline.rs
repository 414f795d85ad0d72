//! The generation client: one attempt at a time through submit, receive and process.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use futures::StreamExt;
use serde::Serialize;
use tokio::sync::watch;
use uuid::Uuid;

use crate::config::ClientConfig;

use super::artifact::Artifact;
use super::error::{ClientError, ClientResult};
use super::stages::{Stage, StageId, StageStatus, StageTracker};
use super::transport::{GenerationRequest, GenerationTransport};

/// Receive progress never reaches 100 before the stream ends.
const RECEIVE_PROGRESS_CAP: u8 = 90;

/// What views render: published after every state change.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ClientSnapshot {
    /// Stages of the current (or last) attempt.
    pub stages: Vec<Stage>,
    /// Document on display.
    pub artifact: Option<Artifact>,
    /// Whether an attempt is in flight.
    pub generating: bool,
    /// Identifier of the current (or last) attempt.
    pub attempt: Option<Uuid>,
    /// Message of the last failed attempt.
    pub last_error: Option<String>,
}

#[derive(Default)]
struct ClientState {
    stages: StageTracker,
    artifact: Option<Artifact>,
    generating: bool,
    attempt: Option<Uuid>,
    last_error: Option<String>,
}

impl ClientState {
    fn snapshot(&self) -> ClientSnapshot {
        ClientSnapshot {
            stages: self.stages.stages().to_vec(),
            artifact: self.artifact.clone(),
            generating: self.generating,
            attempt: self.attempt,
            last_error: self.last_error.clone(),
        }
    }
}

/// State plus its change feed. The lock is never held across an `.await`.
struct Shared {
    state: Mutex<ClientState>,
    updates: watch::Sender<ClientSnapshot>,
}

impl Shared {
    fn read<R>(&self, f: impl FnOnce(&ClientState) -> R) -> R {
        let guard = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f(&guard)
    }

    fn update<R>(&self, f: impl FnOnce(&mut ClientState) -> R) -> R {
        let mut guard = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let result = f(&mut guard);
        self.updates.send_replace(guard.snapshot());
        result
    }
}

/// Ends an attempt exactly once, even when its future is dropped mid-flight.
struct AttemptGuard<'a> {
    shared: &'a Shared,
    attempt: Uuid,
    finished: bool,
}

impl AttemptGuard<'_> {
    fn finish(mut self, outcome: &ClientResult<Artifact>) {
        self.finished = true;
        let attempt = self.attempt;
        self.shared.update(|state| {
            if state.attempt != Some(attempt) {
                return;
            }
            state.generating = false;
            match outcome {
                Ok(artifact) => {
                    state.artifact = Some(artifact.clone());
                    tracing::info!(%attempt, bytes = artifact.content.len(), "Generation completed");
                }
                Err(e) => {
                    let failed = state.stages.fail_running();
                    state.last_error = Some(e.to_string());
                    tracing::warn!(%attempt, stage = ?failed, "Generation failed: {e}");
                }
            }
        });
    }
}

impl Drop for AttemptGuard<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        let attempt = self.attempt;
        self.shared.update(|state| {
            if state.attempt == Some(attempt) {
                state.stages.fail_running();
                state.generating = false;
                state.last_error = Some("generation abandoned".to_string());
                tracing::info!(%attempt, "Generation abandoned");
            }
        });
    }
}

/// Drives generation attempts over a pluggable transport.
pub struct GenerationClient<T> {
    transport: T,
    shared: Shared,
    timeout: Duration,
    receive_step: u8,
}

impl<T: GenerationTransport> GenerationClient<T> {
    /// Create a client with pristine stages and no artifact.
    #[must_use]
    pub fn new(transport: T, config: &ClientConfig) -> Self {
        let state = ClientState::default();
        let (updates, _) = watch::channel(state.snapshot());
        Self {
            transport,
            shared: Shared {
                state: Mutex::new(state),
                updates,
            },
            timeout: config.request_timeout,
            receive_step: config.receive_step,
        }
    }

    /// Subscribe to state changes. Dropping the receiver unsubscribes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ClientSnapshot> {
        self.shared.updates.subscribe()
    }

    /// Current state.
    #[must_use]
    pub fn snapshot(&self) -> ClientSnapshot {
        self.shared.read(ClientState::snapshot)
    }

    /// Document on display.
    #[must_use]
    pub fn artifact(&self) -> Option<Artifact> {
        self.shared.read(|state| state.artifact.clone())
    }

    /// Whether an attempt is in flight.
    #[must_use]
    pub fn is_generating(&self) -> bool {
        self.shared.read(|state| state.generating)
    }

    /// Stages of the current (or last) attempt.
    #[must_use]
    pub fn stages(&self) -> Vec<Stage> {
        self.shared.read(|state| state.stages.stages().to_vec())
    }

    /// Display an existing document so the next prompt revises it.
    pub fn seed_artifact(&self, artifact: Artifact) {
        self.shared.update(|state| state.artifact = Some(artifact));
    }

    /// Drop the displayed document so the next prompt starts from scratch.
    pub fn discard_artifact(&self) {
        self.shared.update(|state| state.artifact = None);
    }

    /// Run one generation attempt.
    ///
    /// The displayed document, if any, is sent along for revision and cleared
    /// right away. Dropping the returned future abandons the attempt and its
    /// network call.
    ///
    /// # Errors
    /// [`ClientError::EmptyPrompt`] or [`ClientError::AlreadyRunning`] leave all
    /// state untouched. Any other error marks the running stage as failed and
    /// produces no artifact.
    pub async fn start_generation(&self, prompt: &str) -> ClientResult<Artifact> {
        if prompt.trim().is_empty() {
            return Err(ClientError::EmptyPrompt);
        }

        let (attempt, prior_document) = self.shared.update(|state| {
            if state.generating {
                return Err(ClientError::AlreadyRunning);
            }
            let prior = state.artifact.take().map(|artifact| artifact.content);
            let attempt = Uuid::new_v4();
            state.stages.reset();
            state.generating = true;
            state.attempt = Some(attempt);
            state.last_error = None;
            Ok((attempt, prior))
        })?;

        let guard = AttemptGuard {
            shared: &self.shared,
            attempt,
            finished: false,
        };
        tracing::info!(%attempt, revision = prior_document.is_some(), "Generation started");

        let request = GenerationRequest {
            prompt: prompt.to_string(),
            prior_document,
        };
        let outcome = match tokio::time::timeout(self.timeout, self.run_stages(&request)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(ClientError::Timeout(self.timeout)),
        };

        guard.finish(&outcome);
        outcome
    }

    async fn run_stages(&self, request: &GenerationRequest) -> ClientResult<Artifact> {
        self.advance(StageId::Submit, StageStatus::Running, 0)?;
        let mut fragments = self.transport.submit(request).await?;
        self.advance(StageId::Submit, StageStatus::Completed, 100)?;

        self.advance(StageId::Receive, StageStatus::Running, 0)?;
        let mut text = String::new();
        let mut progress = 0_u8;
        while let Some(fragment) = fragments.next().await {
            text.push_str(&fragment?);
            progress = progress.saturating_add(self.receive_step).min(RECEIVE_PROGRESS_CAP);
            self.advance(StageId::Receive, StageStatus::Running, progress)?;
        }
        self.advance(StageId::Receive, StageStatus::Completed, 100)?;

        self.advance(StageId::Process, StageStatus::Running, 0)?;
        let content = text.trim();
        if content.is_empty() {
            return Err(ClientError::Malformed("the provider returned an empty document".to_string()));
        }
        let artifact = Artifact::new(content);
        self.advance(StageId::Process, StageStatus::Completed, 100)?;

        Ok(artifact)
    }

    fn advance(&self, id: StageId, status: StageStatus, progress: u8) -> ClientResult<()> {
        self.shared
            .update(|state| state.stages.advance(id, status, progress))
            .map_err(ClientError::from)
    }
}
