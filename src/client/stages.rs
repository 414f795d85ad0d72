//! Progress stages of one generation attempt.
//!
//! The three stages form a linear state machine. Every change goes through
//! [`StageTracker::advance`], which rejects transitions that would break
//! monotonic progress.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Stage identifiers, in execution order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageId {
    /// Request dispatch.
    Submit,
    /// Response consumption.
    Receive,
    /// Artifact production.
    Process,
}

impl StageId {
    /// All stages in order.
    pub const ALL: [Self; 3] = [Self::Submit, Self::Receive, Self::Process];

    /// Human-readable title.
    #[must_use]
    pub const fn title(self) -> &'static str {
        match self {
            Self::Submit => "Submitting request",
            Self::Receive => "Receiving response",
            Self::Process => "Processing result",
        }
    }

    const fn index(self) -> usize {
        match self {
            Self::Submit => 0,
            Self::Receive => 1,
            Self::Process => 2,
        }
    }
}

/// Stage status.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageStatus {
    /// Not started.
    Pending,
    /// In progress.
    Running,
    /// Finished successfully.
    Completed,
    /// Failed; terminal for the attempt.
    Error,
}

impl StageStatus {
    /// Whether no further transition is allowed.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }
}

/// One stage and its progress.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stage {
    /// Identifier.
    pub id: StageId,
    /// Display title.
    pub title: String,
    /// Current status.
    pub status: StageStatus,
    /// Progress percentage, 0..=100.
    pub progress: u8,
}

impl Stage {
    fn pending(id: StageId) -> Self {
        Self {
            id,
            title: id.title().to_string(),
            status: StageStatus::Pending,
            progress: 0,
        }
    }
}

/// Rejected stage transitions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StageError {
    /// Progress above 100.
    #[error("progress {0} is out of range")]
    ProgressOutOfRange(u8),
    /// The stage already reached `completed` or `error`.
    #[error("stage {0:?} is already finished")]
    AlreadyFinished(StageId),
    /// Moving back to `pending` or lowering progress.
    #[error("stage {id:?} cannot regress from {from}% to {to}%")]
    Regression {
        /// Stage.
        id: StageId,
        /// Current progress.
        from: u8,
        /// Requested progress.
        to: u8,
    },
    /// An earlier stage has not completed yet.
    #[error("stage {id:?} cannot start before {blocked_by:?} completes")]
    OutOfOrder {
        /// Stage.
        id: StageId,
        /// Earliest unfinished predecessor.
        blocked_by: StageId,
    },
}

/// The ordered stage list of the current attempt.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageTracker {
    stages: Vec<Stage>,
}

impl Default for StageTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl StageTracker {
    /// All stages `{pending, 0}`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            stages: StageId::ALL.into_iter().map(Stage::pending).collect(),
        }
    }

    /// Reset every stage to `{pending, 0}` for a new attempt.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Stages in order.
    #[must_use]
    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// One stage.
    #[must_use]
    pub fn get(&self, id: StageId) -> &Stage {
        &self.stages[id.index()]
    }

    /// The stage currently running, if any.
    #[must_use]
    pub fn running(&self) -> Option<&Stage> {
        self.stages.iter().find(|s| s.status == StageStatus::Running)
    }

    /// Whether every stage is still `{pending, 0}`.
    #[must_use]
    pub fn is_pristine(&self) -> bool {
        self.stages
            .iter()
            .all(|s| s.status == StageStatus::Pending && s.progress == 0)
    }

    /// Apply a transition.
    ///
    /// `Completed` always records 100%. `Error` keeps the progress reached.
    ///
    /// # Errors
    /// Returns a [`StageError`] if the transition would break ordering or monotonicity.
    pub fn advance(&mut self, id: StageId, status: StageStatus, progress: u8) -> Result<(), StageError> {
        if progress > 100 {
            return Err(StageError::ProgressOutOfRange(progress));
        }

        if status != StageStatus::Pending && status != StageStatus::Error {
            if let Some(blocked_by) = self.stages[..id.index()]
                .iter()
                .find(|s| s.status != StageStatus::Completed)
            {
                return Err(StageError::OutOfOrder {
                    id,
                    blocked_by: blocked_by.id,
                });
            }
        }

        let stage = &mut self.stages[id.index()];
        if stage.status.is_terminal() {
            return Err(StageError::AlreadyFinished(id));
        }

        let target = match status {
            StageStatus::Completed => 100,
            StageStatus::Error => stage.progress,
            StageStatus::Pending | StageStatus::Running => progress,
        };
        let regresses_to_pending = status == StageStatus::Pending && stage.status != StageStatus::Pending;
        if target < stage.progress || regresses_to_pending {
            return Err(StageError::Regression {
                id,
                from: stage.progress,
                to: target,
            });
        }

        tracing::debug!(stage = ?id, ?status, progress = target, "Stage transition");
        stage.status = status;
        stage.progress = target;
        Ok(())
    }

    /// Mark the running stage as failed. Returns its id, if one was running.
    pub fn fail_running(&mut self) -> Option<StageId> {
        let id = self.running()?.id;
        self.advance(id, StageStatus::Error, 0).ok()?;
        Some(id)
    }
}
