//! Unified error types surfaced by the runtime API.
//!
//! Missing-data failures reject an exchange before it starts. Failures of
//! best-effort collaborators never reach these types; they are recorded as
//! [`StepOutcome::Degraded`] in the exchange report instead.
use std::fmt;

use thiserror::Error;
use tokio::sync::oneshot;

use combat_core::{CombatError, LifecycleError, PrototypeId, SpawnPointId};

pub type Result<T> = std::result::Result<T, RuntimeError>;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("combat worker command channel closed")]
    CommandChannelClosed,

    #[error("combat worker reply channel closed")]
    ReplyChannelClosed(#[source] oneshot::error::RecvError),

    #[error("combat worker join failed")]
    WorkerJoin(#[source] tokio::task::JoinError),

    #[error(transparent)]
    Combat(#[from] CombatError),

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    #[error("unknown NPC prototype {0}")]
    UnknownPrototype(PrototypeId),

    #[error("unknown spawn point {0}")]
    UnknownSpawnPoint(SpawnPointId),

    #[error("runtime requires a {kind} to be configured before building")]
    MissingCollaborator { kind: CollaboratorKind },
}

/// Failure reported by an external collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} failed: {message}")]
pub struct CollaboratorError {
    pub kind: CollaboratorKind,
    pub message: String,
}

impl CollaboratorError {
    pub fn new(kind: CollaboratorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CollaboratorKind {
    DamageEngine,
    RewardSource,
    ZonePolicy,
    SpawnPoints,
    Progression,
}

impl fmt::Display for CollaboratorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CollaboratorKind::DamageEngine => "damage engine",
            CollaboratorKind::RewardSource => "reward source",
            CollaboratorKind::ZonePolicy => "zone policy",
            CollaboratorKind::SpawnPoints => "spawn point cache",
            CollaboratorKind::Progression => "progression sink",
        };
        write!(f, "{}", label)
    }
}

/// Result of a best-effort sub-step.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum StepOutcome<T> {
    Done(T),
    Degraded { reason: String },
}

impl<T> StepOutcome<T> {
    pub fn degraded(reason: impl fmt::Display) -> Self {
        StepOutcome::Degraded {
            reason: reason.to_string(),
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, StepOutcome::Done(_))
    }

    pub fn done(&self) -> Option<&T> {
        match self {
            StepOutcome::Done(value) => Some(value),
            StepOutcome::Degraded { .. } => None,
        }
    }
}
