//! Common error infrastructure for combat-core.
//!
//! Domain errors live next to the code that raises them ([`CombatError`]
//! here, [`crate::lifecycle::LifecycleError`] in the lifecycle module) and all
//! implement [`CombatFault`] so callers can pick a handling strategy without
//! matching on every variant.
//!
//! Policy denials are not errors: they surface as flavor text in the exchange
//! report, never through these types.

use crate::state::EntityId;

/// Severity level of an error, used for categorization and recovery strategies.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ErrorSeverity {
    /// Temporary condition; the same request may succeed later.
    ///
    /// Examples: target already dead, no free effect slot, lifecycle
    /// already scheduled
    Recoverable,

    /// Invalid input; reject without retry.
    ///
    /// Examples: combatant not found, NPC-only operation on a player
    Validation,

    /// Unexpected state inconsistency; indicates a bug.
    Internal,

    /// State corrupted, cannot continue.
    Fatal,
}

impl ErrorSeverity {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Recoverable => "recoverable",
            Self::Validation => "validation",
            Self::Internal => "internal",
            Self::Fatal => "fatal",
        }
    }

    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::Recoverable)
    }

    pub const fn is_internal(&self) -> bool {
        matches!(self, Self::Internal | Self::Fatal)
    }
}

/// Common trait for all combat-core errors.
pub trait CombatFault: core::fmt::Display + core::fmt::Debug {
    fn severity(&self) -> ErrorSeverity;

    /// Static identifier for the variant, for logs and tests.
    fn error_code(&self) -> &'static str {
        core::any::type_name::<Self>()
    }
}

/// Missing-data and invalid-target errors. An exchange that hits one of these
/// never starts.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum CombatError {
    #[error("combatant {0} not found")]
    CombatantNotFound(EntityId),

    #[error("combatant {0} is not an NPC")]
    NotAnNpc(EntityId),

    #[error("combatant {0} is already dead")]
    AlreadyDead(EntityId),

    #[error("combatant {0} cannot attack itself")]
    SelfTarget(EntityId),

    #[error("combatant {0} has no free status effect slot")]
    EffectsFull(EntityId),
}

impl CombatFault for CombatError {
    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::CombatantNotFound(_) | Self::NotAnNpc(_) | Self::SelfTarget(_) => {
                ErrorSeverity::Validation
            }
            Self::AlreadyDead(_) | Self::EffectsFull(_) => ErrorSeverity::Recoverable,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::CombatantNotFound(_) => "COMBATANT_NOT_FOUND",
            Self::NotAnNpc(_) => "NOT_AN_NPC",
            Self::AlreadyDead(_) => "ALREADY_DEAD",
            Self::SelfTarget(_) => "SELF_TARGET",
            Self::EffectsFull(_) => "EFFECTS_FULL",
        }
    }
}
