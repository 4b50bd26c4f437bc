//! Exchange requests and the reports handed back to callers.

use serde::{Deserialize, Serialize};

use combat_core::{
    AbilityMeta, AssistPull, DamageReport, EntityId, GateDamage, HitResolution, Narration,
    ProgressionGain, SwingCapabilities, Timestamp,
};

use crate::api::{DamageRoll, RewardGrant, StepOutcome};

/// One player- or NPC-initiated attack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttackRequest {
    pub attacker: EntityId,
    pub target: EntityId,
    pub ability: Option<AbilityMeta>,
    pub capabilities: SwingCapabilities,
}

impl AttackRequest {
    /// Plain auto-attack with every swing feature enabled.
    pub fn melee(attacker: EntityId, target: EntityId) -> Self {
        Self {
            attacker,
            target,
            ability: None,
            capabilities: SwingCapabilities::default(),
        }
    }

    #[must_use]
    pub fn with_ability(mut self, ability: AbilityMeta) -> Self {
        self.ability = Some(ability);
        self
    }

    #[must_use]
    pub fn with_capabilities(mut self, capabilities: SwingCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }
}

/// Outcome of one damage application through the low-level applier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HitReport {
    pub target: EntityId,
    pub damage: DamageReport,
    /// Set when the fast policy backstop refused the hit.
    pub refused: bool,
    pub assists: Vec<AssistPull>,
    pub gate: Option<GateDamage>,
    pub death: Option<DeathHandling>,
}

/// What death handling did for one lethal hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DeathHandling {
    /// First lethal hit: the corpse is up and a despawn is due.
    Scheduled {
        npc: EntityId,
        despawn_at: Timestamp,
        rewards: StepOutcome<Option<RewardGrant>>,
    },
    /// The lifecycle guard was already taken by an earlier lethal hit.
    AlreadyHandled { npc: EntityId },
    /// A player or pet died; nothing to schedule.
    NotAnNpc { combatant: EntityId },
}

/// One swing inside an exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwingSummary {
    pub attacker: EntityId,
    pub defender: EntityId,
    /// `None` for spell channels, which skip the physical resolver.
    pub resolution: Option<HitResolution>,
    /// `None` when the swing did not connect.
    pub roll: Option<StepOutcome<DamageRoll>>,
    /// Set when the swing connected and damage was applied.
    pub hit: Option<HitReport>,
    pub narration: Narration,
}

impl SwingSummary {
    pub fn damage(&self) -> u32 {
        self.hit.as_ref().map_or(0, |hit| hit.damage.amount)
    }

    pub fn killed(&self) -> bool {
        self.hit.as_ref().is_some_and(|hit| hit.damage.killed)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExchangeOutcome {
    /// A policy gate stopped the exchange before any roll.
    Denied { reason: String },
    Resolved {
        swing: Box<SwingSummary>,
        progression: Option<StepOutcome<ProgressionGain>>,
        counter: Option<Box<SwingSummary>>,
    },
}

/// Full record of one exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeReport {
    pub attacker: EntityId,
    pub target: EntityId,
    pub outcome: ExchangeOutcome,
}

impl ExchangeReport {
    pub fn denied(&self) -> Option<&str> {
        match &self.outcome {
            ExchangeOutcome::Denied { reason } => Some(reason),
            ExchangeOutcome::Resolved { .. } => None,
        }
    }

    pub fn swing(&self) -> Option<&SwingSummary> {
        match &self.outcome {
            ExchangeOutcome::Resolved { swing, .. } => Some(swing),
            ExchangeOutcome::Denied { .. } => None,
        }
    }

    pub fn counter(&self) -> Option<&SwingSummary> {
        match &self.outcome {
            ExchangeOutcome::Resolved { counter, .. } => counter.as_deref(),
            ExchangeOutcome::Denied { .. } => None,
        }
    }

    pub fn progression(&self) -> Option<&StepOutcome<ProgressionGain>> {
        match &self.outcome {
            ExchangeOutcome::Resolved { progression, .. } => progression.as_ref(),
            ExchangeOutcome::Denied { .. } => None,
        }
    }

    /// Player-facing lines in display order.
    pub fn lines(&self) -> Vec<String> {
        match &self.outcome {
            ExchangeOutcome::Denied { reason } => vec![reason.clone()],
            ExchangeOutcome::Resolved { swing, counter, .. } => std::iter::once(swing.as_ref())
                .chain(counter.as_deref())
                .map(|s| s.narration.to_string())
                .collect(),
        }
    }

    /// Whether the exchange killed the target.
    pub fn killed(&self) -> bool {
        self.swing().is_some_and(SwingSummary::killed)
    }

    /// Every death handled during the exchange, main swing first.
    pub fn deaths(&self) -> impl Iterator<Item = &DeathHandling> + '_ {
        self.swing()
            .into_iter()
            .chain(self.counter())
            .filter_map(|s| s.hit.as_ref()?.death.as_ref())
    }
}
