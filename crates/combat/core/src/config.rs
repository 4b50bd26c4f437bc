//! Tunable combat parameters.
//!
//! Every knob the engine recognizes lives in [`CombatConfig`]. It is resolved
//! once at startup (see `combat-content`) and passed by reference afterwards;
//! nothing in this crate reads the environment.

use crate::state::Archetype;

/// Root configuration, grouped by subsystem.
#[derive(Clone, Debug, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct CombatConfig {
    /// Seed for the runtime roll source. `None` picks a random seed.
    pub seed: Option<u64>,
    pub combat: ExchangeConfig,
    pub threat: ThreatConfig,
    pub assist: AssistConfig,
    pub gate: GateConfig,
    pub cowardice: CowardiceConfig,
    pub lifecycle: LifecycleConfig,
    pub diminishing: DiminishingConfig,
}

impl CombatConfig {
    // ===== compile-time constants used as type parameters =====
    pub const MAX_STATUS_EFFECTS: usize = 16;
    pub const MAX_DR_BUCKETS: usize = 8;

    pub fn new() -> Self {
        Self::default()
    }
}

/// Per-exchange knobs.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ExchangeConfig {
    /// How long attacker and defender stay tagged "in combat" after a hit.
    pub combat_tag_ms: u64,
    /// Minimum interval between two ordinary NPC counter-swings.
    pub auto_attack_interval_ms: u64,
    /// `K` in the mitigation formula `K / (armor + K)`.
    pub armor_constant: f64,
    /// Whether a parry grants the defender a free counter-swing.
    pub riposte_on_parry: bool,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            combat_tag_ms: 6_000,
            auto_attack_interval_ms: 2_000,
            armor_constant: 100.0,
            riposte_on_parry: true,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ThreatConfig {
    pub threat_per_damage: f64,
    /// Linear decay applied per whole elapsed second.
    pub decay_per_second: f64,
    /// The top entry must reach this score to be selected as assist target.
    pub min_threat: f64,
    /// Ledgers whose last aggro is older than this yield no target.
    pub recency_window_ms: u64,
    /// Threat added to the taunter on top of the forced-target override.
    pub taunt_bonus: f64,
}

impl Default for ThreatConfig {
    fn default() -> Self {
        Self {
            threat_per_damage: 1.0,
            decay_per_second: 1.0,
            min_threat: 1.0,
            recency_window_ms: 30_000,
            taunt_bonus: 0.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct AssistConfig {
    pub radius: f64,
    pub strength: AssistStrength,
}

impl Default for AssistConfig {
    fn default() -> Self {
        Self {
            radius: 10.0,
            strength: AssistStrength::default(),
        }
    }
}

/// Seed multiplier applied to damage when an ally is drawn into a fight.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct AssistStrength {
    pub trash: f64,
    pub normal: f64,
    pub elite: f64,
    pub guard: f64,
    pub boss: f64,
}

impl AssistStrength {
    pub fn for_archetype(&self, archetype: Archetype) -> f64 {
        match archetype {
            Archetype::Trash => self.trash,
            Archetype::Normal => self.normal,
            Archetype::Elite => self.elite,
            Archetype::Guard => self.guard,
            Archetype::Boss => self.boss,
        }
    }
}

impl Default for AssistStrength {
    fn default() -> Self {
        Self {
            trash: 0.25,
            normal: 1.0,
            elite: 3.0,
            guard: 4.0,
            boss: 5.0,
        }
    }
}

/// "Gate for help" cast parameters.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct GateConfig {
    pub cast_ms: u64,
    pub cooldown_ms: u64,
    pub pushback_per_damage_ms: u64,
    pub max_pushback_ms: u64,
    /// Fraction of the caster's max hp that, dealt in a single hit,
    /// interrupts the cast. `None` disables interrupts.
    pub interrupt_burst_pct: Option<f64>,
    /// Allies farther than the assist radius but within this distance can be
    /// pulled by a completed cast.
    pub pull_radius: f64,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            cast_ms: 8_000,
            cooldown_ms: 30_000,
            pushback_per_damage_ms: 200,
            max_pushback_ms: 2_000,
            interrupt_burst_pct: None,
            pull_radius: 60.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct CowardiceConfig {
    pub pct_per_stack: f64,
    pub max_pct: f64,
    pub duration_ms: u64,
    pub max_stacks: u8,
}

impl Default for CowardiceConfig {
    fn default() -> Self {
        Self {
            pct_per_stack: 5.0,
            max_pct: 25.0,
            duration_ms: 60_000,
            max_stacks: 5,
        }
    }
}

/// Corpse visibility and respawn delays.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct LifecycleConfig {
    pub corpse_ms: u64,
    pub resource_corpse_ms: u64,
    pub beast_corpse_ms: u64,
    pub respawn_ms: u64,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            corpse_ms: 60_000,
            resource_corpse_ms: 5_000,
            beast_corpse_ms: 120_000,
            respawn_ms: 30_000,
        }
    }
}

/// Crowd-control diminishing returns.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct DiminishingConfig {
    /// Rolling window; each application inside it restarts the window.
    pub window_ms: u64,
    /// Multiplier applied per repeat application.
    pub factor: f64,
    /// Hard floor, as a fraction of the base duration.
    pub floor: f64,
}

impl Default for DiminishingConfig {
    fn default() -> Self {
        Self {
            window_ms: 18_000,
            factor: 0.5,
            floor: 0.25,
        }
    }
}
