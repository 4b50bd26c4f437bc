//! Status effects and crowd-control diminishing returns.
//!
//! Effects store an absolute `expires_at` and are compared against the
//! caller's wall-clock `Timestamp`; an effect is active while
//! `now < expires_at`. Nothing here removes expired entries implicitly, use
//! [`StatusEffects::purge_expired`] for that.

use arrayvec::ArrayVec;

use crate::config::{CombatConfig, CowardiceConfig, DiminishingConfig};
use crate::state::{EntityId, Timestamp};

/// Active effects on a combatant plus its diminishing-returns buckets.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StatusEffects {
    effects: ArrayVec<StatusEffect, { CombatConfig::MAX_STATUS_EFFECTS }>,
    diminishing: ArrayVec<DrEntry, { CombatConfig::MAX_DR_BUCKETS }>,
}

/// A single effect instance. Effects are keyed by `(tag, source)`.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StatusEffect {
    pub tag: EffectTag,
    pub source: Option<EntityId>,
    pub applied_at: Timestamp,
    pub expires_at: Timestamp,
    /// Additive "damage taken" percentage while active (e.g. `5.0` = +5%).
    pub damage_taken_pct: f64,
    /// Used by stacking effects such as [`EffectTag::Cowardice`].
    pub stacks: u8,
}

impl StatusEffect {
    pub fn new(tag: EffectTag, applied_at: Timestamp, duration_ms: u64) -> Self {
        Self {
            tag,
            source: None,
            applied_at,
            expires_at: applied_at.plus_ms(duration_ms),
            damage_taken_pct: 0.0,
            stacks: 1,
        }
    }

    #[must_use]
    pub fn from_source(mut self, source: EntityId) -> Self {
        self.source = Some(source);
        self
    }

    #[must_use]
    pub fn with_damage_taken_pct(mut self, pct: f64) -> Self {
        self.damage_taken_pct = pct;
        self
    }

    pub fn is_active(&self, now: Timestamp) -> bool {
        now < self.expires_at
    }
}

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, strum::Display, strum::EnumString, strum::AsRefStr,
)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[strum(serialize_all = "snake_case")]
pub enum EffectTag {
    // ========================================================================
    // Crowd Control
    // ========================================================================
    Stunned,
    Rooted,
    Mesmerized,
    Asleep,
    Feared,
    Silenced,

    // ========================================================================
    // Concealment
    // ========================================================================
    /// Hidden from observers; blocks assist-seeded threat.
    Stealthed,

    // ========================================================================
    // Debuffs
    // ========================================================================
    /// Generic "damage taken" increase.
    Vulnerable,
    /// Stacking penalty for fleeing an engaged fight.
    Cowardice,
    Poisoned,
}

impl EffectTag {
    /// Bucket shared for diminishing returns, `None` if the tag is not CC.
    pub const fn dr_bucket(self) -> Option<DrBucket> {
        match self {
            EffectTag::Stunned => Some(DrBucket::Stun),
            EffectTag::Rooted => Some(DrBucket::Root),
            EffectTag::Mesmerized | EffectTag::Asleep => Some(DrBucket::Incapacitate),
            EffectTag::Feared => Some(DrBucket::Fear),
            EffectTag::Silenced => Some(DrBucket::Silence),
            _ => None,
        }
    }

    pub const fn conceals(self) -> bool {
        matches!(self, EffectTag::Stealthed)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, strum::Display)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[strum(serialize_all = "snake_case")]
pub enum DrBucket {
    Stun,
    Root,
    /// Shared by mesmerize and sleep.
    Incapacitate,
    Fear,
    Silence,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
struct DrEntry {
    bucket: DrBucket,
    /// Applications already made inside the current window.
    applications: u32,
    window_ends_at: Timestamp,
}

impl StatusEffects {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Checks if an effect with `tag` is active at `now`.
    pub fn has(&self, tag: EffectTag, now: Timestamp) -> bool {
        self.effects.iter().any(|e| e.tag == tag && e.is_active(now))
    }

    pub fn get(&self, tag: EffectTag, source: Option<EntityId>) -> Option<&StatusEffect> {
        self.effects
            .iter()
            .find(|e| e.tag == tag && e.source == source)
    }

    /// Whether any concealment effect is active.
    pub fn is_concealed(&self, now: Timestamp) -> bool {
        self.effects
            .iter()
            .any(|e| e.tag.conceals() && e.is_active(now))
    }

    /// Inserts an effect, replacing an existing one with the same
    /// `(tag, source)` key.
    ///
    /// Returns `false` when the set is full and the effect was dropped.
    pub fn insert(&mut self, effect: StatusEffect) -> bool {
        if let Some(existing) = self
            .effects
            .iter_mut()
            .find(|e| e.tag == effect.tag && e.source == effect.source)
        {
            *existing = effect;
            return true;
        }
        self.effects.try_push(effect).is_ok()
    }

    /// Whether `insert` would store an effect with this key.
    fn has_room_for(&self, tag: EffectTag, source: Option<EntityId>) -> bool {
        !self.effects.is_full() || self.get(tag, source).is_some()
    }

    /// Applies a timed effect, scaling its duration by diminishing returns
    /// when the tag belongs to a CC bucket. Returns the duration actually
    /// applied in milliseconds, or `None` when the set is full; a dropped
    /// effect is not charged to its DR bucket.
    pub fn apply_timed(
        &mut self,
        mut effect: StatusEffect,
        base_duration_ms: u64,
        now: Timestamp,
        dr: &DiminishingConfig,
    ) -> Option<u64> {
        if !self.has_room_for(effect.tag, effect.source) {
            return None;
        }
        let duration = match effect.tag.dr_bucket() {
            Some(bucket) => self.diminish(bucket, base_duration_ms, now, dr),
            None => base_duration_ms,
        };
        effect.applied_at = now;
        effect.expires_at = now.plus_ms(duration);
        self.insert(effect).then_some(duration)
    }

    /// Returns the DR-scaled duration for another application in `bucket`
    /// and records the application.
    fn diminish(
        &mut self,
        bucket: DrBucket,
        base_duration_ms: u64,
        now: Timestamp,
        dr: &DiminishingConfig,
    ) -> u64 {
        let window_ends_at = now.plus_ms(dr.window_ms);
        let applications = match self.diminishing.iter_mut().find(|d| d.bucket == bucket) {
            Some(entry) => {
                if now < entry.window_ends_at {
                    entry.applications += 1;
                } else {
                    entry.applications = 0;
                }
                entry.window_ends_at = window_ends_at;
                entry.applications
            }
            None => {
                // Full set: oldest-expiring bucket gives way.
                if self.diminishing.is_full()
                    && let Some(idx) = self
                        .diminishing
                        .iter()
                        .enumerate()
                        .min_by_key(|(_, d)| d.window_ends_at)
                        .map(|(i, _)| i)
                {
                    self.diminishing.remove(idx);
                }
                self.diminishing.push(DrEntry {
                    bucket,
                    applications: 0,
                    window_ends_at,
                });
                0
            }
        };

        let factor = if dr.factor.is_finite() {
            dr.factor.clamp(0.0, 1.0)
        } else {
            1.0
        };
        let floor = if dr.floor.is_finite() {
            dr.floor.clamp(0.0, 1.0)
        } else {
            0.0
        };
        let exponent = i32::try_from(applications).unwrap_or(i32::MAX);
        let scale = factor.powi(exponent).max(floor);
        (base_duration_ms as f64 * scale).floor() as u64
    }

    /// Adds one cowardice stack (refreshing the expiry), up to `max_stacks`.
    /// Returns the resulting stack count, or `None` when there was no slot
    /// for a first stack.
    pub fn add_cowardice_stack(&mut self, now: Timestamp, config: &CowardiceConfig) -> Option<u8> {
        let expires_at = now.plus_ms(config.duration_ms);
        if let Some(existing) = self
            .effects
            .iter_mut()
            .find(|e| e.tag == EffectTag::Cowardice)
        {
            existing.stacks = if existing.is_active(now) {
                existing.stacks.saturating_add(1).min(config.max_stacks.max(1))
            } else {
                1
            };
            existing.expires_at = expires_at;
            return Some(existing.stacks);
        }
        let mut effect = StatusEffect::new(EffectTag::Cowardice, now, config.duration_ms);
        effect.stacks = 1;
        self.insert(effect).then_some(1)
    }

    /// Total additive "damage taken" percentage active at `now`.
    ///
    /// Every active source contributes its percentage once; cowardice
    /// contributes `stacks × pct_per_stack` capped at `max_pct`. Expired
    /// entries contribute nothing but stay in the set.
    pub fn damage_taken_pct(&self, now: Timestamp, cowardice: &CowardiceConfig) -> f64 {
        self.effects
            .iter()
            .filter(|e| e.is_active(now))
            .map(|e| match e.tag {
                EffectTag::Cowardice => {
                    (f64::from(e.stacks) * cowardice.pct_per_stack).min(cowardice.max_pct)
                }
                _ => e.damage_taken_pct,
            })
            .filter(|pct| pct.is_finite())
            .sum()
    }

    pub fn remove(&mut self, tag: EffectTag) {
        self.effects.retain(|e| e.tag != tag);
    }

    /// Drops every effect. Diminishing-returns history is kept.
    pub fn clear(&mut self) {
        self.effects.clear();
    }

    pub fn purge_expired(&mut self, now: Timestamp) {
        self.effects.retain(|e| e.is_active(now));
    }

    pub fn active_at(&self, now: Timestamp) -> impl Iterator<Item = &StatusEffect> + '_ {
        self.effects.iter().filter(move |e| e.is_active(now))
    }

    pub fn iter(&self) -> impl Iterator<Item = &StatusEffect> {
        self.effects.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }
}
