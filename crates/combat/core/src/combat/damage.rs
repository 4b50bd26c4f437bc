//! Damage application pipeline.
//!
//! # Mitigation order
//!
//! ```text
//! after_armor = floor(raw × K / (armor + K))          // armor or school resist
//! final       = floor(after_armor × (1 + Σpct / 100)) // additive damage-taken mods
//! ```
//!
//! Both steps floor, and the order is fixed: flooring makes the two orders
//! produce different results for small hits (raw 5, armor 100, +25%: 2 vs 3).
//! Damage-taken sources are summed once, never compounded.

use crate::config::CombatConfig;
use crate::error::CombatError;
use crate::state::{CombatWorld, EntityId, Timestamp};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, strum::Display, strum::EnumString)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[strum(serialize_all = "snake_case")]
pub enum DamageChannel {
    /// Melee and ranged weapons; mitigated by armor, goes through the hit resolver.
    #[default]
    Physical,
    Fire,
    Frost,
    Nature,
    Shadow,
    Holy,
    Arcane,
}

impl DamageChannel {
    pub const fn is_spell(self) -> bool {
        !matches!(self, DamageChannel::Physical)
    }
}

/// Per-school resist values.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Resists {
    pub fire: u32,
    pub frost: u32,
    pub nature: u32,
    pub shadow: u32,
    pub holy: u32,
    pub arcane: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Mitigation {
    pub armor: u32,
    pub resists: Resists,
}

impl Mitigation {
    pub fn armor(armor: u32) -> Self {
        Self {
            armor,
            resists: Resists::default(),
        }
    }

    /// Mitigation value that applies to `channel`.
    pub fn value_for(&self, channel: DamageChannel) -> u32 {
        match channel {
            DamageChannel::Physical => self.armor,
            DamageChannel::Fire => self.resists.fire,
            DamageChannel::Frost => self.resists.frost,
            DamageChannel::Nature => self.resists.nature,
            DamageChannel::Shadow => self.resists.shadow,
            DamageChannel::Holy => self.resists.holy,
            DamageChannel::Arcane => self.resists.arcane,
        }
    }
}

/// Optional ability data attached to a swing or cast.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AbilityMeta {
    pub name: String,
    pub multiplier: f64,
    pub flat_bonus: u32,
    pub channel: DamageChannel,
}

impl AbilityMeta {
    pub fn new(name: impl Into<String>, channel: DamageChannel) -> Self {
        Self {
            name: name.into(),
            multiplier: 1.0,
            flat_bonus: 0,
            channel,
        }
    }
}

/// Transient per-swing attacker description. Never persisted.
#[derive(Clone, Debug, PartialEq)]
pub struct AttackerContext {
    pub id: Option<EntityId>,
    pub level: u32,
    pub weapon_skill: u32,
    pub ability: Option<AbilityMeta>,
}

impl AttackerContext {
    pub fn channel(&self) -> DamageChannel {
        self.ability
            .as_ref()
            .map_or(DamageChannel::Physical, |a| a.channel)
    }
}

/// Result of applying damage to one target.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DamageReport {
    /// Damage after the full mitigation chain.
    pub amount: u32,
    /// Portion of `amount` beyond the target's remaining health.
    pub overkill: u32,
    pub new_hp: u32,
    pub max_hp: u32,
    pub killed: bool,
}

/// `K / (value + K)`; `1.0` for a degenerate constant.
pub fn mitigation_multiplier(value: u32, armor_constant: f64) -> f64 {
    if !armor_constant.is_finite() || armor_constant <= 0.0 {
        return 1.0;
    }
    armor_constant / (f64::from(value) + armor_constant)
}

/// Runs the two-step mitigation chain on a raw amount.
pub fn mitigate(raw: u32, mitigation_value: u32, damage_taken_pct: f64, armor_constant: f64) -> u32 {
    let after_armor = (f64::from(raw) * mitigation_multiplier(mitigation_value, armor_constant)).floor();
    let pct = if damage_taken_pct.is_finite() {
        damage_taken_pct
    } else {
        0.0
    };
    let scaled = (after_armor * (1.0 + pct / 100.0)).floor();
    if scaled <= 0.0 { 0 } else { scaled as u32 }
}

/// Applies damage to `target` in place.
///
/// Marks attacker and defender in combat, mitigates, and pins health at zero
/// on a lethal hit. Applying damage to an already-dead target reports
/// `killed` again; callers guard their death handling. Protected targets
/// take nothing. Rewards and lifecycle are the caller's job.
pub fn apply_damage(
    world: &mut CombatWorld,
    target: EntityId,
    raw: u32,
    attacker: Option<&AttackerContext>,
    now: Timestamp,
    config: &CombatConfig,
) -> Result<DamageReport, CombatError> {
    let tag_ms = config.combat.combat_tag_ms;
    let channel = attacker.map_or(DamageChannel::Physical, AttackerContext::channel);

    if let Some(attacker_id) = attacker.and_then(|a| a.id)
        && attacker_id != target
        && let Some(source) = world.get_mut(attacker_id)
    {
        source.tag_combat(now, tag_ms);
        source.engaged_target = Some(target);
    }

    let defender = world.require_mut(target)?;
    defender.tag_combat(now, tag_ms);

    if defender.protected {
        return Ok(DamageReport {
            amount: 0,
            overkill: 0,
            new_hp: defender.hp,
            max_hp: defender.max_hp,
            killed: false,
        });
    }

    let pct = defender
        .effects
        .damage_taken_pct(now, &config.cowardice);
    let amount = mitigate(
        raw,
        defender.mitigation.value_for(channel),
        pct,
        config.combat.armor_constant,
    );

    let overkill = amount.saturating_sub(defender.hp);
    defender.hp = defender.hp.saturating_sub(amount);
    let killed = defender.hp == 0;
    if killed {
        defender.alive = false;
    }

    Ok(DamageReport {
        amount,
        overkill,
        new_hp: defender.hp,
        max_hp: defender.max_hp,
        killed,
    })
}

/// Scales a damage amount by a block multiplier, flooring.
pub fn apply_block(amount: u32, block_multiplier: f64) -> u32 {
    if !block_multiplier.is_finite() {
        return amount;
    }
    let scaled = (f64::from(amount) * block_multiplier.clamp(0.0, 1.0)).floor();
    scaled as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{Combatant, EffectTag, StatusEffect};

    fn world_with_target(hp: u32, armor: u32) -> (CombatWorld, EntityId) {
        let mut world = CombatWorld::new();
        let id = world.insert(
            Combatant::player(EntityId::default(), "target", 10, hp)
                .with_mitigation(Mitigation::armor(armor)),
        );
        (world, id)
    }

    fn vulnerable(source: u32, pct: f64) -> StatusEffect {
        StatusEffect::new(EffectTag::Vulnerable, Timestamp::ZERO, 60_000)
            .from_source(EntityId(source))
            .with_damage_taken_pct(pct)
    }

    #[test]
    fn armor_applies_before_damage_taken() {
        let config = CombatConfig::default();
        let (mut world, id) = world_with_target(100, 100);
        world
            .get_mut(id)
            .unwrap()
            .effects
            .insert(vulnerable(1, 25.0));

        let report = apply_damage(&mut world, id, 5, None, Timestamp(1), &config).unwrap();

        let armor_mult = mitigation_multiplier(100, config.combat.armor_constant);
        let armor_first = ((5.0 * armor_mult).floor() * 1.25).floor() as u32;
        let taken_first = ((5.0_f64 * 1.25).floor() * armor_mult).floor() as u32;
        assert_eq!(armor_first, 2);
        assert_eq!(taken_first, 3);
        assert_eq!(report.amount, armor_first);
        assert_eq!(report.new_hp, 98);
    }

    #[test]
    fn damage_taken_sources_stack_additively() {
        let config = CombatConfig::default();
        let (mut world, id) = world_with_target(1_000, 0);
        {
            let effects = &mut world.get_mut(id).unwrap().effects;
            effects.insert(vulnerable(1, 5.0));
            effects.insert(vulnerable(2, 10.0));
            effects.insert(vulnerable(3, 10.0));
        }

        let report = apply_damage(&mut world, id, 100, None, Timestamp(1), &config).unwrap();

        // 1.05 × 1.10 × 1.10 would give 127.
        assert_eq!(report.amount, 125);
    }

    #[test]
    fn five_five_ten_adds_to_twenty_percent() {
        let config = CombatConfig::default();
        let (mut world, id) = world_with_target(1_000, 0);
        {
            let effects = &mut world.get_mut(id).unwrap().effects;
            effects.insert(vulnerable(1, 5.0));
            effects.insert(vulnerable(2, 5.0));
            effects.insert(vulnerable(3, 10.0));
        }

        let report = apply_damage(&mut world, id, 100, None, Timestamp(1), &config).unwrap();

        // 1.05 × 1.05 × 1.10 would give 121.
        assert_eq!(report.amount, 120);
    }

    #[test]
    fn cowardice_counts_while_unexpired_only() {
        let config = CombatConfig::default();
        let (mut world, id) = world_with_target(1_000, 0);
        {
            let effects = &mut world.get_mut(id).unwrap().effects;
            effects.add_cowardice_stack(Timestamp::ZERO, &config.cowardice);
            effects.add_cowardice_stack(Timestamp::ZERO, &config.cowardice);
        }

        let during = apply_damage(&mut world, id, 100, None, Timestamp(10), &config).unwrap();
        let expired_at = Timestamp(config.cowardice.duration_ms);
        let after = apply_damage(&mut world, id, 100, None, expired_at, &config).unwrap();

        assert_eq!(during.amount, 110);
        assert_eq!(after.amount, 100);
        assert!(world.get(id).unwrap().effects.get(EffectTag::Cowardice, None).is_some());
    }

    #[test]
    fn lethal_hit_pins_health_at_zero() {
        let config = CombatConfig::default();
        let (mut world, id) = world_with_target(10, 0);

        let report = apply_damage(&mut world, id, 25, None, Timestamp(1), &config).unwrap();

        assert!(report.killed);
        assert_eq!(report.new_hp, 0);
        assert_eq!(report.overkill, 15);
        assert!(!world.get(id).unwrap().alive);
    }

    #[test]
    fn hitting_a_corpse_reports_killed_again() {
        let config = CombatConfig::default();
        let (mut world, id) = world_with_target(10, 0);
        apply_damage(&mut world, id, 10, None, Timestamp(1), &config).unwrap();

        let again = apply_damage(&mut world, id, 3, None, Timestamp(2), &config).unwrap();
        assert!(again.killed);
        assert_eq!(again.new_hp, 0);
    }

    #[test]
    fn protected_targets_take_nothing() {
        let config = CombatConfig::default();
        let (mut world, id) = world_with_target(10, 0);
        world.get_mut(id).unwrap().protected = true;

        let report = apply_damage(&mut world, id, 50, None, Timestamp(1), &config).unwrap();
        assert_eq!(report.amount, 0);
        assert!(!report.killed);
    }

    #[test]
    fn both_sides_are_tagged_in_combat() {
        let config = CombatConfig::default();
        let (mut world, target) = world_with_target(100, 0);
        let attacker = world.insert(Combatant::player(EntityId::default(), "a", 5, 50));
        let ctx = AttackerContext {
            id: Some(attacker),
            level: 5,
            weapon_skill: 25,
            ability: None,
        };

        apply_damage(&mut world, target, 1, Some(&ctx), Timestamp(100), &config).unwrap();

        let until = Timestamp(100 + config.combat.combat_tag_ms);
        assert_eq!(world.get(target).unwrap().in_combat_until, Some(until));
        assert_eq!(world.get(attacker).unwrap().in_combat_until, Some(until));
        assert_eq!(world.get(attacker).unwrap().engaged_target, Some(target));
    }

    #[test]
    fn spell_channels_use_school_resist() {
        let config = CombatConfig::default();
        let (mut world, id) = world_with_target(1_000, 1_000);
        world.get_mut(id).unwrap().mitigation.resists.fire = 100;
        let ctx = AttackerContext {
            id: None,
            level: 1,
            weapon_skill: 0,
            ability: Some(AbilityMeta::new("firebolt", DamageChannel::Fire)),
        };

        let report = apply_damage(&mut world, id, 40, Some(&ctx), Timestamp(1), &config).unwrap();
        assert_eq!(report.amount, 20);
    }

    #[test]
    fn block_floors() {
        assert_eq!(apply_block(8, 0.76), 6);
        assert_eq!(apply_block(10, 0.9), 9);
        assert_eq!(apply_block(10, f64::NAN), 10);
    }
}
