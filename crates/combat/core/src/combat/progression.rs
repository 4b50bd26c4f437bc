//! Attacker progression earned per landed hit.

use crate::combat::hit::SKILL_POINTS_PER_LEVEL;

/// Resource points gained per point of damage dealt.
pub const RESOURCE_PER_DAMAGE: f64 = 0.5;
/// Per-hit resource gain cap.
pub const MAX_RESOURCE_PER_HIT: u32 = 15;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ProgressionGain {
    pub weapon_skill: u32,
    pub resource: u32,
}

impl ProgressionGain {
    pub fn is_empty(&self) -> bool {
        self.weapon_skill == 0 && self.resource == 0
    }
}

/// Gains for a hit dealing `damage`.
///
/// Weapon skill rises by one point while below the level cap
/// (`level × 5`). Nothing is earned for a zero-damage hit.
pub fn progression_for(level: u32, weapon_skill: u32, damage: u32) -> ProgressionGain {
    if damage == 0 {
        return ProgressionGain::default();
    }
    let cap = level.max(1).saturating_mul(SKILL_POINTS_PER_LEVEL);
    let skill = u32::from(weapon_skill < cap);
    let resource = (f64::from(damage) * RESOURCE_PER_DAMAGE).ceil() as u32;
    ProgressionGain {
        weapon_skill: skill,
        resource: resource.min(MAX_RESOURCE_PER_HIT),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skill_stops_at_level_cap() {
        assert_eq!(progression_for(2, 9, 4).weapon_skill, 1);
        assert_eq!(progression_for(2, 10, 4).weapon_skill, 0);
    }

    #[test]
    fn resource_rounds_up_and_caps() {
        assert_eq!(progression_for(1, 0, 3).resource, 2);
        assert_eq!(progression_for(1, 0, 100).resource, MAX_RESOURCE_PER_HIT);
    }

    #[test]
    fn zero_damage_earns_nothing() {
        assert!(progression_for(1, 0, 0).is_empty());
    }
}
