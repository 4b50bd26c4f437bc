//! Built-in damage formula for the simulator.

use async_trait::async_trait;

use runtime::{
    CollaboratorError, DamageEngine, DamageOptions, DamageRoll, DamageSource, DamageTarget,
};

/// Flat, deterministic formula: NPCs hit for their base damage, players for
/// `3 + level + weapon_skill / 10`. Ability multipliers and flat bonuses
/// apply on top. Never crits or glances.
#[derive(Debug, Clone, Copy, Default)]
pub struct DemoDamage;

impl DemoDamage {
    fn base(source: &DamageSource) -> f64 {
        match source.base_damage {
            Some(base) => f64::from(base),
            None => f64::from(
                source
                    .level
                    .saturating_add(3)
                    .saturating_add(source.weapon_skill / 10),
            ),
        }
    }
}

#[async_trait]
impl DamageEngine for DemoDamage {
    async fn compute_damage(
        &self,
        source: &DamageSource,
        _target: &DamageTarget,
        options: &DamageOptions,
    ) -> Result<DamageRoll, CollaboratorError> {
        let multiplier = options.damage_multiplier.unwrap_or(1.0).max(0.0);
        let damage = ((Self::base(source) * multiplier).floor() as u32)
            .saturating_add(options.flat_bonus.unwrap_or(0));

        Ok(DamageRoll {
            damage: damage.max(1),
            was_crit: false,
            was_glancing: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use combat_core::EntityId;

    use super::*;

    fn source(base_damage: Option<u32>) -> DamageSource {
        DamageSource {
            id: EntityId(1),
            name: "attacker".to_string(),
            level: 5,
            weapon_skill: 20,
            base_damage,
            ability: None,
        }
    }

    fn target() -> DamageTarget {
        DamageTarget {
            id: EntityId(2),
            name: "target".to_string(),
            level: 5,
            hp: 50,
            max_hp: 50,
        }
    }

    #[tokio::test]
    async fn players_scale_with_level_and_skill() {
        let roll = DemoDamage
            .compute_damage(&source(None), &target(), &DamageOptions::default())
            .await
            .unwrap();
        assert_eq!(roll.damage, 10);
        assert!(!roll.was_crit);
    }

    #[tokio::test]
    async fn extreme_levels_saturate() {
        let mut source = source(None);
        source.level = u32::MAX;
        let roll = DemoDamage
            .compute_damage(&source, &target(), &DamageOptions::default())
            .await
            .unwrap();
        assert_eq!(roll.damage, u32::MAX);
    }

    #[tokio::test]
    async fn abilities_scale_npc_base_damage() {
        let options = DamageOptions {
            damage_multiplier: Some(2.0),
            flat_bonus: Some(3),
            ..DamageOptions::default()
        };
        let roll = DemoDamage
            .compute_damage(&source(Some(4)), &target(), &options)
            .await
            .unwrap();
        assert_eq!(roll.damage, 11);
    }
}
