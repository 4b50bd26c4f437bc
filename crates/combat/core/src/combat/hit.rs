//! Physical hit resolution.
//!
//! [`resolve_swing`] turns levels and skill investment into a swing outcome
//! plus the odds the damage engine should use for crits, glancing blows and
//! multi-strikes. It is pure: the only input besides the numbers is the
//! injected [`RollSource`].
//!
//! # Draws
//!
//! ```text
//! draw 1  > hit_chance                -> Miss (terminal)
//! draw 2  in [0, dodge)               -> Dodge
//!         in [dodge, +parry)          -> Parry (riposte)
//!         in [+parry, +block)         -> Block (partial mitigation)
//! draw 3  triple / double bands       -> strike count (Hit only, multi-strike enabled)
//! ```

use bitflags::bitflags;

use crate::rng::{RollSource, sanitize_roll};

/// Weapon/defense skill points per level for full familiarity.
pub const SKILL_POINTS_PER_LEVEL: u32 = 5;

pub const BASE_HIT_CHANCE: f64 = 0.82;
pub const MIN_HIT_CHANCE: f64 = 0.05;
pub const MAX_HIT_CHANCE: f64 = 0.97;

pub const BASE_BLOCK_MULTIPLIER: f64 = 0.85;
/// Lower bound is exclusive in the contract `(0.35, 0.90]`.
pub const MIN_BLOCK_MULTIPLIER: f64 = 0.36;
pub const MAX_BLOCK_MULTIPLIER: f64 = 0.90;

const DODGE_CAP: f64 = 0.25;
const PARRY_CAP: f64 = 0.25;
const BLOCK_CAP: f64 = 0.30;
const MAX_CRIT_CHANCE: f64 = 0.25;
const MIN_GLANCING_CHANCE: f64 = 0.01;
const MAX_GLANCING_CHANCE: f64 = 0.25;

bitflags! {
    /// Swing features that can be toggled per exchange.
    ///
    /// A disabled avoidance type has zero width and cannot be rolled.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct SwingCapabilities: u8 {
        const DODGE = 1 << 0;
        const PARRY = 1 << 1;
        const BLOCK = 1 << 2;
        const CRIT = 1 << 3;
        const MULTI_STRIKE = 1 << 4;
    }
}

impl Default for SwingCapabilities {
    fn default() -> Self {
        Self::all()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, strum::Display)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[strum(serialize_all = "snake_case")]
pub enum SwingOutcome {
    Hit,
    Miss,
    Dodge,
    Parry,
    Block,
}

impl SwingOutcome {
    /// Whether the swing connects and should produce damage.
    pub const fn connects(self) -> bool {
        matches!(self, SwingOutcome::Hit | SwingOutcome::Block)
    }
}

/// Inputs for one swing.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SwingInput {
    pub attacker_level: u32,
    pub defender_level: u32,
    pub weapon_skill: u32,
    /// `None` means the defender has no defense investment.
    pub defense_skill: Option<u32>,
    pub capabilities: SwingCapabilities,
}

impl SwingInput {
    pub fn new(attacker_level: u32, defender_level: u32, weapon_skill: u32) -> Self {
        Self {
            attacker_level,
            defender_level,
            weapon_skill,
            defense_skill: None,
            capabilities: SwingCapabilities::default(),
        }
    }

    #[must_use]
    pub fn with_defense_skill(mut self, points: Option<u32>) -> Self {
        self.defense_skill = points;
        self
    }

    #[must_use]
    pub fn with_capabilities(mut self, capabilities: SwingCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }
}

/// Result of a swing. Immutable, consumed once by the orchestrator.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HitResolution {
    pub outcome: SwingOutcome,
    /// 1..=3 on a hit, 1 otherwise.
    pub strikes: u8,
    pub crit_chance: f64,
    pub glancing_chance: f64,
    /// Damage multiplier on `Block`, `1.0` for every other outcome.
    pub block_multiplier: f64,
    /// Set on `Parry`: the defender earns a free counter-swing.
    pub riposte: bool,
    /// Diagnostics only.
    pub hit_chance: f64,
}

/// Width of each avoidance band on the second draw.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AvoidanceBands {
    pub dodge: f64,
    pub parry: f64,
    pub block: f64,
}

/// Normalized skill investment: `points / (level × 5)`, clamped to `[0, 1]`.
pub fn familiarity(points: u32, level: u32) -> f64 {
    let cap = f64::from(level.max(1)) * f64::from(SKILL_POINTS_PER_LEVEL);
    finite_clamp(f64::from(points) / cap, 0.0, 1.0, 0.0)
}

/// Chance that the first draw lands the swing.
pub fn hit_chance(attacker_level: u32, defender_level: u32, attacker_familiarity: f64) -> f64 {
    let attacker_level = attacker_level.max(1);
    let a_fam = finite_clamp(attacker_familiarity, 0.0, 1.0, 0.0);
    let delta = level_delta(attacker_level, defender_level.max(1));

    let untrained = (0.004 * f64::from(attacker_level)).min(0.25) * (1.0 - a_fam);
    let level_adj = if delta >= 0.0 {
        (0.005 * delta).min(0.05)
    } else {
        (0.02 * delta).max(-0.40)
    };
    let familiarity_bonus = 0.05 * a_fam;

    finite_clamp(
        BASE_HIT_CHANCE - untrained + level_adj + familiarity_bonus,
        MIN_HIT_CHANCE,
        MAX_HIT_CHANCE,
        MIN_HIT_CHANCE,
    )
}

pub fn avoidance_bands(
    attacker_level: u32,
    defender_level: u32,
    defense_familiarity: f64,
    capabilities: SwingCapabilities,
) -> AvoidanceBands {
    let d_fam = finite_clamp(defense_familiarity, 0.0, 1.0, 0.0);
    let behind = (-level_delta(attacker_level.max(1), defender_level.max(1))).max(0.0);

    let band = |enabled: bool, base: f64, fam: f64, cap: f64| {
        if enabled {
            finite_clamp(base + fam * d_fam + 0.001 * behind, 0.0, cap, 0.0)
        } else {
            0.0
        }
    };

    AvoidanceBands {
        dodge: band(
            capabilities.contains(SwingCapabilities::DODGE),
            0.03,
            0.03,
            DODGE_CAP,
        ),
        parry: band(
            capabilities.contains(SwingCapabilities::PARRY),
            0.02,
            0.03,
            PARRY_CAP,
        ),
        block: band(
            capabilities.contains(SwingCapabilities::BLOCK),
            0.03,
            0.04,
            BLOCK_CAP,
        ),
    }
}

/// Fraction of damage that passes a block, in `(0.35, 0.90]`.
///
/// Decreases with defense familiarity (up to 0.30) and with the defender's
/// level advantage (up to 0.12 net).
pub fn block_multiplier(attacker_level: u32, defender_level: u32, defense_familiarity: f64) -> f64 {
    let d_fam = finite_clamp(defense_familiarity, 0.0, 1.0, 0.0);
    let advantage = -level_delta(attacker_level.max(1), defender_level.max(1));
    let level_term = finite_clamp(0.01 * advantage, -0.05, 0.12, 0.0);
    finite_clamp(
        BASE_BLOCK_MULTIPLIER - 0.30 * d_fam - level_term,
        MIN_BLOCK_MULTIPLIER,
        MAX_BLOCK_MULTIPLIER,
        MAX_BLOCK_MULTIPLIER,
    )
}

pub fn crit_chance(
    attacker_level: u32,
    defender_level: u32,
    attacker_familiarity: f64,
    defense_familiarity: f64,
    enabled: bool,
) -> f64 {
    if !enabled {
        return 0.0;
    }
    let a_fam = finite_clamp(attacker_familiarity, 0.0, 1.0, 0.0);
    let d_fam = finite_clamp(defense_familiarity, 0.0, 1.0, 0.0);
    let delta = level_delta(attacker_level.max(1), defender_level.max(1));
    let raw = 0.05 + 0.05 * a_fam - 0.03 * d_fam + finite_clamp(0.005 * delta, -0.05, 0.05, 0.0);
    finite_clamp(raw, 0.0, MAX_CRIT_CHANCE, 0.0)
}

/// Higher when the attacker is untrained or outmatched.
pub fn glancing_chance(attacker_level: u32, defender_level: u32, attacker_familiarity: f64) -> f64 {
    let a_fam = finite_clamp(attacker_familiarity, 0.0, 1.0, 0.0);
    let behind = (-level_delta(attacker_level.max(1), defender_level.max(1))).max(0.0);
    finite_clamp(
        0.05 + 0.10 * (1.0 - a_fam) + 0.01 * behind,
        MIN_GLANCING_CHANCE,
        MAX_GLANCING_CHANCE,
        MIN_GLANCING_CHANCE,
    )
}

/// Triple/double strike odds for a given attacker familiarity.
pub fn strike_bands(attacker_familiarity: f64) -> (f64, f64) {
    let a_fam = finite_clamp(attacker_familiarity, 0.0, 1.0, 0.0);
    (0.02 + 0.03 * a_fam, 0.08 + 0.10 * a_fam)
}

/// Resolves one physical swing.
pub fn resolve_swing<R>(input: &SwingInput, rolls: &mut R) -> HitResolution
where
    R: RollSource + ?Sized,
{
    let attacker_level = input.attacker_level.max(1);
    let defender_level = input.defender_level.max(1);
    let a_fam = familiarity(input.weapon_skill, attacker_level);
    let d_fam = input
        .defense_skill
        .map_or(0.0, |points| familiarity(points, defender_level));
    let caps = input.capabilities;

    let hit_chance = hit_chance(attacker_level, defender_level, a_fam);
    let crit_chance = crit_chance(
        attacker_level,
        defender_level,
        a_fam,
        d_fam,
        caps.contains(SwingCapabilities::CRIT),
    );
    let glancing_chance = glancing_chance(attacker_level, defender_level, a_fam);

    let mut resolution = HitResolution {
        outcome: SwingOutcome::Miss,
        strikes: 1,
        crit_chance,
        glancing_chance,
        block_multiplier: 1.0,
        riposte: false,
        hit_chance,
    };

    if sanitize_roll(rolls.next_roll()) > hit_chance {
        return resolution;
    }

    let bands = avoidance_bands(attacker_level, defender_level, d_fam, caps);
    let avoid = sanitize_roll(rolls.next_roll());
    if avoid < bands.dodge {
        resolution.outcome = SwingOutcome::Dodge;
        return resolution;
    }
    if avoid < bands.dodge + bands.parry {
        resolution.outcome = SwingOutcome::Parry;
        resolution.riposte = true;
        return resolution;
    }
    if avoid < bands.dodge + bands.parry + bands.block {
        resolution.outcome = SwingOutcome::Block;
        resolution.block_multiplier = block_multiplier(attacker_level, defender_level, d_fam);
        return resolution;
    }

    resolution.outcome = SwingOutcome::Hit;
    if caps.contains(SwingCapabilities::MULTI_STRIKE) {
        let (triple, double) = strike_bands(a_fam);
        let draw = sanitize_roll(rolls.next_roll());
        resolution.strikes = if draw < triple {
            3
        } else if draw < triple + double {
            2
        } else {
            1
        };
    }
    resolution
}

fn level_delta(attacker_level: u32, defender_level: u32) -> f64 {
    f64::from(attacker_level) - f64::from(defender_level)
}

/// Clamp that maps non-finite input to `fallback` (itself clamped).
fn finite_clamp(value: f64, min: f64, max: f64, fallback: f64) -> f64 {
    if value.is_finite() {
        value.clamp(min, max)
    } else {
        fallback.clamp(min, max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::{PcgRolls, SequenceRolls};

    #[test]
    fn hit_chance_stays_in_bounds() {
        for attacker in [1, 2, 10, 30, 60, 100, 500] {
            for defender in [1, 5, 10, 60, 100, 500] {
                for skill in [0, 1, 50, 10_000] {
                    let fam = familiarity(skill, attacker);
                    let chance = hit_chance(attacker, defender, fam);
                    assert!(
                        (MIN_HIT_CHANCE..=MAX_HIT_CHANCE).contains(&chance),
                        "L{attacker} vs L{defender} skill {skill}: {chance}"
                    );
                }
            }
        }
    }

    #[test]
    fn zero_levels_are_normalized() {
        let a = resolve_swing(&SwingInput::new(0, 0, 0), &mut SequenceRolls::new(vec![0.5, 0.9, 0.9]));
        let b = resolve_swing(&SwingInput::new(1, 1, 0), &mut SequenceRolls::new(vec![0.5, 0.9, 0.9]));
        assert_eq!(a, b);
    }

    #[test]
    fn draw_above_hit_chance_is_terminal_miss() {
        let mut rolls = SequenceRolls::new(vec![0.99, 0.0, 0.0]);
        let result = resolve_swing(&SwingInput::new(10, 10, 50), &mut rolls);
        assert_eq!(result.outcome, SwingOutcome::Miss);
        assert_eq!(rolls.consumed(), 1);
        assert_eq!(result.strikes, 1);
    }

    #[test]
    fn familiarity_rewards_training() {
        let untrained = hit_chance(40, 40, familiarity(0, 40));
        let trained = hit_chance(40, 40, familiarity(200, 40));
        assert!(trained > untrained);
    }

    #[test]
    fn being_behind_hurts_more_than_being_ahead_helps() {
        let even = hit_chance(20, 20, 1.0);
        let ahead = hit_chance(25, 20, 1.0);
        let behind = hit_chance(20, 25, 1.0);
        assert!(ahead - even < even - behind);
    }

    #[test]
    fn parry_sets_riposte() {
        // L10 vs L10, no defense skill: dodge 0.03, parry 0.02
        let mut rolls = SequenceRolls::new(vec![0.0, 0.04]);
        let result = resolve_swing(&SwingInput::new(10, 10, 50), &mut rolls);
        assert_eq!(result.outcome, SwingOutcome::Parry);
        assert!(result.riposte);
        assert_eq!(result.block_multiplier, 1.0);
    }

    #[test]
    fn disabled_avoidance_cannot_be_rolled() {
        let caps = SwingCapabilities::all() - SwingCapabilities::DODGE - SwingCapabilities::PARRY;
        let input = SwingInput::new(10, 10, 50).with_capabilities(caps);
        // A draw of 0.0 would be a dodge with dodge enabled.
        let result = resolve_swing(&input, &mut SequenceRolls::new(vec![0.0, 0.0]));
        assert_eq!(result.outcome, SwingOutcome::Block);

        let none = SwingCapabilities::CRIT;
        let input = SwingInput::new(10, 10, 50).with_capabilities(none);
        let result = resolve_swing(&input, &mut SequenceRolls::new(vec![0.0, 0.0]));
        assert_eq!(result.outcome, SwingOutcome::Hit);
        assert_eq!(result.strikes, 1);
    }

    #[test]
    fn block_multiplier_bounds_over_level_grid() {
        for attacker in [1, 5, 20, 60] {
            for defender in [1, 5, 20, 60] {
                for fam in [0.0, 0.25, 0.5, 1.0, f64::NAN, f64::INFINITY] {
                    let m = block_multiplier(attacker, defender, fam);
                    assert!(m > 0.35 && m <= 0.90, "{attacker}/{defender}/{fam}: {m}");
                }
            }
        }
    }

    #[test]
    fn block_multiplier_drops_with_defense_investment() {
        let level = 20;
        let cap = level * SKILL_POINTS_PER_LEVEL;
        let zero = block_multiplier(level, level, familiarity(0, level));
        let half = block_multiplier(level, level, familiarity(cap / 2, level));
        let full = block_multiplier(level, level, familiarity(cap, level));
        assert!(zero > half, "{zero} vs {half}");
        assert!(half > full, "{half} vs {full}");
    }

    #[test]
    fn resolver_block_multiplier_drops_with_defense_skill() {
        let caps = SwingCapabilities::BLOCK;
        let multiplier = |points: u32| {
            let input = SwingInput::new(20, 20, 100)
                .with_defense_skill(Some(points))
                .with_capabilities(caps);
            // land, then first slice of the block band
            let result = resolve_swing(&input, &mut SequenceRolls::new(vec![0.0, 0.0]));
            assert_eq!(result.outcome, SwingOutcome::Block);
            result.block_multiplier
        };
        assert!(multiplier(0) > multiplier(50));
        assert!(multiplier(50) > multiplier(100));
    }

    #[test]
    fn crit_is_zero_when_disabled_and_capped_otherwise() {
        assert_eq!(crit_chance(60, 1, 1.0, 0.0, false), 0.0);
        assert!(crit_chance(60, 1, 1.0, 0.0, true) <= 0.25);
        assert!(crit_chance(1, 60, 0.0, 1.0, true) >= 0.0);
    }

    #[test]
    fn glancing_is_higher_when_outmatched() {
        let even = glancing_chance(20, 20, 1.0);
        let outmatched = glancing_chance(20, 30, 1.0);
        let untrained = glancing_chance(20, 20, 0.0);
        assert!(outmatched > even);
        assert!(untrained > even);
        assert!(glancing_chance(1, 500, 0.0) <= 0.25);
        assert!(glancing_chance(500, 1, 1.0) >= 0.01);
    }

    #[test]
    fn strike_count_uses_nested_bands() {
        // full familiarity: triple 0.05, double 0.18
        let input = SwingInput::new(10, 10, 50).with_capabilities(SwingCapabilities::MULTI_STRIKE);
        let strikes = |draw: f64| {
            resolve_swing(&input, &mut SequenceRolls::new(vec![0.0, 0.99, draw])).strikes
        };
        assert_eq!(strikes(0.01), 3);
        assert_eq!(strikes(0.10), 2);
        assert_eq!(strikes(0.50), 1);
    }

    #[test]
    fn identical_draws_give_identical_results() {
        let input = SwingInput::new(12, 15, 40).with_defense_skill(Some(30));
        let mut first = PcgRolls::new(7);
        let mut second = PcgRolls::new(7);
        for _ in 0..64 {
            let a = resolve_swing(&input, &mut first);
            let b = resolve_swing(&input, &mut second);
            assert_eq!(format!("{a:?}"), format!("{b:?}"));
        }
    }

    #[test]
    fn non_finite_draws_never_land() {
        let mut rolls = SequenceRolls::new(vec![f64::NAN]);
        let result = resolve_swing(&SwingInput::new(30, 1, 150), &mut rolls);
        assert_eq!(result.outcome, SwingOutcome::Miss);
    }

    #[test]
    fn low_level_attacker_is_blocked_by_high_level_defender() {
        // L1 with 5/5 weapon skill against an L10 defender with no defense skill.
        let input = SwingInput::new(1, 10, 5);
        let result = resolve_swing(&input, &mut SequenceRolls::new(vec![0.01, 0.08]));
        assert_eq!(result.outcome, SwingOutcome::Block);
        assert!((result.block_multiplier - 0.76).abs() < 1e-9);
        assert!((result.hit_chance - 0.69).abs() < 1e-9);
    }
}
