//! Combat resolution rules.
//!
//! Everything here is synchronous and side-effect free apart from the
//! in-place health mutation of [`apply_damage`]. Randomness enters only
//! through an injected [`crate::RollSource`].
//!
//! - `hit`: physical swing outcome (miss/dodge/parry/block/hit) and odds
//! - `damage`: mitigation chain and lethal transition
//! - `narration`: player-facing exchange text
//! - `progression`: skill and resource gains scaled to damage dealt

pub mod damage;
pub mod hit;
pub mod narration;
pub mod progression;

pub use damage::{
    AbilityMeta, AttackerContext, DamageChannel, DamageReport, Mitigation, Resists, apply_block,
    apply_damage, mitigate, mitigation_multiplier,
};
pub use hit::{
    AvoidanceBands, HitResolution, SwingCapabilities, SwingInput, SwingOutcome, resolve_swing,
};
pub use narration::{Annotation, Narration, SwingFacts, narrate_swing};
pub use progression::{ProgressionGain, progression_for};
