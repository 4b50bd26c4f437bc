//! Hostility state: per-NPC threat ledgers, assist propagation and the
//! gate-for-help cast.

mod assist;
mod gate;
mod ledger;

pub use assist::{AssistPull, propagate_assist, pull_distant_ally};
pub use gate::{GateCast, GateDamage, GatePhase, poll_gate};
pub use ledger::{ForcedTarget, ThreatLedger};
