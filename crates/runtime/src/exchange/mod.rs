//! Attack exchanges: request/report types, the orchestrator, and death
//! handling.

mod death;
mod orchestrator;
mod report;

pub use death::roll_drops;
pub use orchestrator::{AttackOrchestrator, DEFAULT_DENIAL, ExchangeContext};
pub use report::{
    AttackRequest, DeathHandling, ExchangeOutcome, ExchangeReport, HitReport, SwingSummary,
};
