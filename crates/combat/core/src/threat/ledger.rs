use std::collections::BTreeMap;

use crate::config::ThreatConfig;
use crate::state::{EntityId, Timestamp};

/// Taunt override on a ledger.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ForcedTarget {
    pub target: EntityId,
    pub expires_at: Timestamp,
}

/// Per-NPC hostility ledger.
///
/// Scores are always positive: entries that decay to zero are pruned.
/// Decay is linear and only applied in whole seconds; the sub-second
/// remainder carries over to the next tick.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ThreatLedger {
    scores: BTreeMap<EntityId, f64>,
    last_aggro_at: Option<Timestamp>,
    last_decay_at: Timestamp,
    decay_carry_ms: u64,
    forced: Option<ForcedTarget>,
}

impl ThreatLedger {
    pub fn new(now: Timestamp) -> Self {
        Self {
            scores: BTreeMap::new(),
            last_aggro_at: None,
            last_decay_at: now,
            decay_carry_ms: 0,
            forced: None,
        }
    }

    /// Adds threat from `attacker` and refreshes last-aggro. Returns the new
    /// score. Non-positive or non-finite amounts only refresh last-aggro.
    pub fn add(&mut self, attacker: EntityId, amount: f64, now: Timestamp) -> f64 {
        self.last_aggro_at = Some(now);
        if !amount.is_finite() || amount <= 0.0 {
            return self.score(attacker);
        }
        let score = self.scores.entry(attacker).or_insert(0.0);
        *score += amount;
        *score
    }

    /// Threat accrued for `damage` points dealt.
    pub fn add_damage(
        &mut self,
        attacker: EntityId,
        damage: u32,
        now: Timestamp,
        config: &ThreatConfig,
    ) -> f64 {
        self.add(attacker, f64::from(damage) * config.threat_per_damage, now)
    }

    /// Applies decay for the whole seconds elapsed since the last decay.
    /// Returns the number of seconds decayed.
    pub fn decay(&mut self, now: Timestamp, per_second: f64) -> u64 {
        let elapsed = now.since(self.last_decay_at) + self.decay_carry_ms;
        self.last_decay_at = now.max(self.last_decay_at);
        let seconds = elapsed / 1_000;
        self.decay_carry_ms = elapsed % 1_000;

        if seconds == 0 || !per_second.is_finite() || per_second <= 0.0 {
            return seconds;
        }
        let amount = per_second * seconds as f64;
        self.scores.retain(|_, score| {
            *score -= amount;
            *score > 0.0
        });
        seconds
    }

    /// Forces `taunter` as the assist target until `now + duration_ms`.
    pub fn taunt(&mut self, taunter: EntityId, now: Timestamp, duration_ms: u64, bonus: f64) {
        self.forced = Some(ForcedTarget {
            target: taunter,
            expires_at: now.plus_ms(duration_ms),
        });
        self.add(taunter, bonus, now);
    }

    pub fn forced_target(&self, now: Timestamp) -> Option<EntityId> {
        self.forced
            .filter(|f| now < f.expires_at)
            .map(|f| f.target)
    }

    /// Highest-scoring attacker. Ties go to the lowest id.
    pub fn top(&self) -> Option<(EntityId, f64)> {
        self.scores
            .iter()
            .fold(None, |best: Option<(EntityId, f64)>, (&id, &score)| match best {
                Some((_, top)) if top >= score => best,
                _ => Some((id, score)),
            })
    }

    /// Who this NPC (and anyone assisting it) should be fighting.
    ///
    /// An unexpired taunt wins outright. Otherwise the top attacker, provided
    /// it clears `min_threat` and the ledger saw aggro within the recency
    /// window.
    pub fn assist_target(&self, now: Timestamp, config: &ThreatConfig) -> Option<EntityId> {
        if let Some(forced) = self.forced_target(now) {
            return Some(forced);
        }
        let last_aggro = self.last_aggro_at?;
        if now.since(last_aggro) > config.recency_window_ms {
            return None;
        }
        self.top()
            .filter(|(_, score)| *score >= config.min_threat)
            .map(|(id, _)| id)
    }

    pub fn score(&self, attacker: EntityId) -> f64 {
        self.scores.get(&attacker).copied().unwrap_or(0.0)
    }

    pub fn contains(&self, attacker: EntityId) -> bool {
        self.scores.contains_key(&attacker)
    }

    pub fn last_aggro_at(&self) -> Option<Timestamp> {
        self.last_aggro_at
    }

    pub fn entries(&self) -> impl Iterator<Item = (EntityId, f64)> + '_ {
        self.scores.iter().map(|(&id, &score)| (id, score))
    }

    pub fn remove(&mut self, attacker: EntityId) {
        self.scores.remove(&attacker);
        if self.forced.is_some_and(|f| f.target == attacker) {
            self.forced = None;
        }
    }

    pub fn clear(&mut self) {
        self.scores.clear();
        self.forced = None;
        self.last_aggro_at = None;
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: EntityId = EntityId(1);
    const B: EntityId = EntityId(2);

    #[test]
    fn decay_uses_whole_seconds_and_carries_remainder() {
        let mut ledger = ThreatLedger::new(Timestamp(0));
        ledger.add(A, 10.0, Timestamp(0));

        assert_eq!(ledger.decay(Timestamp(700), 1.0), 0);
        assert_eq!(ledger.score(A), 10.0);

        // 700 + 600 = 1300ms: one whole second, 300ms carried.
        assert_eq!(ledger.decay(Timestamp(1_300), 1.0), 1);
        assert_eq!(ledger.score(A), 9.0);

        assert_eq!(ledger.decay(Timestamp(2_000), 1.0), 1);
        assert_eq!(ledger.score(A), 8.0);
    }

    #[test]
    fn decayed_entries_are_pruned() {
        let mut ledger = ThreatLedger::new(Timestamp(0));
        ledger.add(A, 2.0, Timestamp(0));
        ledger.add(B, 5.0, Timestamp(0));

        ledger.decay(Timestamp(2_000), 1.0);

        assert!(!ledger.contains(A));
        assert_eq!(ledger.score(B), 3.0);
        assert!(ledger.entries().all(|(_, score)| score > 0.0));
    }

    #[test]
    fn taunt_overrides_until_expiry() {
        let config = ThreatConfig::default();
        let mut ledger = ThreatLedger::new(Timestamp(0));
        ledger.add(A, 100.0, Timestamp(0));
        ledger.taunt(B, Timestamp(0), 3_000, 0.0);

        assert_eq!(ledger.assist_target(Timestamp(2_999), &config), Some(B));
        assert_eq!(ledger.assist_target(Timestamp(3_000), &config), Some(A));
    }

    #[test]
    fn stale_ledgers_yield_no_target() {
        let config = ThreatConfig::default();
        let mut ledger = ThreatLedger::new(Timestamp(0));
        ledger.add(A, 100.0, Timestamp(0));

        let fresh = Timestamp(config.recency_window_ms);
        let stale = Timestamp(config.recency_window_ms + 1);
        assert_eq!(ledger.assist_target(fresh, &config), Some(A));
        assert_eq!(ledger.assist_target(stale, &config), None);
    }

    #[test]
    fn top_score_must_clear_minimum() {
        let config = ThreatConfig {
            min_threat: 5.0,
            ..ThreatConfig::default()
        };
        let mut ledger = ThreatLedger::new(Timestamp(0));
        ledger.add(A, 4.0, Timestamp(0));
        assert_eq!(ledger.assist_target(Timestamp(1), &config), None);

        ledger.add(A, 1.0, Timestamp(1));
        assert_eq!(ledger.assist_target(Timestamp(2), &config), Some(A));
    }

    #[test]
    fn ties_go_to_lowest_id() {
        let mut ledger = ThreatLedger::new(Timestamp(0));
        ledger.add(B, 3.0, Timestamp(0));
        ledger.add(A, 3.0, Timestamp(0));
        assert_eq!(ledger.top(), Some((A, 3.0)));
    }

    #[test]
    fn garbage_amounts_are_ignored() {
        let mut ledger = ThreatLedger::new(Timestamp(0));
        ledger.add(A, f64::NAN, Timestamp(0));
        ledger.add(A, -4.0, Timestamp(0));
        assert!(ledger.is_empty());
        assert_eq!(ledger.last_aggro_at(), Some(Timestamp(0)));
    }
}
