//! Scripted duel loop: one adventurer working through the bestiary.

use anyhow::{Result, bail};
use tokio::sync::broadcast::{self, error::TryRecvError};

use combat_content::PrototypeCatalog;
use combat_core::{Combatant, EntityId, NpcTags, Position, PrototypeId, RegionId, SpawnPointId};
use runtime::{
    AttackRequest, CombatHandle, Event, ExchangeReport, InMemorySpawnPoints, NpcSpawn, Topic,
};

/// Used when no prototypes file is given.
pub const BESTIARY: &str = include_str!("../../combat/content/data/prototypes.ron");

const ARENA: RegionId = RegionId(1);
const LAIR: SpawnPointId = SpawnPointId(1);

#[derive(Clone, Copy, clap::ValueEnum)]
pub enum OutputFormat {
    /// Narration lines
    Text,
    /// One JSON exchange report per line
    Json,
}

#[derive(Debug, Default)]
pub struct DuelSummary {
    pub exchanges: u32,
    pub kills: u32,
    pub damage_dealt: u64,
}

pub struct Duel {
    handle: CombatHandle,
    format: OutputFormat,
    room: broadcast::Receiver<Event>,
}

impl Duel {
    pub fn new(handle: CombatHandle, format: OutputFormat) -> Self {
        let room = handle.subscribe(Topic::Room);
        Self {
            handle,
            format,
            room,
        }
    }

    /// Runs `rounds` exchanges, spawning the next opponent whenever the
    /// current one dies.
    pub async fn run(
        mut self,
        catalog: &PrototypeCatalog,
        spawn_points: &InMemorySpawnPoints,
        level: u32,
        rounds: u32,
    ) -> Result<DuelSummary> {
        let opponents: Vec<PrototypeId> = catalog
            .iter()
            .filter(|p| !p.tags.intersects(NpcTags::SERVICE_PROVIDER | NpcTags::RESOURCE))
            .map(|p| p.id)
            .collect();
        if opponents.is_empty() {
            bail!("no fightable prototypes in the catalog");
        }

        spawn_points.set(LAIR, Position::new(3, 0, 0));
        let max_hp = 40 + level * 12;
        let adventurer = Combatant::player(EntityId::default(), "Adventurer", level, max_hp)
            .with_weapon_skill(level * 3)
            .with_defense_skill(level * 2)
            .at(ARENA, Position::ORIGIN);
        let adventurer = self.handle.spawn_player(adventurer).await?;

        let mut summary = DuelSummary::default();
        let mut next = opponents.iter().cycle();
        let mut target: Option<EntityId> = None;

        for round in 1..=rounds {
            let npc = match target {
                Some(npc) => npc,
                None => {
                    let Some(&prototype) = next.next() else {
                        break;
                    };
                    let npc = self
                        .handle
                        .spawn_npc(NpcSpawn::at_point(prototype, ARENA, LAIR))
                        .await?;
                    target = Some(npc);
                    npc
                }
            };

            let report = self
                .handle
                .attack(AttackRequest::melee(adventurer, npc))
                .await?;
            self.print(round, &report)?;
            summary.exchanges += 1;
            summary.damage_dealt += u64::from(report.swing().map_or(0, |s| s.damage()));

            let tick = self.handle.tick().await?;
            for pull in &tick.gate_pulls {
                tracing::debug!(ally = %pull.ally, target = %pull.target, "gate pull");
            }
            self.drain_room();

            if report.killed() {
                summary.kills += 1;
                target = None;
            }
            let alive = self
                .handle
                .combatant(adventurer)
                .await?
                .is_some_and(|c| c.alive);
            if !alive {
                println!("The adventurer has fallen after {round} rounds.");
                break;
            }
        }

        Ok(summary)
    }

    fn print(&self, round: u32, report: &ExchangeReport) -> Result<()> {
        match self.format {
            OutputFormat::Text => {
                for line in report.lines() {
                    println!("[{round:>3}] {line}");
                }
            }
            OutputFormat::Json => println!("{}", serde_json::to_string(report)?),
        }
        Ok(())
    }

    fn drain_room(&mut self) {
        loop {
            match self.room.try_recv() {
                Ok(Event::Room(event)) => {
                    if let OutputFormat::Text = self.format {
                        println!("      {}", event.line);
                    }
                }
                Ok(_) => {}
                Err(TryRecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "room lines dropped");
                }
                Err(TryRecvError::Empty | TryRecvError::Closed) => break,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use combat_content::PrototypeLoader;

    use super::*;

    #[test]
    fn built_in_bestiary_parses() {
        let prototypes = PrototypeLoader::parse(BESTIARY).unwrap();
        assert_eq!(prototypes.len(), 5);
        assert!(prototypes[1].tags.contains(NpcTags::GATE_CALLER));
    }
}
