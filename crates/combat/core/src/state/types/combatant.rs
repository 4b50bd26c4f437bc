use crate::combat::Mitigation;
use crate::state::{EntityId, NpcState, Position, RegionId, StatusEffects, Timestamp};

/// Who controls a combatant.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CombatRole {
    Player,
    Pet { owner: EntityId },
    Npc(Box<NpcState>),
}

/// Combat component of an entity.
///
/// The world's entity store owns the rest of the entity; this subsystem only
/// mutates health, liveness and the combat tag here.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Combatant {
    pub id: EntityId,
    pub name: String,
    pub level: u32,
    pub hp: u32,
    pub max_hp: u32,
    pub alive: bool,
    /// Permanently invulnerable (service providers, staff).
    pub protected: bool,
    pub in_combat_until: Option<Timestamp>,
    pub engaged_target: Option<EntityId>,
    pub region: RegionId,
    pub position: Position,
    pub weapon_skill: u32,
    pub defense_skill: Option<u32>,
    pub mitigation: Mitigation,
    pub effects: StatusEffects,
    pub role: CombatRole,
}

impl Combatant {
    /// Creates a player combatant at full health.
    pub fn player(id: EntityId, name: impl Into<String>, level: u32, max_hp: u32) -> Self {
        Self {
            id,
            name: name.into(),
            level: level.max(1),
            hp: max_hp,
            max_hp,
            alive: true,
            protected: false,
            in_combat_until: None,
            engaged_target: None,
            region: RegionId::default(),
            position: Position::ORIGIN,
            weapon_skill: 0,
            defense_skill: None,
            mitigation: Mitigation::default(),
            effects: StatusEffects::empty(),
            role: CombatRole::Player,
        }
    }

    #[must_use]
    pub fn with_weapon_skill(mut self, points: u32) -> Self {
        self.weapon_skill = points;
        self
    }

    #[must_use]
    pub fn with_defense_skill(mut self, points: u32) -> Self {
        self.defense_skill = Some(points);
        self
    }

    #[must_use]
    pub fn at(mut self, region: RegionId, position: Position) -> Self {
        self.region = region;
        self.position = position;
        self
    }

    #[must_use]
    pub fn with_mitigation(mut self, mitigation: Mitigation) -> Self {
        self.mitigation = mitigation;
        self
    }

    #[must_use]
    pub fn owned_by(mut self, owner: EntityId) -> Self {
        self.role = CombatRole::Pet { owner };
        self
    }

    pub fn npc(&self) -> Option<&NpcState> {
        match &self.role {
            CombatRole::Npc(npc) => Some(npc),
            _ => None,
        }
    }

    pub fn npc_mut(&mut self) -> Option<&mut NpcState> {
        match &mut self.role {
            CombatRole::Npc(npc) => Some(npc),
            _ => None,
        }
    }

    pub fn is_npc(&self) -> bool {
        matches!(self.role, CombatRole::Npc(_))
    }

    pub fn in_combat(&self, now: Timestamp) -> bool {
        self.in_combat_until.is_some_and(|until| now < until)
    }

    /// Refreshes the combat tag. Never shortens an existing window.
    pub fn tag_combat(&mut self, now: Timestamp, window_ms: u64) {
        let until = now.plus_ms(window_ms);
        self.in_combat_until = Some(self.in_combat_until.map_or(until, |u| u.max(until)));
    }
}
