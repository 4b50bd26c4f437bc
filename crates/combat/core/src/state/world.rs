use std::collections::BTreeMap;

use crate::error::CombatError;
use crate::state::{
    CombatRole, Combatant, EntityId, NpcPrototype, NpcState, SpawnMeta, StatusEffects, Timestamp,
};

/// Arena of combat components keyed by entity id.
///
/// Iteration order is by id so that assist propagation and decay ticks are
/// reproducible.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CombatWorld {
    /// Sequential id allocator. Never reused.
    next_entity_id: u32,
    combatants: BTreeMap<EntityId, Combatant>,
}

impl CombatWorld {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate_id(&mut self) -> EntityId {
        let id = EntityId(self.next_entity_id);
        self.next_entity_id += 1;
        id
    }

    /// Inserts a combatant under a freshly allocated id and returns it.
    pub fn insert(&mut self, mut combatant: Combatant) -> EntityId {
        let id = self.allocate_id();
        combatant.id = id;
        self.combatants.insert(id, combatant);
        id
    }

    /// Instantiates an NPC from its prototype at the spawn's home position.
    pub fn spawn_npc(&mut self, prototype: NpcPrototype, spawn: SpawnMeta, now: Timestamp) -> EntityId {
        let protected = prototype.tags.contains(crate::state::NpcTags::SERVICE_PROVIDER);
        let combatant = Combatant {
            id: EntityId::default(),
            name: prototype.name.clone(),
            level: prototype.level.max(1),
            hp: prototype.max_hp,
            max_hp: prototype.max_hp,
            alive: true,
            protected,
            in_combat_until: None,
            engaged_target: None,
            region: spawn.region,
            position: spawn.home,
            weapon_skill: prototype.weapon_skill,
            defense_skill: prototype.defense_skill,
            mitigation: prototype.mitigation.clone(),
            effects: StatusEffects::empty(),
            role: CombatRole::Npc(Box::new(NpcState::new(prototype, spawn, now))),
        };
        self.insert(combatant)
    }

    pub fn get(&self, id: EntityId) -> Option<&Combatant> {
        self.combatants.get(&id)
    }

    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Combatant> {
        self.combatants.get_mut(&id)
    }

    pub fn require(&self, id: EntityId) -> Result<&Combatant, CombatError> {
        self.get(id).ok_or(CombatError::CombatantNotFound(id))
    }

    pub fn require_mut(&mut self, id: EntityId) -> Result<&mut Combatant, CombatError> {
        self.get_mut(id).ok_or(CombatError::CombatantNotFound(id))
    }

    pub fn npc(&self, id: EntityId) -> Result<&NpcState, CombatError> {
        self.require(id)?.npc().ok_or(CombatError::NotAnNpc(id))
    }

    pub fn npc_mut(&mut self, id: EntityId) -> Result<&mut NpcState, CombatError> {
        self.require_mut(id)?
            .npc_mut()
            .ok_or(CombatError::NotAnNpc(id))
    }

    pub fn remove(&mut self, id: EntityId) -> Option<Combatant> {
        self.combatants.remove(&id)
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.combatants.contains_key(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Combatant> {
        self.combatants.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Combatant> {
        self.combatants.values_mut()
    }

    pub fn ids(&self) -> Vec<EntityId> {
        self.combatants.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.combatants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.combatants.is_empty()
    }
}
