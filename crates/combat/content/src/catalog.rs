use std::collections::BTreeMap;

use combat_core::{NpcPrototype, PrototypeId};

/// NPC prototypes indexed by id.
#[derive(Clone, Debug, Default)]
pub struct PrototypeCatalog {
    prototypes: BTreeMap<PrototypeId, NpcPrototype>,
}

impl PrototypeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a prototype. Returns the replaced entry.
    pub fn insert(&mut self, prototype: NpcPrototype) -> Option<NpcPrototype> {
        self.prototypes.insert(prototype.id, prototype)
    }

    pub fn get(&self, id: PrototypeId) -> Option<&NpcPrototype> {
        self.prototypes.get(&id)
    }

    pub fn contains(&self, id: PrototypeId) -> bool {
        self.prototypes.contains_key(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &NpcPrototype> {
        self.prototypes.values()
    }

    pub fn len(&self) -> usize {
        self.prototypes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prototypes.is_empty()
    }
}

impl FromIterator<NpcPrototype> for PrototypeCatalog {
    fn from_iter<I: IntoIterator<Item = NpcPrototype>>(iter: I) -> Self {
        let mut catalog = Self::new();
        for prototype in iter {
            catalog.insert(prototype);
        }
        catalog
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn later_entries_replace_earlier_ones() {
        let catalog: PrototypeCatalog = [
            NpcPrototype::new(PrototypeId(1), "rat", 1, 5),
            NpcPrototype::new(PrototypeId(1), "giant rat", 3, 20),
        ]
        .into_iter()
        .collect();

        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.get(PrototypeId(1)).map(|p| p.name.as_str()), Some("giant rat"));
    }
}
