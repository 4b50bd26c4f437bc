//! NPC prototype loader.

use std::collections::BTreeSet;
use std::path::Path;

use combat_core::NpcPrototype;

use crate::catalog::PrototypeCatalog;
use crate::loaders::{LoadResult, read_file};

/// Loader for NPC prototypes from RON files.
pub struct PrototypeLoader;

impl PrototypeLoader {
    /// Load prototypes from a RON file.
    ///
    /// RON format: `Vec<NpcPrototype>`. Ids must be unique and every
    /// prototype needs a positive `max_hp`.
    pub fn load(path: &Path) -> LoadResult<Vec<NpcPrototype>> {
        let content = read_file(path)?;
        Self::parse(&content)
            .map_err(|e| anyhow::anyhow!("Failed to load prototypes {}: {}", path.display(), e))
    }

    pub fn parse(content: &str) -> LoadResult<Vec<NpcPrototype>> {
        let prototypes: Vec<NpcPrototype> = ron::from_str(content)
            .map_err(|e| anyhow::anyhow!("Failed to parse prototype RON: {}", e))?;

        let mut seen = BTreeSet::new();
        for prototype in &prototypes {
            if !seen.insert(prototype.id) {
                anyhow::bail!("Duplicate prototype id {}", prototype.id);
            }
            if prototype.max_hp == 0 {
                anyhow::bail!("Prototype {} ({}) has zero max_hp", prototype.id, prototype.name);
            }
        }

        Ok(prototypes)
    }

    pub fn load_catalog(path: &Path) -> LoadResult<PrototypeCatalog> {
        Ok(Self::load(path)?.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use combat_core::{Archetype, NpcTags, PrototypeId};

    use super::*;

    const WOLVES: &str = r#"[
        (
            id: PrototypeId(1),
            name: "grey wolf",
            level: 6,
            max_hp: 60,
            mitigation: (armor: 20),
            weapon_skill: 30,
            defense_skill: Some(10),
            base_damage: 7,
            archetype: Normal,
            tags: "BEAST | ASSIST",
            faction: FactionId(4),
        ),
        (
            id: PrototypeId(2),
            name: "pack leader",
            level: 9,
            max_hp: 140,
            base_damage: 12,
            archetype: Elite,
        ),
    ]"#;

    #[test]
    fn parses_with_defaults() {
        let prototypes = PrototypeLoader::parse(WOLVES).unwrap();

        assert_eq!(prototypes.len(), 2);
        let wolf = &prototypes[0];
        assert_eq!(wolf.mitigation.armor, 20);
        assert_eq!(wolf.defense_skill, Some(10));
        assert!(wolf.tags.contains(NpcTags::BEAST | NpcTags::ASSIST));

        let leader = &prototypes[1];
        assert_eq!(leader.archetype, Archetype::Elite);
        assert_eq!(leader.weapon_skill, 0);
        assert!(leader.tags.is_empty());
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let doubled = r#"[
            (id: PrototypeId(1), name: "a", level: 1, max_hp: 5, base_damage: 1),
            (id: PrototypeId(1), name: "b", level: 1, max_hp: 5, base_damage: 1),
        ]"#;
        let err = PrototypeLoader::parse(doubled).unwrap_err();
        assert!(err.to_string().contains("Duplicate"));
    }

    #[test]
    fn zero_health_is_rejected() {
        let broken = r#"[(id: PrototypeId(3), name: "ghost", level: 1, max_hp: 0, base_damage: 1)]"#;
        assert!(PrototypeLoader::parse(broken).is_err());
    }

    #[test]
    fn catalog_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(WOLVES.as_bytes()).unwrap();

        let catalog = PrototypeLoader::load_catalog(file.path()).unwrap();
        assert!(catalog.contains(PrototypeId(2)));
        assert_eq!(catalog.len(), 2);
    }

    #[test]
    fn shipped_bestiary_parses() {
        let catalog: PrototypeCatalog =
            PrototypeLoader::parse(include_str!("../../data/prototypes.ron"))
                .unwrap()
                .into_iter()
                .collect();
        let vein = catalog.get(PrototypeId(4)).unwrap();
        assert!(vein.is_resource());
        assert!(catalog.get(PrototypeId(5)).unwrap().tags.contains(NpcTags::SERVICE_PROVIDER));
    }
}
