//! Combat configuration loader.

use std::path::Path;

use combat_core::CombatConfig;

use crate::loaders::{LoadResult, read_file};

/// Loader for combat configuration from TOML files and the environment.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load config data from a TOML file. Missing sections and keys keep
    /// their defaults.
    pub fn load(path: &Path) -> LoadResult<CombatConfig> {
        let content = read_file(path)?;
        Self::parse(&content)
            .map_err(|e| anyhow::anyhow!("Failed to parse config {}: {}", path.display(), e))
    }

    pub fn parse(content: &str) -> LoadResult<CombatConfig> {
        let config: CombatConfig = toml::from_str(content)
            .map_err(|e| anyhow::anyhow!("Failed to parse config TOML: {}", e))?;
        Ok(config)
    }

    /// Defaults overlaid with process environment variables (after loading a
    /// `.env` file if one exists).
    pub fn from_env() -> CombatConfig {
        let mut config = CombatConfig::default();
        Self::apply_env(&mut config);
        config
    }

    /// TOML file (or defaults when `path` is `None`) overlaid with the
    /// environment.
    pub fn load_with_env(path: Option<&Path>) -> LoadResult<CombatConfig> {
        let mut config = match path {
            Some(path) => Self::load(path)?,
            None => CombatConfig::default(),
        };
        Self::apply_env(&mut config);
        Ok(config)
    }

    pub fn apply_env(config: &mut CombatConfig) {
        let _ = dotenvy::dotenv();
        Self::apply_overrides(config, |key| std::env::var(key).ok());
    }

    /// Applies overrides from `lookup`.
    ///
    /// Recognized keys:
    /// - `COMBAT_CORPSE_MS`, `COMBAT_RESOURCE_CORPSE_MS`, `COMBAT_BEAST_CORPSE_MS`
    /// - `COMBAT_RESPAWN_MS`
    /// - `COMBAT_ASSIST_RADIUS`
    /// - `COMBAT_GATE_CAST_MS`, `COMBAT_GATE_COOLDOWN_MS`
    /// - `COMBAT_GATE_PUSHBACK_MS`, `COMBAT_GATE_MAX_PUSHBACK_MS`
    /// - `COMBAT_COWARDICE_PCT_PER_STACK`, `COMBAT_COWARDICE_MAX_PCT`
    /// - `COMBAT_AUTO_ATTACK_MS`
    /// - `COMBAT_SEED`
    ///
    /// Unparseable values are ignored.
    pub fn apply_overrides<F>(config: &mut CombatConfig, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(ms) = parse::<u64>(lookup("COMBAT_CORPSE_MS")) {
            config.lifecycle.corpse_ms = ms;
        }
        if let Some(ms) = parse::<u64>(lookup("COMBAT_RESOURCE_CORPSE_MS")) {
            config.lifecycle.resource_corpse_ms = ms;
        }
        if let Some(ms) = parse::<u64>(lookup("COMBAT_BEAST_CORPSE_MS")) {
            config.lifecycle.beast_corpse_ms = ms;
        }
        if let Some(ms) = parse::<u64>(lookup("COMBAT_RESPAWN_MS")) {
            config.lifecycle.respawn_ms = ms;
        }

        if let Some(radius) = parse::<f64>(lookup("COMBAT_ASSIST_RADIUS"))
            && radius.is_finite()
        {
            config.assist.radius = radius.max(0.0);
        }

        if let Some(ms) = parse::<u64>(lookup("COMBAT_GATE_CAST_MS")) {
            config.gate.cast_ms = ms;
        }
        if let Some(ms) = parse::<u64>(lookup("COMBAT_GATE_COOLDOWN_MS")) {
            config.gate.cooldown_ms = ms;
        }
        if let Some(ms) = parse::<u64>(lookup("COMBAT_GATE_PUSHBACK_MS")) {
            config.gate.pushback_per_damage_ms = ms;
        }
        if let Some(ms) = parse::<u64>(lookup("COMBAT_GATE_MAX_PUSHBACK_MS")) {
            config.gate.max_pushback_ms = ms;
        }

        if let Some(pct) = parse::<f64>(lookup("COMBAT_COWARDICE_PCT_PER_STACK"))
            && pct.is_finite()
        {
            config.cowardice.pct_per_stack = pct;
        }
        if let Some(pct) = parse::<f64>(lookup("COMBAT_COWARDICE_MAX_PCT"))
            && pct.is_finite()
        {
            config.cowardice.max_pct = pct;
        }

        if let Some(ms) = parse::<u64>(lookup("COMBAT_AUTO_ATTACK_MS")) {
            config.combat.auto_attack_interval_ms = ms;
        }
        if let Some(seed) = parse::<u64>(lookup("COMBAT_SEED")) {
            config.seed = Some(seed);
        }
    }
}

fn parse<T>(value: Option<String>) -> Option<T>
where
    T: std::str::FromStr,
{
    value?.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::io::Write;

    use super::*;

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = ConfigLoader::parse(
            r#"
            seed = 7

            [lifecycle]
            respawn_ms = 1500

            [assist.strength]
            elite = 2.5
            "#,
        )
        .unwrap();

        assert_eq!(config.seed, Some(7));
        assert_eq!(config.lifecycle.respawn_ms, 1_500);
        assert_eq!(config.lifecycle.corpse_ms, 60_000);
        assert_eq!(config.assist.strength.elite, 2.5);
        assert_eq!(config.assist.strength.guard, 4.0);
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[gate]\ncast_ms = 4000\ninterrupt_burst_pct = 0.3").unwrap();

        let config = ConfigLoader::load(file.path()).unwrap();
        assert_eq!(config.gate.cast_ms, 4_000);
        assert_eq!(config.gate.interrupt_burst_pct, Some(0.3));
    }

    #[test]
    fn missing_file_names_the_path() {
        let err = ConfigLoader::load(Path::new("/nonexistent/combat.toml")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/combat.toml"));
    }

    #[test]
    fn overrides_replace_file_values() {
        let vars: HashMap<&str, &str> = [
            ("COMBAT_CORPSE_MS", "1000"),
            ("COMBAT_ASSIST_RADIUS", "25.5"),
            ("COMBAT_GATE_MAX_PUSHBACK_MS", "500"),
            ("COMBAT_AUTO_ATTACK_MS", "not-a-number"),
            ("COMBAT_SEED", "99"),
        ]
        .into_iter()
        .collect();
        let mut config = CombatConfig::default();

        ConfigLoader::apply_overrides(&mut config, |key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.lifecycle.corpse_ms, 1_000);
        assert_eq!(config.assist.radius, 25.5);
        assert_eq!(config.gate.max_pushback_ms, 500);
        assert_eq!(config.combat.auto_attack_interval_ms, 2_000);
        assert_eq!(config.seed, Some(99));
    }

    #[test]
    fn shipped_config_matches_defaults() {
        let config = ConfigLoader::parse(include_str!("../../data/combat.toml")).unwrap();
        assert_eq!(config, CombatConfig::default());
    }
}
