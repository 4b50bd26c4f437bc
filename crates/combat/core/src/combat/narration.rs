//! Player-facing exchange text.

use std::fmt;

use crate::combat::SwingOutcome;

/// Everything narration needs to know about one swing.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SwingFacts<'a> {
    pub attacker: &'a str,
    pub defender: &'a str,
    pub ability: Option<&'a str>,
    pub outcome: SwingOutcome,
    pub damage: u32,
    pub strikes: u8,
    pub crit: bool,
    pub glancing: bool,
    pub overkill: u32,
    pub killed: bool,
}

/// Bracketed suffixes appended to a hit line, in display order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Annotation {
    Critical,
    Glancing,
    Blocked,
    MultiStrike(u8),
    Overkill(u32),
}

impl fmt::Display for Annotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Annotation::Critical => f.write_str("critical"),
            Annotation::Glancing => f.write_str("glancing"),
            Annotation::Blocked => f.write_str("blocked"),
            Annotation::MultiStrike(n) => write!(f, "x{n}"),
            Annotation::Overkill(n) => write!(f, "overkill {n}"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Narration {
    pub line: String,
    pub annotations: Vec<Annotation>,
}

impl fmt::Display for Narration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.line)?;
        for annotation in &self.annotations {
            write!(f, " ({annotation})")?;
        }
        Ok(())
    }
}

pub fn narrate_swing(facts: &SwingFacts<'_>) -> Narration {
    let SwingFacts {
        attacker, defender, ..
    } = *facts;
    let subject = match facts.ability {
        Some(name) => format!("{attacker}'s {name}"),
        None => attacker.to_string(),
    };

    let line = match facts.outcome {
        SwingOutcome::Miss => format!("{attacker} misses {defender}."),
        SwingOutcome::Dodge => format!("{defender} dodges {attacker}'s attack."),
        SwingOutcome::Parry => format!("{defender} parries {attacker}'s attack."),
        SwingOutcome::Hit | SwingOutcome::Block if facts.killed => format!(
            "{subject} hits {defender} for {} damage, killing it.",
            facts.damage
        ),
        SwingOutcome::Hit | SwingOutcome::Block => {
            format!("{subject} hits {defender} for {} damage.", facts.damage)
        }
    };

    let mut annotations = Vec::new();
    if facts.outcome.connects() {
        if facts.crit {
            annotations.push(Annotation::Critical);
        }
        if facts.glancing {
            annotations.push(Annotation::Glancing);
        }
        if facts.outcome == SwingOutcome::Block {
            annotations.push(Annotation::Blocked);
        }
        if facts.strikes > 1 {
            annotations.push(Annotation::MultiStrike(facts.strikes));
        }
        if facts.overkill > 0 {
            annotations.push(Annotation::Overkill(facts.overkill));
        }
    }

    Narration { line, annotations }
}
