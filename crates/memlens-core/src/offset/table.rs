use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tracing::warn;

use super::MemoryPattern;
use crate::error::{Error, Result};
use crate::memory::ReadMemory;

/// Version tag of the built-in pattern table
pub const BUILTIN_PATTERNS_VERSION: &str = "builtin-1";

/// How a scan hit turns into the address the consumer wants
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AnchorResolve {
    /// The anchor address itself
    #[default]
    Direct,
    /// The anchor holds a 32-bit displacement relative to the next instruction
    RipRelative,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternEntry {
    pub name: String,
    pub pattern: MemoryPattern,
    #[serde(default)]
    pub resolve: AnchorResolve,
    #[serde(default)]
    pub deref: bool,
    #[serde(default)]
    pub addend: i64,
}

impl PatternEntry {
    pub fn new(name: impl Into<String>, pattern: &str) -> Result<Self> {
        Ok(Self {
            name: name.into(),
            pattern: pattern.parse()?,
            resolve: AnchorResolve::Direct,
            deref: false,
            addend: 0,
        })
    }

    pub fn rip_relative(mut self) -> Self {
        self.resolve = AnchorResolve::RipRelative;
        self
    }

    pub fn with_deref(mut self) -> Self {
        self.deref = true;
        self
    }

    pub fn with_addend(mut self, addend: i64) -> Self {
        self.addend = addend;
        self
    }

    /// Turn a scan hit into the static address this entry points at.
    ///
    /// RIP-relative anchors resolve to `anchor + 4 + disp32`. The optional
    /// dereference happens before the addend is applied.
    pub fn resolve<R: ReadMemory + ?Sized>(&self, reader: &R, anchor: u64) -> Result<u64> {
        let mut target = match self.resolve {
            AnchorResolve::Direct => anchor,
            AnchorResolve::RipRelative => {
                let disp = reader.read_i32(anchor)?;
                (anchor + 4).wrapping_add_signed(disp as i64)
            }
        };

        if self.deref {
            target = reader.read_u64(target)?;
        }

        if self.addend != 0 {
            target = target.wrapping_add_signed(self.addend);
        }

        Ok(target)
    }
}

/// Named, versioned pattern table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternSet {
    pub version: String,
    pub entries: Vec<PatternEntry>,
}

impl PatternSet {
    pub fn entry(&self, name: &str) -> Option<&PatternEntry> {
        self.entries
            .iter()
            .find(|entry| entry.name.eq_ignore_ascii_case(name))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|entry| entry.name.as_str())
    }

    /// Entry names must be unique (case-insensitive) and non-empty
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for entry in &self.entries {
            if entry.name.trim().is_empty() {
                return Err(Error::InvalidPattern("Pattern entry without a name".to_string()));
            }
            if !seen.insert(entry.name.to_ascii_lowercase()) {
                return Err(Error::InvalidPattern(format!(
                    "Duplicate pattern entry '{}'",
                    entry.name
                )));
            }
        }
        Ok(())
    }
}

/// Name and text of every built-in root pattern
const BUILTIN_PATTERN_TABLE: [(&str, &str); 3] = [
    (
        "Game States",
        "48 83 EC ?? 48 C7 44 24 ?? ?? ?? ?? ?? 48 89 9C 24 ?? ?? ?? ?? 48 8B F9 33 ED ?? ?? ?? ^",
    ),
    (
        "File Root",
        "4C ?? ?? ^ ?? ?? ?? ?? 8B ?? ?? 39 ?? ?? ?? ?? ?? 0F",
    ),
    ("AreaChangeCounter", "E8 ?? ?? ?? ?? E8 ?? ?? ?? ?? FF 05 ^"),
];

/// Root patterns for the supported target
pub fn builtin_patterns() -> PatternSet {
    let entries = BUILTIN_PATTERN_TABLE
        .into_iter()
        .filter_map(|(name, pattern)| match PatternEntry::new(name, pattern) {
            Ok(entry) => Some(entry.rip_relative()),
            Err(e) => {
                warn!("Skipping built-in pattern {}: {}", name, e);
                None
            }
        })
        .collect();

    PatternSet {
        version: BUILTIN_PATTERNS_VERSION.to_string(),
        entries,
    }
}

pub fn load_patterns<P: AsRef<Path>>(path: P) -> Result<PatternSet> {
    let content = fs::read_to_string(&path)?;
    let set: PatternSet = serde_json::from_str(&content)?;
    set.validate()?;
    Ok(set)
}

pub fn save_patterns<P: AsRef<Path>>(path: P, patterns: &PatternSet) -> Result<()> {
    let content = serde_json::to_string_pretty(patterns)?;
    fs::write(path, content)?;
    Ok(())
}
