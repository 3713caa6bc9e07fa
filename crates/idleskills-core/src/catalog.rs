//! Training catalog: which methods and tools exist per skill.
//!
//! The [`Catalog`] trait is the boundary to the static data tables. It
//! returns the full, unfiltered list for a skill; level gating is applied
//! by the caller through [`unlocked`] and [`best_available`].

use std::collections::BTreeMap;

use idleskills_types::{Tool, TrainingMethod};

use crate::config::CatalogConfig;

/// A catalog entry gated by a minimum skill level.
pub trait Unlockable {
    /// Minimum skill level needed to use this entry.
    fn required_level(&self) -> u32;

    /// Whether a skill at `level` may use this entry.
    fn is_unlocked_at(&self, level: u32) -> bool {
        self.required_level() <= level
    }
}

impl Unlockable for TrainingMethod {
    fn required_level(&self) -> u32 {
        self.required_level
    }
}

impl Unlockable for Tool {
    fn required_level(&self) -> u32 {
        self.required_level
    }
}

/// Source of the per-skill method and tool tables.
pub trait Catalog: Send + Sync {
    /// Every training method of a skill, in catalog order. Empty for
    /// unknown skills.
    fn methods_for(&self, skill_name: &str) -> Vec<TrainingMethod>;

    /// Every tool of a skill, in catalog order. Empty for unknown skills.
    fn tools_for(&self, skill_name: &str) -> Vec<Tool>;
}

/// Entries usable at `level`, in catalog order.
pub fn unlocked<T: Unlockable + Clone>(items: &[T], level: u32) -> Vec<T> {
    items
        .iter()
        .filter(|item| item.is_unlocked_at(level))
        .cloned()
        .collect()
}

/// The unlocked entry with the highest requirement.
///
/// Ties go to the entry that comes first in catalog order. This is a
/// "highest requirement wins" heuristic, not a yield comparison.
pub fn best_available<T: Unlockable + Clone>(items: &[T], level: u32) -> Option<T> {
    let mut best: Option<&T> = None;
    for item in items.iter().filter(|item| item.is_unlocked_at(level)) {
        match best {
            Some(current) if current.required_level() >= item.required_level() => {}
            _ => best = Some(item),
        }
    }
    best.cloned()
}

/// Catalog backed by in-memory tables, usually built from configuration.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    methods: BTreeMap<String, Vec<TrainingMethod>>,
    tools: BTreeMap<String, Vec<Tool>>,
}

impl StaticCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the catalog from the `catalog` configuration section.
    pub fn from_config(config: &CatalogConfig) -> Self {
        let mut catalog = Self::new();
        for (skill, entry) in &config.skills {
            let methods = entry
                .methods
                .iter()
                .map(|m| TrainingMethod {
                    skill_name: skill.clone(),
                    name: m.name.clone(),
                    xp_per_action: m.xp_per_action,
                    action_duration_ms: m.action_duration_ms,
                    required_level: m.required_level,
                })
                .collect();
            let tools = entry
                .tools
                .iter()
                .map(|t| Tool {
                    skill_name: skill.clone(),
                    name: t.name.clone(),
                    efficiency: t.efficiency,
                    required_level: t.required_level,
                })
                .collect();
            catalog = catalog.with_methods(skill, methods).with_tools(skill, tools);
        }
        catalog
    }

    /// Replace the method table of a skill.
    #[must_use]
    pub fn with_methods(mut self, skill_name: &str, methods: Vec<TrainingMethod>) -> Self {
        self.methods.insert(skill_name.to_owned(), methods);
        self
    }

    /// Replace the tool table of a skill.
    #[must_use]
    pub fn with_tools(mut self, skill_name: &str, tools: Vec<Tool>) -> Self {
        self.tools.insert(skill_name.to_owned(), tools);
        self
    }
}

impl Catalog for StaticCatalog {
    fn methods_for(&self, skill_name: &str) -> Vec<TrainingMethod> {
        self.methods.get(skill_name).cloned().unwrap_or_default()
    }

    fn tools_for(&self, skill_name: &str) -> Vec<Tool> {
        self.tools.get(skill_name).cloned().unwrap_or_default()
    }
}
