//! Prestige gating and reset.
//!
//! The [`PrestigeGate`] derives `can_prestige` from live skill state and
//! publishes it on a replay-latest channel. Performing a prestige runs a
//! caller-supplied reset hook first (the facade uses it to stop training),
//! then resets every skill and increments the prestige level.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use idleskills_types::{Prestige, PrestigeLevelConfig, Skill};
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::PrestigeConfig;
use crate::repository::{PrestigeRepository, RepositoryError, SkillRepository};

/// Errors that can occur while evaluating or performing a prestige.
#[derive(Debug, thiserror::Error)]
pub enum PrestigeError {
    /// A repository call failed.
    #[error("repository error: {source}")]
    Repository {
        /// The underlying repository error.
        #[from]
        source: RepositoryError,
    },

    /// The prestige counter is at its maximum.
    #[error("prestige level {level} cannot be incremented")]
    LevelOverflow {
        /// The current level.
        level: u32,
    },
}

/// Prestige tiers keyed by prestige level.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrestigeTable {
    tiers: BTreeMap<u32, PrestigeLevelConfig>,
}

impl PrestigeTable {
    /// Build the table from the `prestige` configuration section.
    pub fn from_config(config: &PrestigeConfig) -> Self {
        Self {
            tiers: config.tiers.clone(),
        }
    }

    /// Requirements to advance past `level`. `None` for unconfigured levels,
    /// which can never be prestiged past.
    pub fn requirements(&self, level: u32) -> Option<&PrestigeLevelConfig> {
        self.tiers.get(&level)
    }

    /// Skills shown at `level`. Levels beyond the table use the highest
    /// configured tier.
    pub fn visible_skills(&self, level: u32) -> Vec<String> {
        self.tiers
            .get(&level)
            .or_else(|| self.tiers.last_key_value().map(|(_, tier)| tier))
            .map(|tier| tier.visible_skills.clone())
            .unwrap_or_default()
    }

    /// Whether every required skill of the tier for `level` is present in
    /// `skills` at the required level.
    fn is_met(&self, level: u32, skills: &[Skill]) -> bool {
        let Some(tier) = self.requirements(level) else {
            return false;
        };
        let required = tier.required_skills();
        !required.is_empty()
            && required.iter().all(|name| {
                skills
                    .iter()
                    .any(|s| s.name == *name && s.level >= tier.required_level)
            })
    }
}

/// Evaluates and performs prestiges.
pub struct PrestigeGate {
    skills: Arc<dyn SkillRepository>,
    prestige: Arc<dyn PrestigeRepository>,
    table: PrestigeTable,
    state: watch::Sender<Prestige>,
    lock: Mutex<()>,
}

impl PrestigeGate {
    /// Create a gate and publish its initial evaluation.
    pub fn new(
        skills: Arc<dyn SkillRepository>,
        prestige: Arc<dyn PrestigeRepository>,
        table: PrestigeTable,
    ) -> Result<Self, PrestigeError> {
        let (state, _rx) = watch::channel(Prestige::default());
        let gate = Self {
            skills,
            prestige,
            table,
            state,
            lock: Mutex::new(()),
        };
        gate.evaluate()?;
        Ok(gate)
    }

    /// Recompute `{ level, can_prestige }` from live state and publish it.
    pub fn evaluate(&self) -> Result<Prestige, PrestigeError> {
        let level = self.prestige.level()?;
        let skills = self.skills.get_all()?;
        let result = Prestige {
            level,
            can_prestige: self.table.is_met(level, &skills),
        };
        let previous = self.state.send_replace(result);
        if previous.can_prestige != result.can_prestige {
            info!(level, can_prestige = result.can_prestige, "Prestige eligibility changed");
        }
        Ok(result)
    }

    /// Prestige if eligible.
    ///
    /// Returns `false` without side effects when the requirements are not
    /// met. Otherwise awaits `reset` before any skill is touched, resets
    /// every skill to level 1, increments the prestige level and republishes.
    pub async fn perform_prestige<F, Fut>(&self, reset: F) -> Result<bool, PrestigeError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ()>,
    {
        let _guard = self.lock.lock().await;

        let current = self.evaluate()?;
        if !current.can_prestige {
            debug!(level = current.level, "Prestige requested but not eligible");
            return Ok(false);
        }

        reset().await;

        let all = self.skills.get_all()?;
        self.skills.reset_all(&all)?;
        let next = current
            .level
            .checked_add(1)
            .ok_or(PrestigeError::LevelOverflow {
                level: current.level,
            })?;
        self.prestige.set_level(next)?;
        let published = self.evaluate()?;

        info!(
            from = current.level,
            to = published.level,
            skills_reset = all.len(),
            "Prestige performed"
        );
        Ok(true)
    }

    /// Skills shown at the given prestige level.
    pub fn visible_skills(&self, level: u32) -> Vec<String> {
        self.table.visible_skills(level)
    }

    /// Skills shown at the current prestige level.
    pub fn current_visible_skills(&self) -> Result<Vec<String>, PrestigeError> {
        Ok(self.visible_skills(self.prestige.level()?))
    }

    /// Requirements to advance past the given prestige level.
    pub fn requirements(&self, level: u32) -> Option<PrestigeLevelConfig> {
        self.table.requirements(level).cloned()
    }

    /// Last published evaluation.
    pub fn current(&self) -> Prestige {
        *self.state.borrow()
    }

    /// Subscribe to prestige evaluations (replay-latest).
    pub fn subscribe(&self) -> watch::Receiver<Prestige> {
        self.state.subscribe()
    }

    /// Subscribe to the stored prestige level.
    pub fn observe_level(&self) -> watch::Receiver<u32> {
        self.prestige.observe()
    }

    /// Re-evaluate on every skill or prestige-level change until aborted.
    pub fn spawn_watcher(self: &Arc<Self>) -> JoinHandle<()> {
        let gate = Arc::clone(self);
        let mut skills = gate.skills.observe();
        let mut level = gate.prestige.observe();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    changed = skills.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                    changed = level.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
                if let Err(err) = gate.evaluate() {
                    warn!(error = %err, "Prestige evaluation failed");
                }
            }
            debug!("Prestige watcher stopped");
        })
    }
}

impl std::fmt::Debug for PrestigeGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrestigeGate")
            .field("table", &self.table)
            .field("state", &*self.state.borrow())
            .finish_non_exhaustive()
    }
}
