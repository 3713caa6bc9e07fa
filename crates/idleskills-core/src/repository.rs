//! Skill and prestige repositories.
//!
//! The skill repository exclusively owns [`Skill`] records. Every mutation
//! republishes the full list on a [`watch`] channel, so late subscribers
//! always see the latest state first (replay-latest).

use idleskills_types::Skill;
use tokio::sync::watch;
use tracing::{debug, warn};

/// Errors returned by repository operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    /// No skill with the given name exists.
    #[error("skill not found: {0}")]
    NotFound(String),

    /// The backing store could not serve the request.
    #[error("repository unavailable: {message}")]
    Unavailable {
        /// Description of the failure.
        message: String,
    },
}

// ---------------------------------------------------------------------------
// Skills
// ---------------------------------------------------------------------------

/// Storage of per-skill progression records.
pub trait SkillRepository: Send + Sync {
    /// Fetch one skill by name.
    fn get(&self, name: &str) -> Result<Skill, RepositoryError>;

    /// Fetch every skill in storage order.
    fn get_all(&self) -> Result<Vec<Skill>, RepositoryError>;

    /// Subscribe to the full skill list. The receiver holds the current
    /// list immediately and is notified on every mutation.
    fn observe(&self) -> watch::Receiver<Vec<Skill>>;

    /// Replace the stored record with the same name.
    ///
    /// An unknown name is a no-op that returns the input unchanged.
    fn update(&self, skill: Skill) -> Result<Skill, RepositoryError>;

    /// Reset the named skills to level 1 with 0 XP and return the reset
    /// records. Names not in storage are ignored.
    fn reset_all(&self, skills: &[Skill]) -> Result<Vec<Skill>, RepositoryError>;
}

/// In-memory skill store backed by a watch channel.
#[derive(Debug)]
pub struct InMemorySkillRepository {
    skills: watch::Sender<Vec<Skill>>,
}

impl InMemorySkillRepository {
    /// Seed the store with fresh level-1 skills.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_skills(names.into_iter().map(Skill::new).collect())
    }

    /// Seed the store with explicit records.
    pub fn with_skills(skills: Vec<Skill>) -> Self {
        let (tx, _rx) = watch::channel(skills);
        Self { skills: tx }
    }
}

impl SkillRepository for InMemorySkillRepository {
    fn get(&self, name: &str) -> Result<Skill, RepositoryError> {
        self.skills
            .borrow()
            .iter()
            .find(|s| s.name == name)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound(name.to_owned()))
    }

    fn get_all(&self) -> Result<Vec<Skill>, RepositoryError> {
        Ok(self.skills.borrow().clone())
    }

    fn observe(&self) -> watch::Receiver<Vec<Skill>> {
        self.skills.subscribe()
    }

    fn update(&self, skill: Skill) -> Result<Skill, RepositoryError> {
        let mut replaced = false;
        self.skills.send_if_modified(|skills| {
            if let Some(slot) = skills.iter_mut().find(|s| s.name == skill.name) {
                slot.clone_from(&skill);
                replaced = true;
            }
            replaced
        });
        if replaced {
            debug!(skill = %skill.name, level = skill.level, xp = skill.xp, "Skill updated");
        } else {
            warn!(skill = %skill.name, "Update for unknown skill ignored");
        }
        Ok(skill)
    }

    fn reset_all(&self, skills: &[Skill]) -> Result<Vec<Skill>, RepositoryError> {
        let mut reset = Vec::with_capacity(skills.len());
        self.skills.send_modify(|stored| {
            for slot in stored
                .iter_mut()
                .filter(|s| skills.iter().any(|r| r.name == s.name))
            {
                *slot = slot.reset();
                reset.push(slot.clone());
            }
        });
        debug!(count = reset.len(), "Skills reset");
        Ok(reset)
    }
}

// ---------------------------------------------------------------------------
// Prestige
// ---------------------------------------------------------------------------

/// Storage of the prestige level.
pub trait PrestigeRepository: Send + Sync {
    /// Number of prestiges performed.
    fn level(&self) -> Result<u32, RepositoryError>;

    /// Store a new prestige level.
    fn set_level(&self, level: u32) -> Result<(), RepositoryError>;

    /// Subscribe to the prestige level.
    fn observe(&self) -> watch::Receiver<u32>;
}

/// In-memory prestige level store.
#[derive(Debug)]
pub struct InMemoryPrestigeRepository {
    level: watch::Sender<u32>,
}

impl InMemoryPrestigeRepository {
    /// Create a store at the given prestige level.
    pub fn new(level: u32) -> Self {
        let (tx, _rx) = watch::channel(level);
        Self { level: tx }
    }
}

impl Default for InMemoryPrestigeRepository {
    fn default() -> Self {
        Self::new(0)
    }
}

impl PrestigeRepository for InMemoryPrestigeRepository {
    fn level(&self) -> Result<u32, RepositoryError> {
        Ok(*self.level.borrow())
    }

    fn set_level(&self, level: u32) -> Result<(), RepositoryError> {
        self.level.send_replace(level);
        Ok(())
    }

    fn observe(&self) -> watch::Receiver<u32> {
        self.level.subscribe()
    }
}
