//! Core entity structs for the Idle Skills engine.
//!
//! Covers the static catalog entries ([`TrainingMethod`], [`Tool`]), the
//! mutable per-skill progression record ([`Skill`]), prestige state, and
//! the snapshot published to the rendering layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::TrainingState;
use crate::ids::SessionId;

/// Milliseconds in one hour, used for XP-rate telemetry.
pub const MS_PER_HOUR: u64 = 3_600_000;

/// Level every skill starts at and returns to on a prestige reset.
pub const STARTING_LEVEL: u32 = 1;

// ---------------------------------------------------------------------------
// Skill
// ---------------------------------------------------------------------------

/// Progression record for one skill.
///
/// Identity is the `name`. Once normalized by the level curve, `xp` is
/// always below the requirement for the next level.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Skill {
    /// Unique skill name, e.g. `"Woodcutting"`.
    pub name: String,
    /// Current level, starting at 1.
    pub level: u32,
    /// Experience accumulated towards the next level.
    pub xp: u64,
}

impl Skill {
    /// Create a fresh skill at level 1 with no experience.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            level: STARTING_LEVEL,
            xp: 0,
        }
    }

    /// Return a copy of this skill reset to level 1 and 0 XP.
    #[must_use]
    pub fn reset(&self) -> Self {
        Self::new(self.name.clone())
    }
}

// ---------------------------------------------------------------------------
// Catalog entries
// ---------------------------------------------------------------------------

/// One trainable action for a skill (e.g. chopping an oak tree).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct TrainingMethod {
    /// Skill this method trains.
    pub skill_name: String,
    /// Display name of the method.
    pub name: String,
    /// Base experience credited per completed action.
    pub xp_per_action: u32,
    /// Wall-clock duration of one action in milliseconds.
    pub action_duration_ms: u64,
    /// Minimum skill level needed to use the method.
    #[serde(default = "default_required_level")]
    pub required_level: u32,
}

impl TrainingMethod {
    /// Experience credited for one action, after the tool's efficiency.
    pub fn xp_for_action(&self, tool: Option<&Tool>) -> u64 {
        tool.map_or_else(
            || u64::from(self.xp_per_action),
            |t| t.scale_xp(self.xp_per_action),
        )
    }

    /// Whole actions that fit in one hour.
    pub const fn actions_per_hour(&self) -> u64 {
        match MS_PER_HOUR.checked_div(self.action_duration_ms) {
            Some(n) => n,
            None => 0,
        }
    }

    /// Experience per hour with the given tool equipped.
    pub fn xp_per_hour(&self, tool: Option<&Tool>) -> u64 {
        self.actions_per_hour()
            .saturating_mul(self.xp_for_action(tool))
    }
}

/// An equippable modifier for one skill (e.g. an iron axe).
///
/// `efficiency` multiplies the experience credited per action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Tool {
    /// Skill this tool is used for.
    pub skill_name: String,
    /// Display name of the tool.
    pub name: String,
    /// XP multiplier, 1.0 meaning no bonus.
    #[serde(default = "default_efficiency")]
    pub efficiency: f64,
    /// Minimum skill level needed to equip the tool.
    #[serde(default = "default_required_level")]
    pub required_level: u32,
}

impl Tool {
    /// Scale a base XP amount by this tool's efficiency, rounding to the
    /// nearest whole point.
    pub fn scale_xp(&self, base: u32) -> u64 {
        let scaled = (f64::from(base) * self.efficiency.max(0.0)).round();
        // Non-negative and bounded by u32::MAX * efficiency.
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let xp = scaled as u64;
        xp
    }
}

// ---------------------------------------------------------------------------
// Prestige
// ---------------------------------------------------------------------------

/// Prestige progression state.
///
/// `can_prestige` is derived from the live skill state every time it is
/// published; it is never stored as the source of truth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Prestige {
    /// Number of prestiges performed so far.
    pub level: u32,
    /// Whether the requirements for the next prestige are currently met.
    pub can_prestige: bool,
}

/// Static configuration of one prestige tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct PrestigeLevelConfig {
    /// Skills shown to the player at this tier.
    pub visible_skills: Vec<String>,
    /// Skills checked to advance past this tier. Defaults to the visible set.
    #[serde(default)]
    pub required_skills: Option<Vec<String>>,
    /// Level every required skill must reach.
    #[serde(default = "default_prestige_required_level")]
    pub required_level: u32,
}

impl PrestigeLevelConfig {
    /// Create a tier whose required skills are its visible skills, at the
    /// default threshold of 99.
    pub fn new(visible_skills: Vec<String>) -> Self {
        Self {
            visible_skills,
            required_skills: None,
            required_level: default_prestige_required_level(),
        }
    }

    /// Skills that must reach [`required_level`](Self::required_level).
    pub fn required_skills(&self) -> &[String] {
        self.required_skills
            .as_deref()
            .unwrap_or(self.visible_skills.as_slice())
    }
}

// ---------------------------------------------------------------------------
// Published snapshot
// ---------------------------------------------------------------------------

/// Telemetry for the running training session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct SessionInfo {
    /// Identifier of the running loop.
    pub id: SessionId,
    /// Skill being trained.
    pub skill_name: String,
    /// Method in use.
    pub method_name: String,
    /// Tool in use, if any.
    pub tool_name: Option<String>,
    /// When the loop was started.
    pub started_at: DateTime<Utc>,
    /// Actions completed by this loop.
    pub actions_completed: u64,
    /// Experience credited by this loop.
    pub xp_gained: u64,
}

/// Read-only state published to the rendering layer.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct TrainingSnapshot {
    /// Loop lifecycle phase.
    pub state: TrainingState,
    /// Name of the skill selected for training.
    pub active_skill: Option<String>,
    /// Skills visible at the current prestige level.
    pub skills: Vec<Skill>,
    /// Methods unlocked for the active skill.
    pub methods: Vec<TrainingMethod>,
    /// Method the loop is using.
    pub active_method: Option<TrainingMethod>,
    /// Tools unlocked for the active skill.
    pub tools: Vec<Tool>,
    /// Tool the loop is using.
    pub active_tool: Option<Tool>,
    /// Whether an unlocked tool outranks the equipped one.
    pub better_tool_available: bool,
    /// Progress of the current action in `[0.0, 1.0]`.
    pub progress: f64,
    /// Experience per hour of the active method and tool.
    pub xp_per_hour: u64,
    /// Telemetry of the running loop.
    pub session: Option<SessionInfo>,
    /// Whether a skill load is in flight.
    pub is_loading: bool,
    /// Last user-visible error.
    pub error: Option<String>,
}

impl TrainingSnapshot {
    /// The record of the active skill, if it is among the visible skills.
    pub fn active_skill_record(&self) -> Option<&Skill> {
        let name = self.active_skill.as_deref()?;
        self.skills.iter().find(|s| s.name == name)
    }

    /// Clear everything tied to an active skill, keeping the skill list,
    /// loading flag and error.
    pub fn clear_training(&mut self) {
        self.state = TrainingState::Idle;
        self.active_skill = None;
        self.methods.clear();
        self.active_method = None;
        self.tools.clear();
        self.active_tool = None;
        self.better_tool_available = false;
        self.progress = 0.0;
        self.xp_per_hour = 0;
        self.session = None;
    }
}

// ---------------------------------------------------------------------------
// Serde defaults
// ---------------------------------------------------------------------------

const fn default_required_level() -> u32 {
    STARTING_LEVEL
}

const fn default_efficiency() -> f64 {
    1.0
}

const fn default_prestige_required_level() -> u32 {
    99
}
