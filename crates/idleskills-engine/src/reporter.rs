//! Periodic status reporting.
//!
//! The [`StatusReporter`] condenses the published [`TrainingSnapshot`] and
//! prestige state into a [`StatusLine`] and logs it. Lines identical to the
//! previous one are logged at debug level only, as JSON.

use idleskills_core::level_curve::LevelCurve;
use idleskills_types::{Prestige, TrainingSnapshot};
use serde::Serialize;
use tracing::{debug, info, warn};

/// One condensed status report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusLine {
    /// Skill being trained.
    pub skill: Option<String>,
    /// Level of that skill.
    pub level: u32,
    /// XP towards the next level.
    pub xp: u64,
    /// XP still missing for the next level.
    pub xp_to_next: u64,
    /// Fraction of the way to the next level.
    pub level_progress: f64,
    /// Method in use.
    pub method: Option<String>,
    /// Tool in use.
    pub tool: Option<String>,
    /// Progress of the current action in `[0.0, 1.0]`.
    pub progress: f64,
    /// XP rate of the method and tool.
    pub xp_per_hour: u64,
    /// Actions completed by the running session.
    pub actions: u64,
    /// XP credited by the running session.
    pub session_xp: u64,
    /// Whether a better tool is unlocked.
    pub better_tool: bool,
    /// Prestiges performed.
    pub prestige_level: u32,
    /// Whether a prestige is available.
    pub can_prestige: bool,
    /// Last error.
    pub error: Option<String>,
}

impl StatusLine {
    /// Build a status line from published state.
    pub fn from_state(snapshot: &TrainingSnapshot, prestige: Prestige, curve: &LevelCurve) -> Self {
        let record = snapshot.active_skill_record();
        let (level, xp) = record.map_or((0, 0), |s| (s.level, s.xp));
        let xp_to_next = record.map_or(0, |s| curve.xp_for_next_level(s.level).saturating_sub(s.xp));
        let level_progress = record.map_or(0.0, |s| curve.level_progress(s));
        let session = snapshot.session.as_ref();

        Self {
            skill: snapshot.active_skill.clone(),
            level,
            xp,
            xp_to_next,
            level_progress,
            method: snapshot.active_method.as_ref().map(|m| m.name.clone()),
            tool: snapshot.active_tool.as_ref().map(|t| t.name.clone()),
            progress: snapshot.progress,
            xp_per_hour: snapshot.xp_per_hour,
            actions: session.map_or(0, |s| s.actions_completed),
            session_xp: session.map_or(0, |s| s.xp_gained),
            better_tool: snapshot.better_tool_available,
            prestige_level: prestige.level,
            can_prestige: prestige.can_prestige,
            error: snapshot.error.clone(),
        }
    }

    /// Same report ignoring the progress of the current action.
    fn same_as(&self, other: &Self) -> bool {
        Self {
            progress: other.progress,
            ..self.clone()
        } == *other
    }
}

/// Logs status lines, suppressing repeats to debug level.
#[derive(Debug)]
pub struct StatusReporter {
    curve: LevelCurve,
    last: Option<StatusLine>,
}

impl StatusReporter {
    /// Create a reporter using `curve` for the XP-to-next figure.
    pub const fn new(curve: LevelCurve) -> Self {
        Self { curve, last: None }
    }

    /// Build, log, and remember a status line. Returns the line.
    pub fn report(&mut self, snapshot: &TrainingSnapshot, prestige: Prestige) -> StatusLine {
        let line = StatusLine::from_state(snapshot, prestige, &self.curve);
        let repeated = self.last.as_ref().is_some_and(|last| last.same_as(&line));

        if repeated {
            match serde_json::to_string(&line) {
                Ok(json) => debug!(status = %json, "Status unchanged"),
                Err(e) => warn!(error = %e, "Failed to serialize status"),
            }
        } else {
            info!(
                skill = line.skill.as_deref(),
                level = line.level,
                xp = line.xp,
                xp_to_next = line.xp_to_next,
                level_progress = line.level_progress,
                method = line.method.as_deref(),
                tool = line.tool.as_deref(),
                xp_per_hour = line.xp_per_hour,
                actions = line.actions,
                session_xp = line.session_xp,
                prestige_level = line.prestige_level,
                can_prestige = line.can_prestige,
                "Status"
            );
            if let Some(error) = &line.error {
                warn!(error = %error, "Training error reported");
            }
        }

        match serde_json::to_string(snapshot) {
            Ok(json) => debug!(snapshot = %json, "Published snapshot"),
            Err(e) => warn!(error = %e, "Failed to serialize snapshot"),
        }

        self.last = Some(line.clone());
        line
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use idleskills_types::{SessionId, SessionInfo, Skill, Tool, TrainingMethod, TrainingState};

    use super::*;

    fn training_snapshot() -> TrainingSnapshot {
        TrainingSnapshot {
            state: TrainingState::Running,
            active_skill: Some(String::from("Woodcutting")),
            skills: vec![
                Skill {
                    name: String::from("Woodcutting"),
                    level: 3,
                    xp: 5,
                },
                Skill::new("Mining"),
            ],
            active_method: Some(TrainingMethod {
                skill_name: String::from("Woodcutting"),
                name: String::from("Tree"),
                xp_per_action: 10,
                action_duration_ms: 10_000,
                required_level: 1,
            }),
            active_tool: Some(Tool {
                skill_name: String::from("Woodcutting"),
                name: String::from("Bronze Axe"),
                efficiency: 1.0,
                required_level: 1,
            }),
            progress: 0.3,
            xp_per_hour: 3_600,
            session: Some(SessionInfo {
                id: SessionId::new(),
                skill_name: String::from("Woodcutting"),
                method_name: String::from("Tree"),
                tool_name: Some(String::from("Bronze Axe")),
                started_at: Utc::now(),
                actions_completed: 4,
                xp_gained: 40,
            }),
            ..TrainingSnapshot::default()
        }
    }

    #[test]
    fn line_reflects_active_skill() {
        let line = StatusLine::from_state(
            &training_snapshot(),
            Prestige {
                level: 1,
                can_prestige: false,
            },
            &LevelCurve::default(),
        );
        assert_eq!(line.skill.as_deref(), Some("Woodcutting"));
        assert_eq!(line.level, 3);
        // Level 3 needs 12.
        assert_eq!(line.xp_to_next, 7);
        assert!((line.level_progress - 5.0 / 12.0).abs() < 1e-9);
        assert_eq!(line.tool.as_deref(), Some("Bronze Axe"));
        assert_eq!(line.actions, 4);
        assert_eq!(line.session_xp, 40);
        assert_eq!(line.prestige_level, 1);
    }

    #[test]
    fn idle_snapshot_reports_zeros() {
        let line = StatusLine::from_state(
            &TrainingSnapshot::default(),
            Prestige::default(),
            &LevelCurve::default(),
        );
        assert!(line.skill.is_none());
        assert_eq!(line.level, 0);
        assert_eq!(line.xp_to_next, 0);
        assert!(line.level_progress.abs() < f64::EPSILON);
        assert_eq!(line.actions, 0);
    }

    #[test]
    fn line_serializes_for_json_logs() {
        let line = StatusLine::from_state(
            &training_snapshot(),
            Prestige::default(),
            &LevelCurve::default(),
        );
        let json = serde_json::to_value(&line).unwrap();
        let field = |name: &str| json.get(name).cloned().unwrap_or_default();
        assert_eq!(field("skill"), "Woodcutting");
        assert_eq!(field("xp_to_next"), 7);
        assert_eq!(field("tool"), "Bronze Axe");
        assert!(field("error").is_null());
    }

    #[test]
    fn progress_alone_is_a_repeat() {
        let mut reporter = StatusReporter::new(LevelCurve::default());
        let mut snapshot = training_snapshot();
        let first = reporter.report(&snapshot, Prestige::default());

        snapshot.progress = 0.9;
        let second = reporter.report(&snapshot, Prestige::default());
        assert!(first.same_as(&second));

        snapshot.session.as_mut().unwrap().actions_completed = 5;
        let third = StatusLine::from_state(&snapshot, Prestige::default(), &LevelCurve::default());
        assert!(!second.same_as(&third));
    }
}
