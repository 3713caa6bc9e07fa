//! Headless autoplay driver.
//!
//! Each report tick the driver looks at the published state and plans at
//! most a few commands: restart training when idle, equip a better tool,
//! move to the best unlocked method, and prestige when allowed. Planning
//! is a pure function ([`plan`]) so it can be tested without a runtime.

use idleskills_core::catalog::best_available;
use idleskills_core::config::AutoplayConfig;
use idleskills_core::facade::ProgressionFacade;
use idleskills_types::{Prestige, TrainingMethod, TrainingSnapshot};
use tracing::{info, warn};

/// A command the driver issues to the facade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Prestige through the gate.
    Prestige,
    /// Start (or restart) training a skill.
    SelectSkill {
        /// Skill to train.
        skill: String,
    },
    /// Equip the best unlocked tool of a skill.
    EquipBestTool {
        /// Skill whose tool to upgrade.
        skill: String,
    },
    /// Switch to a different method of the active skill.
    SwitchMethod {
        /// Method to train.
        method: TrainingMethod,
    },
}

/// Plan the commands for one tick.
pub fn plan(snapshot: &TrainingSnapshot, prestige: Prestige, settings: &AutoplayConfig) -> Vec<Step> {
    if settings.auto_prestige && prestige.can_prestige {
        return vec![Step::Prestige];
    }

    let Some(target) = settings.skill.as_deref() else {
        return Vec::new();
    };
    if !snapshot.skills.iter().any(|s| s.name == target) {
        return Vec::new();
    }

    let training_target =
        snapshot.state.is_running() && snapshot.active_skill.as_deref() == Some(target);
    if !training_target {
        return vec![Step::SelectSkill {
            skill: target.to_owned(),
        }];
    }

    let mut steps = Vec::new();
    if snapshot.better_tool_available {
        steps.push(Step::EquipBestTool {
            skill: target.to_owned(),
        });
    }

    // Methods in the snapshot are already unlocked.
    let best = best_available(&snapshot.methods, u32::MAX);
    if let Some(best) = best
        && snapshot
            .active_method
            .as_ref()
            .is_none_or(|active| active.name != best.name)
    {
        steps.push(Step::SwitchMethod { method: best });
    }
    steps
}

/// Execute planned steps in order. Failures are logged and skipped.
pub async fn run_steps(facade: &ProgressionFacade, steps: Vec<Step>) {
    for step in steps {
        let outcome = match &step {
            Step::Prestige => facade.prestige().await.map(|performed| {
                if performed {
                    info!("Autoplay prestiged");
                }
            }),
            Step::SelectSkill { skill } => facade.select_skill(skill).await,
            Step::EquipBestTool { skill } => facade.select_best_tool(skill).await.map(|_| ()),
            Step::SwitchMethod { method } => facade.select_method(method.clone()).await,
        };
        if let Err(err) = outcome {
            warn!(step = ?step, error = %err, "Autoplay step failed");
        }
    }
}
