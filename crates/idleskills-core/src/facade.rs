//! Progression facade: the command and state surface for the rendering layer.
//!
//! The facade turns player commands (select a skill, pick a method, equip
//! the best tool, reset, prestige) into training sessions and publishes a
//! single [`TrainingSnapshot`] on a replay-latest [`watch`] channel.
//!
//! # Concurrency
//!
//! Every command and every session event is applied under one
//! [`tokio::sync::Mutex`], so the snapshot only ever moves between
//! consistent states. Two background tasks feed it:
//!
//! - the event pump, which applies [`SessionEvent`]s from the current
//!   session and drops those of replaced sessions;
//! - the skill observer, which reloads the visible skill list whenever the
//!   repository or the prestige level changes.
//!
//! The skill list is always read back from the repository, never taken
//! from event payloads.

use std::collections::BTreeMap;
use std::sync::Arc;

use idleskills_types::{
    SessionInfo, Skill, Tool, TrainingMethod, TrainingSnapshot, TrainingState,
};
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::catalog::{Catalog, Unlockable, best_available, unlocked};
use crate::config::TrainingConfig;
use crate::level_curve::LevelCurve;
use crate::prestige::{PrestigeError, PrestigeGate};
use crate::repository::{RepositoryError, SkillRepository};
use crate::session::{SessionEvent, TrainingManager};

/// Errors returned by facade commands.
#[derive(Debug, thiserror::Error)]
pub enum FacadeError {
    /// A repository call failed.
    #[error("repository error: {source}")]
    Repository {
        /// The underlying repository error.
        #[from]
        source: RepositoryError,
    },

    /// The prestige gate failed.
    #[error("prestige error: {source}")]
    Prestige {
        /// The underlying prestige error.
        #[from]
        source: PrestigeError,
    },

    /// A method was selected while no skill is active.
    #[error("no skill is selected")]
    NoActiveSkill,

    /// The method trains a different skill than the active one.
    #[error("method '{method}' trains {method_skill}, not {active_skill}")]
    SkillMismatch {
        /// Selected method.
        method: String,
        /// Skill the method belongs to.
        method_skill: String,
        /// Skill currently selected.
        active_skill: String,
    },

    /// The method is not in the catalog of the active skill.
    #[error("unknown method '{method}' for {skill}")]
    UnknownMethod {
        /// Selected method.
        method: String,
        /// Active skill.
        skill: String,
    },

    /// The skill level is below the method's requirement.
    #[error("method '{method}' requires level {required_level}, skill is level {level}")]
    MethodLocked {
        /// Selected method.
        method: String,
        /// Level the method requires.
        required_level: u32,
        /// Current skill level.
        level: u32,
    },
}

/// State guarded by the facade lock.
struct FacadeState {
    manager: TrainingManager,
    snapshot: TrainingSnapshot,
    sticky_methods: BTreeMap<String, TrainingMethod>,
    sticky_tools: BTreeMap<String, Tool>,
}

impl FacadeState {
    /// Replace the session telemetry with the manager's new session.
    fn record_session_start(&mut self) {
        self.snapshot.session = self.manager.active().map(|s| SessionInfo {
            id: s.id,
            skill_name: s.skill_name.clone(),
            method_name: s.method.name.clone(),
            tool_name: s.tool.as_ref().map(|t| t.name.clone()),
            started_at: s.started_at,
            actions_completed: 0,
            xp_gained: 0,
        });
    }
}

struct Inner {
    repository: Arc<dyn SkillRepository>,
    catalog: Arc<dyn Catalog>,
    gate: Arc<PrestigeGate>,
    training: TrainingConfig,
    core: Mutex<FacadeState>,
    published: watch::Sender<TrainingSnapshot>,
}

/// Command surface and published state of the progression engine.
pub struct ProgressionFacade {
    inner: Arc<Inner>,
    tasks: std::sync::Mutex<Vec<JoinHandle<()>>>,
}

impl ProgressionFacade {
    /// Wire the facade and start its background tasks.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(
        repository: Arc<dyn SkillRepository>,
        catalog: Arc<dyn Catalog>,
        gate: Arc<PrestigeGate>,
        curve: LevelCurve,
        training: TrainingConfig,
    ) -> Result<Self, FacadeError> {
        let (manager, events) = TrainingManager::new(
            Arc::clone(&repository),
            curve,
            training.progress_interval(),
        );

        let skills_rx = repository.observe();
        let level_rx = gate.observe_level();

        let initial = TrainingSnapshot {
            skills: load_visible_skills(repository.as_ref(), &gate)?,
            ..TrainingSnapshot::default()
        };
        let (published, _rx) = watch::channel(initial.clone());
        let inner = Arc::new(Inner {
            repository,
            catalog,
            gate,
            training,
            core: Mutex::new(FacadeState {
                manager,
                snapshot: initial,
                sticky_methods: BTreeMap::new(),
                sticky_tools: BTreeMap::new(),
            }),
            published,
        });

        let tasks = vec![
            tokio::spawn(pump_events(Arc::clone(&inner), events)),
            tokio::spawn(observe_skills(Arc::clone(&inner), skills_rx, level_rx)),
        ];

        Ok(Self {
            inner,
            tasks: std::sync::Mutex::new(tasks),
        })
    }

    /// Subscribe to the published snapshot (replay-latest).
    pub fn subscribe(&self) -> watch::Receiver<TrainingSnapshot> {
        self.inner.published.subscribe()
    }

    /// The latest published snapshot.
    pub fn snapshot(&self) -> TrainingSnapshot {
        self.inner.published.borrow().clone()
    }

    /// The prestige gate this facade filters skills by.
    pub fn gate(&self) -> &Arc<PrestigeGate> {
        &self.inner.gate
    }

    /// Start training `skill_name`.
    ///
    /// A no-op while that skill is already being trained. Otherwise the
    /// running session is cancelled and a new one starts with the
    /// remembered method and tool of the skill, or the best available ones.
    /// Skills with no unlocked method get basic training. A skill that
    /// cannot be loaded leaves the engine idle with the error published.
    pub async fn select_skill(&self, skill_name: &str) -> Result<(), FacadeError> {
        let mut state = self.inner.core.lock().await;
        if state.manager.is_training(skill_name) {
            trace!(skill = skill_name, "Skill already training");
            return Ok(());
        }

        let skill = match self.inner.repository.get(skill_name) {
            Ok(skill) => skill,
            Err(err) => {
                warn!(skill = skill_name, error = %err, "Skill selection failed");
                self.inner.announce_cancel(&mut state);
                state.manager.cancel().await;
                state.snapshot.clear_training();
                state.snapshot.error = Some(err.to_string());
                self.inner.publish(&mut state);
                return Err(err.into());
            }
        };

        let methods = unlocked(&self.inner.catalog.methods_for(skill_name), skill.level);
        let tools = unlocked(&self.inner.catalog.tools_for(skill_name), skill.level);

        let method = state
            .sticky_methods
            .get(skill_name)
            .filter(|m| m.is_unlocked_at(skill.level))
            .cloned()
            .or_else(|| best_available(&methods, skill.level))
            .unwrap_or_else(|| self.inner.training.basic_method(skill_name));
        let tool = state
            .sticky_tools
            .get(skill_name)
            .filter(|t| t.is_unlocked_at(skill.level))
            .cloned()
            .or_else(|| best_available(&tools, skill.level));

        info!(
            skill = skill_name,
            level = skill.level,
            method = %method.name,
            tool = tool.as_ref().map(|t| t.name.as_str()),
            "Skill selected"
        );

        state.manager.start(&skill, method.clone(), tool.clone()).await;

        let snapshot = &mut state.snapshot;
        snapshot.active_skill = Some(skill.name.clone());
        snapshot.better_tool_available = better_tool_available(&tools, skill.level, tool.as_ref());
        snapshot.xp_per_hour = method.xp_per_hour(tool.as_ref());
        snapshot.methods = methods;
        snapshot.tools = tools;
        snapshot.active_method = Some(method);
        snapshot.active_tool = tool;
        snapshot.progress = 0.0;
        snapshot.error = None;
        state.record_session_start();
        self.inner.publish(&mut state);
        Ok(())
    }

    /// Switch the active skill to `method`.
    ///
    /// Selecting the method already in use is a no-op that keeps the
    /// running action's progress. Otherwise the choice is remembered for
    /// the skill and training restarts with the current tool.
    pub async fn select_method(&self, method: TrainingMethod) -> Result<(), FacadeError> {
        let mut state = self.inner.core.lock().await;
        let Some(active_skill) = state.snapshot.active_skill.clone() else {
            return Err(FacadeError::NoActiveSkill);
        };
        if method.skill_name != active_skill {
            return Err(FacadeError::SkillMismatch {
                method: method.name,
                method_skill: method.skill_name,
                active_skill,
            });
        }
        if state.snapshot.active_method.as_ref() == Some(&method)
            && state.manager.is_training(&active_skill)
        {
            trace!(skill = %active_skill, method = %method.name, "Method already active");
            return Ok(());
        }

        let known = method == self.inner.training.basic_method(&active_skill)
            || self
                .inner
                .catalog
                .methods_for(&active_skill)
                .contains(&method);
        if !known {
            return Err(FacadeError::UnknownMethod {
                method: method.name,
                skill: active_skill,
            });
        }

        let skill = self.inner.repository.get(&active_skill)?;
        if !method.is_unlocked_at(skill.level) {
            return Err(FacadeError::MethodLocked {
                method: method.name,
                required_level: method.required_level,
                level: skill.level,
            });
        }

        info!(skill = %active_skill, method = %method.name, "Method selected");
        state
            .sticky_methods
            .insert(active_skill.clone(), method.clone());

        let tool = state.snapshot.active_tool.clone();
        state.manager.start(&skill, method.clone(), tool.clone()).await;

        state.snapshot.xp_per_hour = method.xp_per_hour(tool.as_ref());
        state.snapshot.active_method = Some(method);
        state.snapshot.progress = 0.0;
        state.snapshot.error = None;
        state.record_session_start();
        self.inner.publish(&mut state);
        Ok(())
    }

    /// Equip the best unlocked tool for `skill_name`.
    ///
    /// Returns whether the equipped tool changed. If the skill is being
    /// trained, its session restarts with the same method and the new tool.
    pub async fn select_best_tool(&self, skill_name: &str) -> Result<bool, FacadeError> {
        let mut guard = self.inner.core.lock().await;
        let state = &mut *guard;
        let skill = self.inner.repository.get(skill_name)?;
        let tools = unlocked(&self.inner.catalog.tools_for(skill_name), skill.level);
        let Some(best) = best_available(&tools, skill.level) else {
            return Ok(false);
        };

        let is_active = state.snapshot.active_skill.as_deref() == Some(skill_name);
        let current = if is_active {
            state.snapshot.active_tool.as_ref()
        } else {
            state.sticky_tools.get(skill_name)
        };
        if current.is_some_and(|t| t.name == best.name) {
            return Ok(false);
        }

        info!(
            skill = skill_name,
            from = current.map(|t| t.name.as_str()),
            to = %best.name,
            "Tool equipped"
        );
        state
            .sticky_tools
            .insert(skill_name.to_owned(), best.clone());

        let running_method = state
            .manager
            .active()
            .filter(|_| state.manager.is_training(skill_name))
            .map(|s| s.method.clone());
        if let Some(method) = running_method {
            state
                .manager
                .start(&skill, method.clone(), Some(best.clone()))
                .await;
            state.snapshot.xp_per_hour = method.xp_per_hour(Some(&best));
            state.snapshot.progress = 0.0;
            state.record_session_start();
        } else if let Some(method) = state.snapshot.active_method.as_ref().filter(|_| is_active) {
            state.snapshot.xp_per_hour = method.xp_per_hour(Some(&best));
        }

        if is_active {
            state.snapshot.tools = tools;
            state.snapshot.active_tool = Some(best);
            state.snapshot.better_tool_available = false;
        }
        self.inner.publish(state);
        Ok(true)
    }

    /// Stop training and forget every remembered method and tool.
    pub async fn reset_all(&self) {
        let mut state = self.inner.core.lock().await;
        self.inner.reset_training(&mut state).await;
    }

    /// Reload the visible skills, flagging the snapshot as loading while
    /// the load is in flight. Clears the error on success.
    pub async fn refresh(&self) -> Result<(), FacadeError> {
        let mut state = self.inner.core.lock().await;
        state.snapshot.is_loading = true;
        self.inner.publish(&mut state);

        let loaded = self.inner.visible_skills();
        state.snapshot.is_loading = false;
        let result = match loaded {
            Ok(skills) => {
                debug!(count = skills.len(), "Skills loaded");
                state.snapshot.skills = skills;
                state.snapshot.error = None;
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, "Skill load failed");
                state.snapshot.error = Some(err.to_string());
                Err(err)
            }
        };
        self.inner.publish(&mut state);
        result
    }

    /// Prestige through the gate, resetting training first.
    ///
    /// Holds the facade lock until the skills are reset and the new level
    /// is stored. Returns whether a prestige was performed.
    pub async fn prestige(&self) -> Result<bool, FacadeError> {
        let mut guard = self.inner.core.lock().await;
        let reset = self.inner.reset_training(&mut guard);
        let performed = self.inner.gate.perform_prestige(|| reset).await?;

        if performed {
            match self.inner.visible_skills() {
                Ok(skills) => guard.snapshot.skills = skills,
                Err(err) => warn!(error = %err, "Skill reload failed"),
            }
            self.inner.publish(&mut guard);
        }
        Ok(performed)
    }

    /// Stop training and the background tasks.
    pub async fn shutdown(&self) {
        for task in self.take_tasks() {
            task.abort();
            if let Err(err) = task.await
                && !err.is_cancelled()
            {
                warn!(error = %err, "Facade task ended abnormally");
            }
        }
        let mut state = self.inner.core.lock().await;
        self.inner.announce_cancel(&mut state);
        state.manager.cancel().await;
        state.snapshot.session = None;
        state.snapshot.progress = 0.0;
        self.inner.publish(&mut state);
        info!("Progression facade shut down");
    }

    fn take_tasks(&self) -> Vec<JoinHandle<()>> {
        self.tasks
            .lock()
            .map(|mut tasks| std::mem::take(&mut *tasks))
            .unwrap_or_default()
    }
}

impl Drop for ProgressionFacade {
    fn drop(&mut self) {
        for task in self.take_tasks() {
            task.abort();
        }
    }
}

impl std::fmt::Debug for ProgressionFacade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressionFacade")
            .field("snapshot", &*self.inner.published.borrow())
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Shared state helpers
// ---------------------------------------------------------------------------

impl Inner {
    /// Skills visible at the current prestige level, in repository order.
    fn visible_skills(&self) -> Result<Vec<Skill>, FacadeError> {
        load_visible_skills(self.repository.as_ref(), &self.gate)
    }

    /// Re-filter methods and tools of the active skill after a level-up.
    fn refresh_unlocks(&self, state: &mut FacadeState, skill: &Skill) {
        if state.snapshot.active_skill.as_deref() != Some(skill.name.as_str()) {
            return;
        }
        let tools = unlocked(&self.catalog.tools_for(&skill.name), skill.level);
        state.snapshot.methods = unlocked(&self.catalog.methods_for(&skill.name), skill.level);
        state.snapshot.better_tool_available =
            better_tool_available(&tools, skill.level, state.snapshot.active_tool.as_ref());
        state.snapshot.tools = tools;
        debug!(
            skill = %skill.name,
            level = skill.level,
            methods = state.snapshot.methods.len(),
            tools = state.snapshot.tools.len(),
            better_tool = state.snapshot.better_tool_available,
            "Unlocks refreshed"
        );
    }

    /// Cancel training and clear sticky choices and the published
    /// training fields.
    async fn reset_training(&self, state: &mut FacadeState) {
        self.announce_cancel(state);
        state.manager.cancel().await;
        state.sticky_methods.clear();
        state.sticky_tools.clear();
        state.snapshot.clear_training();
        info!("Training reset");
        self.publish(state);
    }

    /// Publish `Cancelled` while a running session is torn down.
    fn announce_cancel(&self, state: &mut FacadeState) {
        if state.manager.active().is_some() {
            state.snapshot.state = TrainingState::Cancelled;
            self.published.send_replace(state.snapshot.clone());
        }
    }

    fn publish(&self, state: &mut FacadeState) {
        state.snapshot.state = state.manager.state();
        self.published.send_replace(state.snapshot.clone());
    }

    async fn apply_event(&self, event: SessionEvent) {
        let mut state = self.core.lock().await;
        let current = state.manager.active().map(|s| s.id);
        if current != Some(event.session()) {
            trace!(session = %event.session(), "Dropping event from replaced session");
            return;
        }

        match event {
            SessionEvent::Progress { fraction, .. } => {
                state.snapshot.progress = fraction;
            }
            SessionEvent::ActionCompleted {
                skill,
                xp_gained,
                leveled_up,
                ..
            } => {
                if let Some(info) = state.snapshot.session.as_mut() {
                    info.actions_completed = info.actions_completed.saturating_add(1);
                    info.xp_gained = info.xp_gained.saturating_add(xp_gained);
                }
                if leveled_up {
                    self.refresh_unlocks(&mut state, &skill);
                }
                match self.visible_skills() {
                    Ok(skills) => state.snapshot.skills = skills,
                    Err(err) => warn!(error = %err, "Skill reload failed"),
                }
            }
            SessionEvent::Failed { message, .. } => {
                state.manager.cancel().await;
                state.snapshot.error = Some(message);
                state.snapshot.progress = 0.0;
                state.snapshot.session = None;
            }
        }
        self.publish(&mut state);
    }
}

fn load_visible_skills(
    repository: &dyn SkillRepository,
    gate: &PrestigeGate,
) -> Result<Vec<Skill>, FacadeError> {
    let names = gate.current_visible_skills()?;
    let all = repository.get_all()?;
    Ok(all
        .into_iter()
        .filter(|s| names.iter().any(|n| *n == s.name))
        .collect())
}

/// Whether an unlocked tool outranks the equipped one.
fn better_tool_available(tools: &[Tool], level: u32, equipped: Option<&Tool>) -> bool {
    best_available(tools, level).is_some_and(|best| equipped.is_none_or(|t| t.name != best.name))
}

// ---------------------------------------------------------------------------
// Background tasks
// ---------------------------------------------------------------------------

async fn pump_events(inner: Arc<Inner>, mut events: mpsc::UnboundedReceiver<SessionEvent>) {
    while let Some(event) = events.recv().await {
        inner.apply_event(event).await;
    }
    debug!("Session event stream closed");
}

async fn observe_skills(
    inner: Arc<Inner>,
    mut skills: watch::Receiver<Vec<Skill>>,
    mut level: watch::Receiver<u32>,
) {
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
        let mut state = inner.core.lock().await;
        match inner.visible_skills() {
            Ok(visible) => state.snapshot.skills = visible,
            Err(err) => warn!(error = %err, "Skill reload failed"),
        }
        inner.publish(&mut state);
    }
    debug!("Skill observer stopped");
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn axe(name: &str, required_level: u32) -> Tool {
        Tool {
            skill_name: String::from("Woodcutting"),
            name: name.to_owned(),
            efficiency: 1.0,
            required_level,
        }
    }

    #[test]
    fn better_tool_compares_against_best_unlocked() {
        let tools = vec![axe("Bronze Axe", 1), axe("Iron Axe", 5), axe("Steel Axe", 15)];
        assert!(better_tool_available(&tools, 5, None));
        assert!(better_tool_available(&tools, 5, Some(&axe("Bronze Axe", 1))));
        assert!(!better_tool_available(&tools, 5, Some(&axe("Iron Axe", 5))));
        assert!(!better_tool_available(&[], 99, None));
    }
}
