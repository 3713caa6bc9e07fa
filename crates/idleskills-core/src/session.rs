//! Cancellable timed training loop.
//!
//! A [`TrainingManager`] owns at most one running session. Each session is a
//! spawned task that repeats one action after another:
//!
//! 1. Sample progress every `progress_interval` until the action duration
//!    has elapsed, sleeping `min(interval, remaining)` between samples.
//! 2. Emit a final progress of exactly `1.0`.
//! 3. Credit the tool-adjusted XP through the [`LevelCurve`] and the
//!    repository, then emit [`SessionEvent::ActionCompleted`].
//!
//! Cancellation aborts the task at its next sleep and waits for it to
//! finish, so two sessions never overlap. A cancelled action is not
//! credited. Every event carries the [`SessionId`] of the loop that sent
//! it; consumers drop events whose id is no longer current.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use idleskills_types::{SessionId, Skill, Tool, TrainingMethod, TrainingState};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use crate::level_curve::{LevelCurve, LevelCurveError};
use crate::repository::{RepositoryError, SkillRepository};

/// Event emitted by a running session.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// Progress of the current action.
    Progress {
        /// Session that sampled the progress.
        session: SessionId,
        /// Fraction of the action elapsed, in `[0.0, 1.0]`.
        fraction: f64,
    },

    /// An action finished and its XP was stored.
    ActionCompleted {
        /// Session that completed the action.
        session: SessionId,
        /// The skill as stored after the XP was applied.
        skill: Skill,
        /// Experience credited for the action.
        xp_gained: u64,
        /// Whether the level increased.
        leveled_up: bool,
    },

    /// Applying XP failed; the session has ended.
    Failed {
        /// Session that failed.
        session: SessionId,
        /// User-visible failure description.
        message: String,
    },
}

impl SessionEvent {
    /// Id of the session that sent the event.
    pub const fn session(&self) -> SessionId {
        match self {
            Self::Progress { session, .. }
            | Self::ActionCompleted { session, .. }
            | Self::Failed { session, .. } => *session,
        }
    }
}

/// Errors that end a session.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The repository could not serve or store the skill.
    #[error("repository error: {source}")]
    Repository {
        /// The underlying repository error.
        #[from]
        source: RepositoryError,
    },

    /// The XP could not be applied.
    #[error("level curve error: {source}")]
    LevelCurve {
        /// The underlying curve error.
        #[from]
        source: LevelCurveError,
    },

    /// The action duration cannot be scheduled.
    #[error("action duration of {duration_ms} ms is out of range")]
    DurationOutOfRange {
        /// The offending duration.
        duration_ms: u64,
    },
}

/// The session currently owned by a [`TrainingManager`].
#[derive(Debug)]
pub struct ActiveSession {
    /// Identifier of the loop.
    pub id: SessionId,
    /// Skill being trained.
    pub skill_name: String,
    /// Method in use.
    pub method: TrainingMethod,
    /// Tool in use, if any.
    pub tool: Option<Tool>,
    /// When the loop was started.
    pub started_at: DateTime<Utc>,
    handle: JoinHandle<()>,
}

impl ActiveSession {
    /// Whether the loop task has ended (failure or abort).
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

/// Owner of the single training loop.
pub struct TrainingManager {
    repository: Arc<dyn SkillRepository>,
    curve: LevelCurve,
    progress_interval: Duration,
    events: mpsc::UnboundedSender<SessionEvent>,
    active: Option<ActiveSession>,
    state: TrainingState,
}

impl TrainingManager {
    /// Create a manager and the receiving end of its event stream.
    pub fn new(
        repository: Arc<dyn SkillRepository>,
        curve: LevelCurve,
        progress_interval: Duration,
    ) -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let manager = Self {
            repository,
            curve,
            progress_interval: progress_interval.max(Duration::from_millis(1)),
            events,
            active: None,
            state: TrainingState::Idle,
        };
        (manager, rx)
    }

    /// Start training, cancelling any running session first.
    pub async fn start(
        &mut self,
        skill: &Skill,
        method: TrainingMethod,
        tool: Option<Tool>,
    ) -> SessionId {
        self.cancel().await;

        let id = SessionId::new();
        let ctx = LoopContext {
            id,
            skill_name: skill.name.clone(),
            method: method.clone(),
            tool: tool.clone(),
            repository: Arc::clone(&self.repository),
            curve: self.curve,
            progress_interval: self.progress_interval,
            events: self.events.clone(),
        };
        let handle = tokio::spawn(run_loop(ctx));

        debug!(
            session = %id,
            skill = %skill.name,
            method = %method.name,
            tool = tool.as_ref().map(|t| t.name.as_str()),
            "Training session started"
        );

        self.active = Some(ActiveSession {
            id,
            skill_name: skill.name.clone(),
            method,
            tool,
            started_at: Utc::now(),
            handle,
        });
        self.state = TrainingState::Running;
        id
    }

    /// Stop the running session, wait for its task to end and return to
    /// idle. Also releases a session whose loop ended on its own after a
    /// failure. Returns whether a session was held.
    pub async fn cancel(&mut self) -> bool {
        let stopped = self.stop().await;
        self.state = TrainingState::Idle;
        stopped
    }

    async fn stop(&mut self) -> bool {
        let Some(session) = self.active.take() else {
            return false;
        };
        session.handle.abort();
        if let Err(err) = session.handle.await
            && !err.is_cancelled()
        {
            warn!(session = %session.id, error = %err, "Training task ended abnormally");
        }
        debug!(session = %session.id, skill = %session.skill_name, "Training session stopped");
        true
    }

    /// The owned session, if one was started and not cancelled.
    pub const fn active(&self) -> Option<&ActiveSession> {
        self.active.as_ref()
    }

    /// Whether `skill_name` is being trained by a live loop.
    pub fn is_training(&self, skill_name: &str) -> bool {
        self.active
            .as_ref()
            .is_some_and(|s| s.skill_name == skill_name && !s.is_finished())
    }

    /// Current lifecycle phase. A loop that ended on its own reports idle.
    pub fn state(&self) -> TrainingState {
        match &self.active {
            Some(session) if session.is_finished() => TrainingState::Idle,
            _ => self.state,
        }
    }
}

impl Drop for TrainingManager {
    fn drop(&mut self) {
        if let Some(session) = &self.active {
            session.handle.abort();
        }
    }
}

impl std::fmt::Debug for TrainingManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrainingManager")
            .field("curve", &self.curve)
            .field("progress_interval", &self.progress_interval)
            .field("active", &self.active)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Loop
// ---------------------------------------------------------------------------

struct LoopContext {
    id: SessionId,
    skill_name: String,
    method: TrainingMethod,
    tool: Option<Tool>,
    repository: Arc<dyn SkillRepository>,
    curve: LevelCurve,
    progress_interval: Duration,
    events: mpsc::UnboundedSender<SessionEvent>,
}

impl LoopContext {
    /// Send an event; false once nobody listens any more.
    fn emit(&self, event: SessionEvent) -> bool {
        self.events.send(event).is_ok()
    }

    /// Sample progress until one action has elapsed.
    async fn wait_for_action(&self, duration: Duration) -> Result<(), SessionError> {
        let started = Instant::now();
        let end = started
            .checked_add(duration)
            .ok_or(SessionError::DurationOutOfRange {
                duration_ms: self.method.action_duration_ms,
            })?;

        loop {
            let now = Instant::now();
            if now >= end {
                return Ok(());
            }
            let fraction = progress_fraction(now.saturating_duration_since(started), duration);
            trace!(session = %self.id, fraction, "Progress");
            if !self.emit(SessionEvent::Progress {
                session: self.id,
                fraction,
            }) {
                return Ok(());
            }
            let remaining = end.saturating_duration_since(now);
            tokio::time::sleep(remaining.min(self.progress_interval)).await;
        }
    }

    /// Credit one action. Returns the stored skill, the XP gained and
    /// whether the level increased.
    fn credit_action(&self) -> Result<(Skill, u64, bool), SessionError> {
        let xp_gained = self.method.xp_for_action(self.tool.as_ref());
        let current = self.repository.get(&self.skill_name)?;
        let next = self.curve.apply_xp(&current, xp_gained)?;
        let stored = self.repository.update(next)?;
        let leveled_up = stored.level > current.level;
        if leveled_up {
            info!(
                skill = %stored.name,
                from = current.level,
                to = stored.level,
                "Level up"
            );
        }
        Ok((stored, xp_gained, leveled_up))
    }
}

async fn run_loop(ctx: LoopContext) {
    // Zero would spin without ever yielding.
    let duration = Duration::from_millis(ctx.method.action_duration_ms.max(1));

    loop {
        if let Err(err) = ctx.wait_for_action(duration).await {
            fail(&ctx, &err);
            return;
        }
        if !ctx.emit(SessionEvent::Progress {
            session: ctx.id,
            fraction: 1.0,
        }) {
            return;
        }

        match ctx.credit_action() {
            Ok((skill, xp_gained, leveled_up)) => {
                if !ctx.emit(SessionEvent::ActionCompleted {
                    session: ctx.id,
                    skill,
                    xp_gained,
                    leveled_up,
                }) {
                    return;
                }
            }
            Err(err) => {
                fail(&ctx, &err);
                return;
            }
        }
    }
}

fn fail(ctx: &LoopContext, err: &SessionError) {
    warn!(session = %ctx.id, skill = %ctx.skill_name, error = %err, "Training session failed");
    ctx.emit(SessionEvent::Failed {
        session: ctx.id,
        message: err.to_string(),
    });
}

/// Elapsed fraction of an action, clamped to `[0.0, 1.0]`.
fn progress_fraction(elapsed: Duration, duration: Duration) -> f64 {
    let total = duration.as_secs_f64();
    if total <= 0.0 {
        return 1.0;
    }
    (elapsed.as_secs_f64() / total).clamp(0.0, 1.0)
}
