//! Enumeration types for the Idle Skills engine.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Lifecycle phase of the training loop as seen by the rendering layer.
///
/// `Cancelled` is transient: a cancelled session is dropped and the
/// published state returns to `Idle` once the cancellation is complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "snake_case")]
pub enum TrainingState {
    /// No loop is running.
    #[default]
    Idle,
    /// A loop is running for the active skill.
    Running,
    /// The loop was stopped and is being torn down.
    Cancelled,
}

impl TrainingState {
    /// Whether a loop is currently crediting experience.
    pub const fn is_running(self) -> bool {
        matches!(self, Self::Running)
    }
}
