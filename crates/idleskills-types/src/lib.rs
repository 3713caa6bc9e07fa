//! Shared type definitions for the Idle Skills progression engine.
//!
//! This crate is the single source of truth for the data model shared by
//! the engine core, the headless binary, and the rendering layer. Types are
//! exported to `TypeScript` via `ts-rs` so the UI consumes the same shapes.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe UUID wrappers (training session identifiers)
//! - [`enums`] -- Training lifecycle enumeration
//! - [`structs`] -- Skills, catalog entries, prestige state, and the
//!   published training snapshot

pub mod enums;
pub mod ids;
pub mod structs;

// Re-export all public types at crate root for convenience.
pub use enums::TrainingState;
pub use ids::SessionId;
pub use structs::{
    MS_PER_HOUR, Prestige, PrestigeLevelConfig, STARTING_LEVEL, SessionInfo, Skill, Tool,
    TrainingMethod, TrainingSnapshot,
};
