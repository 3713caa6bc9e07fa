//! Training loop, level curve, and progression orchestration for the Idle
//! Skills engine.
//!
//! This crate converts elapsed time into experience: a cancellable timed
//! action loop credits XP per completed action, resolves (possibly
//! cascading) level-ups, re-filters unlocked methods and tools, publishes
//! live telemetry, and gates prestige.
//!
//! # Modules
//!
//! - [`config`] -- Configuration loading from `idleskills-config.yaml` into
//!   strongly-typed structs.
//! - [`level_curve`] -- [`LevelCurve`]: level requirements and XP
//!   application.
//! - [`catalog`] -- [`Catalog`] trait, [`StaticCatalog`], and the
//!   level-gating helpers.
//! - [`repository`] -- Skill and prestige repositories with in-memory
//!   implementations.
//! - [`session`] -- [`TrainingManager`], the single cancellable training
//!   loop.
//! - [`prestige`] -- [`PrestigeGate`]: eligibility, reset, and tier lookup.
//! - [`facade`] -- [`ProgressionFacade`], the command and state surface.
//!
//! [`LevelCurve`]: level_curve::LevelCurve
//! [`Catalog`]: catalog::Catalog
//! [`StaticCatalog`]: catalog::StaticCatalog
//! [`TrainingManager`]: session::TrainingManager
//! [`PrestigeGate`]: prestige::PrestigeGate
//! [`ProgressionFacade`]: facade::ProgressionFacade

pub mod catalog;
pub mod config;
pub mod facade;
pub mod level_curve;
pub mod prestige;
pub mod repository;
pub mod session;
