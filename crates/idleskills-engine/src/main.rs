//! Headless driver for the Idle Skills engine.
//!
//! This is the main entry point that wires together the repositories,
//! catalog, prestige gate, and progression facade. It loads configuration,
//! starts training the configured skill, and reports status periodically
//! until interrupted or the configured run time elapses.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `idleskills-config.yaml` (or the path in
//!    `IDLESKILLS_CONFIG`)
//! 2. Initialize structured logging (tracing)
//! 3. Seed the skill and prestige repositories
//! 4. Build the catalog and prestige gate, start the eligibility watcher
//! 5. Create the progression facade
//! 6. Run the autoplay/report loop
//! 7. Shut down cleanly

mod autoplay;
mod error;
mod reporter;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use idleskills_core::catalog::StaticCatalog;
use idleskills_core::config::{GameConfig, LogFormat, LoggingConfig};
use idleskills_core::facade::ProgressionFacade;
use idleskills_core::level_curve::LevelCurve;
use idleskills_core::prestige::{PrestigeGate, PrestigeTable};
use idleskills_core::repository::{
    InMemoryPrestigeRepository, InMemorySkillRepository, PrestigeRepository, SkillRepository,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::error::EngineError;
use crate::reporter::StatusReporter;

/// Default configuration file, relative to the working directory.
const DEFAULT_CONFIG_PATH: &str = "idleskills-config.yaml";

/// Application entry point.
///
/// # Errors
///
/// Returns an error if configuration loading or engine wiring fails.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration.
    let config_path = config_path();
    let (config, from_file) = load_config(&config_path)?;

    // 2. Initialize structured logging.
    init_logging(&config.logging);
    info!("idleskills-engine starting");
    if from_file {
        info!(path = %config_path.display(), "Configuration loaded");
    } else {
        info!(path = %config_path.display(), "Config file not found, using defaults");
    }

    run(config).await?;
    info!("idleskills-engine shutdown complete");
    Ok(())
}

async fn run(config: GameConfig) -> Result<(), EngineError> {
    // 3. Seed repositories.
    let skills: Arc<dyn SkillRepository> = Arc::new(InMemorySkillRepository::new(
        config.skills.initial.iter().cloned(),
    ));
    let prestige: Arc<dyn PrestigeRepository> = Arc::new(InMemoryPrestigeRepository::default());
    info!(skill_count = config.skills.initial.len(), "Repositories seeded");

    // 4. Catalog and prestige gate.
    let catalog = Arc::new(StaticCatalog::from_config(&config.catalog));
    let curve = LevelCurve::from_config(&config.level_curve);
    let gate = Arc::new(PrestigeGate::new(
        Arc::clone(&skills),
        prestige,
        PrestigeTable::from_config(&config.prestige),
    )?);
    let watcher = gate.spawn_watcher();
    info!(
        tiers = config.prestige.tiers.len(),
        catalog_skills = config.catalog.skills.len(),
        "Catalog and prestige gate ready"
    );

    // 5. Progression facade.
    let facade = ProgressionFacade::new(
        skills,
        catalog,
        Arc::clone(&gate),
        curve,
        config.training.clone(),
    )?;
    info!(
        progress_interval_ms = config.training.progress_interval_ms,
        "Progression facade ready"
    );

    // 6. Autoplay and reporting.
    let settings = &config.autoplay;
    let mut reporter = StatusReporter::new(curve);
    let mut ticker = tokio::time::interval(Duration::from_millis(settings.report_interval_ms));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    let run_limit = run_limit(settings.run_seconds);
    tokio::pin!(run_limit);
    let interrupt = tokio::signal::ctrl_c();
    tokio::pin!(interrupt);

    info!(
        skill = settings.skill.as_deref(),
        auto_prestige = settings.auto_prestige,
        report_interval_ms = settings.report_interval_ms,
        run_seconds = settings.run_seconds,
        "Entering autoplay loop"
    );

    let outcome = loop {
        tokio::select! {
            signal = &mut interrupt => {
                info!("Interrupt received");
                break signal.map_err(EngineError::from);
            }
            () = &mut run_limit => {
                info!(run_seconds = settings.run_seconds, "Run limit reached");
                break Ok(());
            }
            _ = ticker.tick() => {
                let snapshot = facade.snapshot();
                let prestige = gate.current();
                reporter.report(&snapshot, prestige);
                let steps = autoplay::plan(&snapshot, prestige, settings);
                autoplay::run_steps(&facade, steps).await;
            }
        }
    };

    // 7. Shutdown.
    facade.shutdown().await;
    watcher.abort();
    let final_state = gate.current();
    info!(
        prestige_level = final_state.level,
        can_prestige = final_state.can_prestige,
        "Engine stopped"
    );
    outcome
}

/// Resolve the configuration path: `IDLESKILLS_CONFIG` or the default.
fn config_path() -> PathBuf {
    std::env::var_os("IDLESKILLS_CONFIG")
        .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from)
}

/// Load configuration from `path`, falling back to defaults when the file
/// does not exist. The flag reports whether the file was read.
fn load_config(path: &Path) -> Result<(GameConfig, bool), EngineError> {
    if path.exists() {
        Ok((GameConfig::from_file(path)?, true))
    } else {
        let mut config = GameConfig::default();
        config.logging.apply_env_overrides();
        Ok((config, false))
    }
}

/// Install the global tracing subscriber. `RUST_LOG` takes precedence over
/// the configured level.
fn init_logging(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    match logging.format {
        LogFormat::Pretty => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .init(),
    }
}

/// Completes after `run_seconds`, or never when it is zero.
async fn run_limit(run_seconds: u64) {
    if run_seconds == 0 {
        std::future::pending::<()>().await;
    } else {
        tokio::time::sleep(Duration::from_secs(run_seconds)).await;
    }
}
