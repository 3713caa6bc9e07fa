//! Configuration loading and typed config structures for the Idle Skills engine.
//!
//! The canonical configuration lives in `idleskills-config.yaml` at the
//! project root. This module defines strongly-typed structs that mirror the
//! YAML structure, and provides a loader that reads and validates the file.
//! Every section is optional; missing sections fall back to the defaults
//! below, which reproduce the stock game tables (Woodcutting catalog, two
//! prestige tiers).

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use idleskills_types::{PrestigeLevelConfig, TrainingMethod};
use serde::Deserialize;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// The configuration parsed but a value is out of range.
    #[error("invalid configuration: {reason}")]
    Invalid {
        /// Explanation of what is wrong with the configuration.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level engine configuration.
///
/// Mirrors the structure of `idleskills-config.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct GameConfig {
    /// XP curve constants.
    #[serde(default)]
    pub level_curve: LevelCurveConfig,

    /// Training loop timing and the basic-training fallback.
    #[serde(default)]
    pub training: TrainingConfig,

    /// Skills the repository is seeded with.
    #[serde(default)]
    pub skills: SkillsConfig,

    /// Per-skill training methods and tools.
    #[serde(default)]
    pub catalog: CatalogConfig,

    /// Prestige tiers.
    #[serde(default)]
    pub prestige: PrestigeConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Headless autoplay driver settings.
    #[serde(default)]
    pub autoplay: AutoplayConfig,
}

impl GameConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// Environment variables override logging values:
    /// - `IDLESKILLS_LOG_LEVEL` overrides `logging.level`
    /// - `IDLESKILLS_LOG_FORMAT` overrides `logging.format` (`pretty`/`json`)
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config = Self::parse(&contents)?;
        config.logging.apply_env_overrides();
        Ok(config)
    }

    /// Parse and validate configuration from a YAML string.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Check numeric constraints the type system cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.level_curve.validate()?;
        self.training.validate()?;
        self.catalog.validate()?;
        self.prestige.validate()?;
        if self.autoplay.report_interval_ms == 0 {
            return Err(invalid("autoplay.report_interval_ms must be at least 1"));
        }
        Ok(())
    }
}

fn invalid(reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        reason: reason.into(),
    }
}

// ---------------------------------------------------------------------------
// Level curve
// ---------------------------------------------------------------------------

/// Constants of the exponential XP curve.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LevelCurveConfig {
    /// XP needed to go from level 1 to level 2.
    #[serde(default = "default_base_xp")]
    pub base_xp: u64,

    /// Growth of the requirement per level.
    #[serde(default = "default_scaling_factor")]
    pub scaling_factor: f64,
}

impl LevelCurveConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.base_xp == 0 {
            return Err(invalid("level_curve.base_xp must be at least 1"));
        }
        if !self.scaling_factor.is_finite() || self.scaling_factor < 1.0 {
            return Err(invalid(format!(
                "level_curve.scaling_factor must be a finite value >= 1.0, got {}",
                self.scaling_factor
            )));
        }
        Ok(())
    }
}

impl Default for LevelCurveConfig {
    fn default() -> Self {
        Self {
            base_xp: default_base_xp(),
            scaling_factor: default_scaling_factor(),
        }
    }
}

// ---------------------------------------------------------------------------
// Training
// ---------------------------------------------------------------------------

/// Training loop timing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TrainingConfig {
    /// Interval between progress samples in milliseconds.
    #[serde(default = "default_progress_interval_ms")]
    pub progress_interval_ms: u64,

    /// XP per action when a skill has no unlocked method.
    #[serde(default = "default_basic_xp_per_action")]
    pub basic_xp_per_action: u32,

    /// Action duration when a skill has no unlocked method.
    #[serde(default = "default_basic_action_duration_ms")]
    pub basic_action_duration_ms: u64,
}

impl TrainingConfig {
    /// Progress sampling interval as a [`Duration`].
    pub const fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms)
    }

    /// The fallback method trained when the catalog has nothing unlocked
    /// for a skill.
    pub fn basic_method(&self, skill_name: &str) -> TrainingMethod {
        TrainingMethod {
            skill_name: skill_name.to_owned(),
            name: String::from("Basic training"),
            xp_per_action: self.basic_xp_per_action,
            action_duration_ms: self.basic_action_duration_ms,
            required_level: idleskills_types::STARTING_LEVEL,
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.progress_interval_ms == 0 {
            return Err(invalid("training.progress_interval_ms must be at least 1"));
        }
        if self.basic_xp_per_action == 0 || self.basic_action_duration_ms == 0 {
            return Err(invalid(
                "training.basic_xp_per_action and basic_action_duration_ms must be positive",
            ));
        }
        Ok(())
    }
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            progress_interval_ms: default_progress_interval_ms(),
            basic_xp_per_action: default_basic_xp_per_action(),
            basic_action_duration_ms: default_basic_action_duration_ms(),
        }
    }
}

// ---------------------------------------------------------------------------
// Skills
// ---------------------------------------------------------------------------

/// Skills present at startup.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SkillsConfig {
    /// Skill names, each seeded at level 1 with 0 XP.
    #[serde(default = "default_initial_skills")]
    pub initial: Vec<String>,
}

impl Default for SkillsConfig {
    fn default() -> Self {
        Self {
            initial: default_initial_skills(),
        }
    }
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// Static per-skill tables of methods and tools, keyed by skill name.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct CatalogConfig {
    /// Catalog entries per skill.
    pub skills: BTreeMap<String, SkillCatalogConfig>,
}

impl CatalogConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        for (skill, entry) in &self.skills {
            for method in &entry.methods {
                if method.xp_per_action == 0
                    || method.action_duration_ms == 0
                    || method.required_level == 0
                {
                    return Err(invalid(format!(
                        "catalog.{skill}: method '{}' needs positive xp_per_action, \
                         action_duration_ms and required_level",
                        method.name
                    )));
                }
            }
            for tool in &entry.tools {
                if !tool.efficiency.is_finite() || tool.efficiency < 0.0 {
                    return Err(invalid(format!(
                        "catalog.{skill}: tool '{}' has invalid efficiency {}",
                        tool.name, tool.efficiency
                    )));
                }
                if tool.required_level == 0 {
                    return Err(invalid(format!(
                        "catalog.{skill}: tool '{}' needs required_level >= 1",
                        tool.name
                    )));
                }
            }
        }
        Ok(())
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        let woodcutting = SkillCatalogConfig {
            methods: vec![
                MethodConfig::new("Tree", 10, 10_000, 1),
                MethodConfig::new("Oak Tree", 15, 10_000, 5),
                MethodConfig::new("Willow Tree", 30, 15_000, 20),
            ],
            tools: vec![
                ToolConfig::new("Bronze Axe", 1.0, 1),
                ToolConfig::new("Iron Axe", 1.05, 5),
                ToolConfig::new("Steel Axe", 1.1, 15),
                ToolConfig::new("Mithril Axe", 1.15, 25),
                ToolConfig::new("Adamant Axe", 1.2, 40),
                ToolConfig::new("Rune Axe", 1.3, 60),
                ToolConfig::new("Dragon Axe", 1.5, 80),
            ],
        };
        let mut skills = BTreeMap::new();
        skills.insert(String::from("Woodcutting"), woodcutting);
        Self { skills }
    }
}

/// Methods and tools of one skill.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SkillCatalogConfig {
    /// Training methods in catalog order.
    #[serde(default)]
    pub methods: Vec<MethodConfig>,

    /// Tools in catalog order.
    #[serde(default)]
    pub tools: Vec<ToolConfig>,
}

/// One training method row.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MethodConfig {
    /// Display name.
    pub name: String,
    /// XP per completed action.
    pub xp_per_action: u32,
    /// Action duration in milliseconds.
    pub action_duration_ms: u64,
    /// Level needed to use the method.
    #[serde(default = "default_required_level")]
    pub required_level: u32,
}

impl MethodConfig {
    fn new(name: &str, xp_per_action: u32, action_duration_ms: u64, required_level: u32) -> Self {
        Self {
            name: name.to_owned(),
            xp_per_action,
            action_duration_ms,
            required_level,
        }
    }
}

/// One tool row.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ToolConfig {
    /// Display name.
    pub name: String,
    /// XP multiplier.
    #[serde(default = "default_efficiency")]
    pub efficiency: f64,
    /// Level needed to equip the tool.
    #[serde(default = "default_required_level")]
    pub required_level: u32,
}

impl ToolConfig {
    fn new(name: &str, efficiency: f64, required_level: u32) -> Self {
        Self {
            name: name.to_owned(),
            efficiency,
            required_level,
        }
    }
}

// ---------------------------------------------------------------------------
// Prestige
// ---------------------------------------------------------------------------

/// Prestige tiers keyed by prestige level.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct PrestigeConfig {
    /// Tier configuration per prestige level.
    pub tiers: BTreeMap<u32, PrestigeLevelConfig>,
}

impl PrestigeConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if let Some((level, _)) = self.tiers.iter().find(|(_, t)| t.required_level == 0) {
            return Err(invalid(format!(
                "prestige.{level}: required_level must be at least 1"
            )));
        }
        Ok(())
    }
}

impl Default for PrestigeConfig {
    fn default() -> Self {
        let names = |list: &[&str]| list.iter().map(|s| (*s).to_owned()).collect::<Vec<_>>();
        let mut tiers = BTreeMap::new();
        tiers.insert(
            0,
            PrestigeLevelConfig::new(names(&["Woodcutting", "Mining", "Fishing"])),
        );
        tiers.insert(
            1,
            PrestigeLevelConfig::new(names(&[
                "Woodcutting",
                "Mining",
                "Fishing",
                "Firemaking",
                "Smelting",
                "Cooking",
            ])),
        );
        Self { tiers }
    }
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

/// Output format of the log subscriber.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (trace, debug, info, warn, error) used when
    /// `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format.
    #[serde(default)]
    pub format: LogFormat,
}

impl LoggingConfig {
    /// Apply `IDLESKILLS_LOG_LEVEL` and `IDLESKILLS_LOG_FORMAT` overrides.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(level) = std::env::var("IDLESKILLS_LOG_LEVEL") {
            self.level = level;
        }
        if let Ok(format) = std::env::var("IDLESKILLS_LOG_FORMAT") {
            match format.to_ascii_lowercase().as_str() {
                "json" => self.format = LogFormat::Json,
                "pretty" => self.format = LogFormat::Pretty,
                _ => {}
            }
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::Pretty,
        }
    }
}

// ---------------------------------------------------------------------------
// Autoplay
// ---------------------------------------------------------------------------

/// Settings for the headless driver binary.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AutoplayConfig {
    /// Skill selected at startup; `None` leaves the engine idle.
    #[serde(default = "default_autoplay_skill")]
    pub skill: Option<String>,

    /// Prestige automatically as soon as the requirements are met.
    #[serde(default)]
    pub auto_prestige: bool,

    /// Interval between status reports in milliseconds.
    #[serde(default = "default_report_interval_ms")]
    pub report_interval_ms: u64,

    /// Stop after this many seconds (0 = run until interrupted).
    #[serde(default)]
    pub run_seconds: u64,
}

impl Default for AutoplayConfig {
    fn default() -> Self {
        Self {
            skill: default_autoplay_skill(),
            auto_prestige: false,
            report_interval_ms: default_report_interval_ms(),
            run_seconds: 0,
        }
    }
}

// ---------------------------------------------------------------------------
// Default value functions (used by serde)
// ---------------------------------------------------------------------------

const fn default_base_xp() -> u64 {
    10
}

const fn default_scaling_factor() -> f64 {
    1.1
}

const fn default_progress_interval_ms() -> u64 {
    100
}

const fn default_basic_xp_per_action() -> u32 {
    1
}

const fn default_basic_action_duration_ms() -> u64 {
    1000
}

fn default_initial_skills() -> Vec<String> {
    [
        "Woodcutting",
        "Firemaking",
        "Mining",
        "Smithing",
        "Smelting",
        "Fishing",
        "Cooking",
    ]
    .iter()
    .map(|s| (*s).to_owned())
    .collect()
}

const fn default_required_level() -> u32 {
    1
}

const fn default_efficiency() -> f64 {
    1.0
}

fn default_log_level() -> String {
    String::from("info")
}

#[allow(clippy::unnecessary_wraps)]
fn default_autoplay_skill() -> Option<String> {
    Some(String::from("Woodcutting"))
}

const fn default_report_interval_ms() -> u64 {
    5000
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = GameConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.level_curve.base_xp, 10);
        assert_eq!(config.training.progress_interval_ms, 100);
        assert_eq!(config.skills.initial.len(), 7);
        assert_eq!(config.prestige.tiers.len(), 2);
        assert_eq!(
            config.catalog.skills.get("Woodcutting").map(|c| c.tools.len()),
            Some(7)
        );
    }

    #[test]
    fn parse_full_yaml() {
        let yaml = r#"
level_curve:
  base_xp: 20
  scaling_factor: 1.25

training:
  progress_interval_ms: 50
  basic_xp_per_action: 2
  basic_action_duration_ms: 500

skills:
  initial:
    - Mining
    - Fishing

catalog:
  Mining:
    methods:
      - name: Copper Rock
        xp_per_action: 5
        action_duration_ms: 3000
      - name: Iron Rock
        xp_per_action: 20
        action_duration_ms: 6000
        required_level: 15
    tools:
      - name: Bronze Pickaxe
      - name: Iron Pickaxe
        efficiency: 1.1
        required_level: 10

prestige:
  0:
    visible_skills: [Mining]
    required_level: 50
  1:
    visible_skills: [Mining, Fishing]
    required_skills: [Fishing]

logging:
  level: debug
  format: json

autoplay:
  skill: Mining
  auto_prestige: true
  report_interval_ms: 1000
  run_seconds: 30
"#;

        let config = GameConfig::parse(yaml).unwrap();

        assert_eq!(config.level_curve.base_xp, 20);
        assert_eq!(config.training.progress_interval(), Duration::from_millis(50));
        assert_eq!(config.skills.initial, vec!["Mining", "Fishing"]);

        let mining = config.catalog.skills.get("Mining").unwrap();
        assert_eq!(mining.methods.len(), 2);
        assert_eq!(mining.methods.first().map(|m| m.required_level), Some(1));
        assert_eq!(mining.tools.first().map(|t| t.required_level), Some(1));
        assert!(!config.catalog.skills.contains_key("Woodcutting"));

        let tier0 = config.prestige.tiers.get(&0).unwrap();
        assert_eq!(tier0.required_level, 50);
        assert_eq!(tier0.required_skills(), ["Mining"]);
        let tier1 = config.prestige.tiers.get(&1).unwrap();
        assert_eq!(tier1.required_level, 99);
        assert_eq!(tier1.required_skills(), ["Fishing"]);

        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.autoplay.skill.as_deref(), Some("Mining"));
        assert!(config.autoplay.auto_prestige);
        assert_eq!(config.autoplay.run_seconds, 30);
    }

    #[test]
    fn parse_minimal_yaml() {
        let yaml = "level_curve:\n  base_xp: 7\n";
        let config = GameConfig::parse(yaml).unwrap();

        // Base XP is overridden
        assert_eq!(config.level_curve.base_xp, 7);
        // Everything else uses defaults
        assert_eq!(config.training.progress_interval_ms, 100);
        assert_eq!(config.prestige.tiers.len(), 2);
        assert_eq!(config.autoplay.skill.as_deref(), Some("Woodcutting"));
    }

    #[test]
    fn parse_empty_yaml() {
        let config = GameConfig::parse("");
        assert!(config.is_ok());
    }

    #[test]
    fn rejects_flat_curve() {
        let err = GameConfig::parse("level_curve:\n  scaling_factor: 0.9\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn rejects_zero_base_xp() {
        let err = GameConfig::parse("level_curve:\n  base_xp: 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn rejects_zero_duration_method() {
        let yaml = r"
catalog:
  Fishing:
    methods:
      - name: Shrimp
        xp_per_action: 10
        action_duration_ms: 0
";
        let err = GameConfig::parse(yaml).unwrap_err();
        assert!(err.to_string().contains("Shrimp"));
    }

    #[test]
    fn rejects_negative_efficiency() {
        let yaml = r"
catalog:
  Fishing:
    tools:
      - name: Broken Rod
        efficiency: -1.0
";
        assert!(GameConfig::parse(yaml).is_err());
    }

    #[test]
    fn rejects_zero_progress_interval() {
        assert!(GameConfig::parse("training:\n  progress_interval_ms: 0\n").is_err());
    }

    #[test]
    fn basic_method_targets_skill() {
        let method = TrainingConfig::default().basic_method("Cooking");
        assert_eq!(method.skill_name, "Cooking");
        assert_eq!(method.xp_per_action, 1);
        assert_eq!(method.action_duration_ms, 1000);
    }

    #[test]
    fn invalid_yaml_is_a_parse_error() {
        let err = GameConfig::parse("level_curve: [").unwrap_err();
        assert!(matches!(err, ConfigError::Yaml { .. }));
    }

    #[test]
    fn load_project_config_file() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("..")
            .join("..")
            .join("idleskills-config.yaml");
        if path.exists() {
            let config = GameConfig::from_file(&path);
            assert!(config.is_ok(), "Failed to load project config: {config:?}");
        }
    }
}
