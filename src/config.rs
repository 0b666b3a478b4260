use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::solver::SolveLimits;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub optimization: OptimizationConfig,
    #[serde(default)]
    pub solver: SolverConfig,
    #[serde(default)]
    pub engine: EngineConfig,
}

/// Objective weights and structural limits for one model build.
///
/// A weight of `None` (or `0`) switches its objective term off entirely.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OptimizationConfig {
    #[serde(default = "default_preference_weight")]
    pub preference_weight: f64,
    #[serde(default = "default_cabins_weight")]
    pub cabins_weight: Option<f64>,
    #[serde(default = "default_sparsity_weight")]
    pub sparsity_weight: Option<f64>,
    #[serde(default)]
    pub max_seatrades_per_fleet: Option<u32>,
    #[serde(default = "default_max_campers_per_cabin_instance")]
    pub max_campers_per_cabin_instance: u32,
    #[serde(default = "default_top_choice_guarantee")]
    pub top_choice_guarantee: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SolverConfig {
    #[serde(default = "default_time_limit_secs")]
    pub time_limit_secs: u64,
    #[serde(default = "default_relative_gap")]
    pub relative_gap: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EngineConfig {
    #[serde(default = "default_log_path")]
    pub log_path: String,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConfigError {
    #[error("{name} must be a finite, non-negative number (got {value})")]
    NegativeWeight { name: &'static str, value: f64 },
    #[error("relative_gap must be within [0, 1] (got {0})")]
    GapOutOfRange(f64),
    #[error("time_limit_secs must be greater than zero")]
    ZeroTimeLimit,
    #[error("poll_interval_ms must be greater than zero")]
    ZeroPollInterval,
    #[error("max_campers_per_cabin_instance must be greater than zero")]
    ZeroCabinCap,
}

#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub preference_weight: Option<f64>,
    pub cabins_weight: Option<f64>,
    pub sparsity_weight: Option<f64>,
    pub max_seatrades_per_fleet: Option<u32>,
    pub time_limit_secs: Option<u64>,
    pub relative_gap: Option<f64>,
    pub log_path: Option<String>,
}

impl Config {
    pub fn default_path() -> PathBuf {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        home.join(".config/seatrade-scheduler/config.toml")
    }

    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path
            .map(|p| p.to_path_buf())
            .unwrap_or_else(Self::default_path);
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = fs::read_to_string(&path)
            .with_context(|| format!("failed reading config: {}", path.display()))?;
        let parsed: Self = toml::from_str(&data)
            .with_context(|| format!("failed parsing TOML config: {}", path.display()))?;
        Ok(parsed)
    }

    pub fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(weight) = overrides.preference_weight {
            self.optimization.preference_weight = weight;
        }
        if let Some(weight) = overrides.cabins_weight {
            self.optimization.cabins_weight = Some(weight);
        }
        if let Some(weight) = overrides.sparsity_weight {
            self.optimization.sparsity_weight = Some(weight);
        }
        if let Some(cap) = overrides.max_seatrades_per_fleet {
            self.optimization.max_seatrades_per_fleet = Some(cap);
        }
        if let Some(secs) = overrides.time_limit_secs {
            self.solver.time_limit_secs = secs;
        }
        if let Some(gap) = overrides.relative_gap {
            self.solver.relative_gap = gap;
        }
        if let Some(path) = overrides.log_path {
            self.engine.log_path = path;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.optimization.validate()?;
        self.solver.validate()?;
        if self.engine.poll_interval_ms == 0 {
            return Err(ConfigError::ZeroPollInterval);
        }
        Ok(())
    }

    pub fn write_template(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed creating config directory: {}", parent.display())
            })?;
        }
        fs::write(path, Self::default_template())
            .with_context(|| format!("failed writing config template: {}", path.display()))
    }

    pub fn resolved_log_path(&self) -> PathBuf {
        expand_tilde(&self.engine.log_path)
    }

    pub fn default_template() -> String {
        let template = r#"[optimization]
preference_weight = 3.0
cabins_weight = 2.0
sparsity_weight = 1.0
# max_seatrades_per_fleet = 6
max_campers_per_cabin_instance = 4
top_choice_guarantee = 2

[solver]
time_limit_secs = 60
relative_gap = 0.1

[engine]
log_path = "seatrades_assignment.log"
poll_interval_ms = 1000
"#;
        template.to_string()
    }
}

impl OptimizationConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_weight("preference_weight", Some(self.preference_weight))?;
        check_weight("cabins_weight", self.cabins_weight)?;
        check_weight("sparsity_weight", self.sparsity_weight)?;
        if self.max_campers_per_cabin_instance == 0 {
            return Err(ConfigError::ZeroCabinCap);
        }
        Ok(())
    }

    pub fn cohesion_enabled(&self) -> bool {
        self.cabins_weight.is_some_and(|w| w > 0.0)
    }

    pub fn sparsity_enabled(&self) -> bool {
        self.sparsity_weight.is_some_and(|w| w > 0.0)
    }
}

impl SolverConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.time_limit_secs == 0 {
            return Err(ConfigError::ZeroTimeLimit);
        }
        if !(0.0..=1.0).contains(&self.relative_gap) {
            return Err(ConfigError::GapOutOfRange(self.relative_gap));
        }
        Ok(())
    }

    pub fn limits(&self) -> SolveLimits {
        SolveLimits {
            time_limit: Duration::from_secs(self.time_limit_secs),
            relative_gap: self.relative_gap,
        }
    }
}

impl EngineConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

fn check_weight(name: &'static str, value: Option<f64>) -> Result<(), ConfigError> {
    match value {
        Some(v) if !v.is_finite() || v < 0.0 => Err(ConfigError::NegativeWeight { name, value: v }),
        _ => Ok(()),
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

impl Default for OptimizationConfig {
    fn default() -> Self {
        Self {
            preference_weight: default_preference_weight(),
            cabins_weight: default_cabins_weight(),
            sparsity_weight: default_sparsity_weight(),
            max_seatrades_per_fleet: None,
            max_campers_per_cabin_instance: default_max_campers_per_cabin_instance(),
            top_choice_guarantee: default_top_choice_guarantee(),
        }
    }
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            time_limit_secs: default_time_limit_secs(),
            relative_gap: default_relative_gap(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            log_path: default_log_path(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

fn default_preference_weight() -> f64 {
    3.0
}

fn default_cabins_weight() -> Option<f64> {
    Some(2.0)
}

fn default_sparsity_weight() -> Option<f64> {
    Some(1.0)
}

fn default_max_campers_per_cabin_instance() -> u32 {
    4
}

fn default_top_choice_guarantee() -> usize {
    2
}

fn default_time_limit_secs() -> u64 {
    60
}

fn default_relative_gap() -> f64 {
    0.1
}

fn default_log_path() -> String {
    "seatrades_assignment.log".to_string()
}

fn default_poll_interval_ms() -> u64 {
    1000
}
