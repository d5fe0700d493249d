use eyre::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use bulkrun::runner::RunConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub log_level: Option<String>,
    pub engine: EngineConfig,
    pub command: CommandConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub per_item_timeout_ms: u64,
    pub inter_item_delay_ms: u64,
    pub default_item_estimate_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let run = RunConfig::default();
        Self {
            max_retries: run.max_retries,
            base_delay_ms: millis(run.base_delay),
            per_item_timeout_ms: millis(run.per_item_timeout),
            inter_item_delay_ms: millis(run.inter_item_delay),
            default_item_estimate_ms: millis(run.default_item_estimate),
        }
    }
}

impl EngineConfig {
    pub fn to_run_config(&self) -> RunConfig {
        RunConfig::default()
            .with_max_retries(self.max_retries)
            .with_base_delay(Duration::from_millis(self.base_delay_ms))
            .with_timeout(Duration::from_millis(self.per_item_timeout_ms))
            .with_inter_item_delay(Duration::from_millis(self.inter_item_delay_ms))
            .with_default_item_estimate(Duration::from_millis(self.default_item_estimate_ms))
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandConfig {
    /// Exit codes that mark an item failed without retrying
    pub terminal_exit_codes: Vec<i32>,
    pub working_dir: Option<PathBuf>,
    /// Top-level fields every record must carry
    pub required_fields: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: Some("info".to_string()),
            engine: EngineConfig::default(),
            command: CommandConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try primary location: ~/.config/<project>/<project>.yml
        if let Some(config_dir) = dirs::config_dir() {
            let project_name = env!("CARGO_PKG_NAME");
            let primary_config = config_dir.join(project_name).join(format!("{}.yml", project_name));
            if primary_config.exists() {
                match Self::load_from_file(&primary_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        log::warn!("Failed to load config from {}: {}", primary_config.display(), e);
                    }
                }
            }
        }

        // Try fallback location: ./<project>.yml
        let project_name = env!("CARGO_PKG_NAME");
        let fallback_config = PathBuf::from(format!("{}.yml", project_name));
        if fallback_config.exists() {
            match Self::load_from_file(&fallback_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    log::warn!("Failed to load config from {}: {}", fallback_config.display(), e);
                }
            }
        }

        // No config file found, use defaults
        log::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;
        config.validate()?;

        log::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    /// Default log filter: `--verbose` wins, then `log_level`, then info.
    /// `RUST_LOG` still overrides whatever this returns.
    pub fn log_filter(&self, verbose: bool) -> String {
        if verbose {
            return "debug".to_string();
        }
        self.log_level.clone().unwrap_or_else(|| "info".to_string())
    }

    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.engine.per_item_timeout_ms == 0 {
            bail!("engine.per_item_timeout_ms must be greater than zero");
        }
        if let Some(level) = self
            .log_level
            .as_deref()
            .filter(|level| level.parse::<log::LevelFilter>().is_err())
        {
            bail!("log_level '{}' is not a log level (off, error, warn, info, debug, trace)", level);
        }
        if self.command.required_fields.iter().any(|f| f.trim().is_empty()) {
            bail!("command.required_fields must not contain blank names");
        }
        Ok(())
    }
}
