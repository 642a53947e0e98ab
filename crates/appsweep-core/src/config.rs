use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::orchestrator::OrchestratorSettings;
use crate::retry::{BackoffPolicy, ConfigError};
use crate::transport::TransportSettings;

/// Backoff parameters for one phase (`[validation_retry]` / `[fetch_retry]`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts per id (including the first).
    pub max_attempts: u32,
    /// Delay before the second attempt, in seconds (e.g. 0.5 = 500ms).
    pub initial_delay_secs: f64,
    /// Growth factor per attempt; must be >= 1.
    pub multiplier: f64,
    /// Ceiling for any single delay, in seconds.
    pub max_delay_secs: u64,
}

impl RetryConfig {
    pub fn validation_default() -> Self {
        Self {
            max_attempts: 9,
            initial_delay_secs: 1.0,
            multiplier: 2.0,
            max_delay_secs: 60,
        }
    }

    pub fn fetch_default() -> Self {
        Self {
            max_attempts: 8,
            initial_delay_secs: 1.0,
            multiplier: 2.0,
            max_delay_secs: 120,
        }
    }

    pub fn to_policy(&self) -> Result<BackoffPolicy, ConfigError> {
        let initial = Duration::try_from_secs_f64(self.initial_delay_secs)
            .map_err(|_| ConfigError::InvalidDelay(self.initial_delay_secs))?;
        BackoffPolicy::new(
            self.max_attempts,
            initial,
            self.multiplier,
            Duration::from_secs(self.max_delay_secs),
        )
    }
}

fn default_validation_retry() -> RetryConfig {
    RetryConfig::validation_default()
}

fn default_fetch_retry() -> RetryConfig {
    RetryConfig::fetch_default()
}

/// Global configuration loaded from `~/.config/appsweep/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepConfig {
    #[serde(default = "default_validation_retry")]
    pub validation_retry: RetryConfig,
    #[serde(default = "default_fetch_retry")]
    pub fetch_retry: RetryConfig,
    /// Checkpoint after every N processed ids.
    pub checkpoint_interval: usize,
    /// Pause between ids, in milliseconds.
    pub request_delay_ms: u64,
    /// Timeout for a details request; existence checks use a shorter fixed one.
    pub request_timeout_secs: u64,
    /// Run the existence check before fetching details.
    pub validate_before_fetch: bool,
    /// Process only the first N pending ids.
    #[serde(default)]
    pub limit: Option<usize>,
    /// Where results, exports and checkpoints go. Defaults to the XDG state dir.
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
    pub app_list_url: String,
    pub app_details_url: String,
}

impl Default for SweepConfig {
    fn default() -> Self {
        let transport = TransportSettings::default();
        Self {
            validation_retry: RetryConfig::validation_default(),
            fetch_retry: RetryConfig::fetch_default(),
            checkpoint_interval: 100,
            request_delay_ms: 500,
            request_timeout_secs: 30,
            validate_before_fetch: true,
            limit: None,
            output_dir: None,
            app_list_url: transport.app_list_url,
            app_details_url: transport.app_details_url,
        }
    }
}

impl SweepConfig {
    pub fn orchestrator_settings(&self) -> Result<OrchestratorSettings, ConfigError> {
        if self.checkpoint_interval == 0 {
            return Err(ConfigError::ZeroCheckpointInterval);
        }
        Ok(OrchestratorSettings {
            validation: self.validation_retry.to_policy()?,
            fetch: self.fetch_retry.to_policy()?,
            checkpoint_interval: self.checkpoint_interval,
            request_delay: Duration::from_millis(self.request_delay_ms),
            validate_before_fetch: self.validate_before_fetch,
            limit: self.limit,
        })
    }

    pub fn transport_settings(&self) -> TransportSettings {
        TransportSettings {
            app_list_url: self.app_list_url.clone(),
            app_details_url: self.app_details_url.clone(),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            ..TransportSettings::default()
        }
    }

    /// Configured output dir, or `~/.local/state/appsweep`.
    pub fn output_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.output_dir {
            return Ok(dir.clone());
        }
        let xdg_dirs = xdg::BaseDirectories::with_prefix("appsweep")?;
        Ok(xdg_dirs.get_state_home().join("appsweep"))
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("appsweep")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<SweepConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = SweepConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }
    load_from_path(&path)
}

pub fn load_from_path(path: &Path) -> Result<SweepConfig> {
    let data = fs::read_to_string(path)?;
    let cfg: SweepConfig = toml::from_str(&data)?;
    Ok(cfg)
}
