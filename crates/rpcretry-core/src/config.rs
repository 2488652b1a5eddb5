use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::retry::{BackoffConfigError, ExponentialBackoff, FixedBackoff, RetryPolicy};

/// Backoff section of `config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "lowercase")]
pub enum BackoffSettings {
    /// Same wait between every attempt.
    Fixed { interval_ms: u64 },
    /// Growing wait, capped at `max_interval_ms`.
    Exponential {
        initial_interval_ms: u64,
        multiplier: f64,
        max_interval_ms: u64,
        /// Total time budget for retries; absent or 0 means no limit.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_elapsed_ms: Option<u64>,
        #[serde(default)]
        randomization_factor: f64,
    },
}

impl BackoffSettings {
    /// Exponential settings with the built-in defaults (500ms, x1.5, 15s cap).
    pub fn exponential() -> Self {
        let d = ExponentialBackoff::default();
        BackoffSettings::Exponential {
            initial_interval_ms: d.initial_interval().as_millis() as u64,
            multiplier: d.multiplier(),
            max_interval_ms: d.max_interval().as_millis() as u64,
            max_elapsed_ms: None,
            randomization_factor: d.randomization_factor(),
        }
    }
}

impl Default for BackoffSettings {
    fn default() -> Self {
        BackoffSettings::Fixed {
            interval_ms: FixedBackoff::DEFAULT_INTERVAL.as_millis() as u64,
        }
    }
}

/// Retry settings loaded from `~/.config/rpcretry/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrySettings {
    /// Maximum attempts per call including the first; `<= 0` retries without bound.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: i64,
    #[serde(default)]
    pub backoff: BackoffSettings,
}

fn default_max_attempts() -> i64 {
    i64::from(RetryPolicy::DEFAULT_MAX_ATTEMPTS)
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff: BackoffSettings::default(),
        }
    }
}

/// Settings that cannot be turned into a [`RetryPolicy`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid backoff settings: {0}")]
    Backoff(#[from] BackoffConfigError),
}

impl RetrySettings {
    /// Build a policy using the default classifier.
    pub fn into_policy(self) -> Result<RetryPolicy, ConfigError> {
        let builder = RetryPolicy::builder().max_attempts(self.max_attempts);
        let builder = match self.backoff {
            BackoffSettings::Fixed { interval_ms } => {
                builder.backoff(FixedBackoff::new(Duration::from_millis(interval_ms)))
            }
            BackoffSettings::Exponential {
                initial_interval_ms,
                multiplier,
                max_interval_ms,
                max_elapsed_ms,
                randomization_factor,
            } => {
                let exp = ExponentialBackoff::new(
                    Duration::from_millis(initial_interval_ms),
                    multiplier,
                    Duration::from_millis(max_interval_ms),
                )?
                .with_max_elapsed_time(max_elapsed_ms.map(Duration::from_millis))
                .with_randomization_factor(randomization_factor)?;
                builder.backoff(exp)
            }
        };
        Ok(builder.build())
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("rpcretry")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load settings from an explicit file.
pub fn load_from(path: &Path) -> Result<RetrySettings> {
    let data = fs::read_to_string(path)?;
    let settings: RetrySettings = toml::from_str(&data)?;
    Ok(settings)
}

/// Load settings from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<RetrySettings> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = RetrySettings::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }
    load_from(&path)
}
