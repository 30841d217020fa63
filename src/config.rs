//! Configuration loading, defaults and validation for bt-autolock.

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use anyhow::Result;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::domain::AddressError;
use crate::domain::DeviceAddress;
use crate::idle::IdlePolicy;

/// Main configuration for bt-autolock, as read from the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Idle time in seconds before locking (default: 30).
    pub idle_time_seconds: u64,

    /// Lock command, tokenized shell-style (default: "i3lock").
    pub lock_command: String,

    /// Bluetooth address of the companion device.
    /// If unset, proximity checking is disabled.
    pub mac_address: Option<String>,

    /// Bluetooth adapter the companion is paired on (default: "hci0").
    pub adapter: String,

    /// How raw idle samples are turned into remaining idle time.
    pub idle_policy: IdlePolicy,

    /// Grace period between the warning notification and locking (default: 5).
    pub warning_seconds: u64,

    /// Pause after invoking the lock command (default: 5).
    pub debounce_seconds: u64,

    /// Backoff after a failed idle query, in milliseconds (default: 1000).
    pub idle_retry_millis: u64,

    /// Dry run mode: log the lock command instead of executing it.
    pub dry_run: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            idle_time_seconds: 30,
            lock_command: "i3lock".to_string(),
            mac_address: None,
            adapter: "hci0".to_string(),
            idle_policy: IdlePolicy::default(),
            warning_seconds: 5,
            debounce_seconds: 5,
            idle_retry_millis: 1000,
            dry_run: false,
        }
    }
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// Load configuration from the default path, or return defaults if not found.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        if let Some(p) = path {
            return Self::load(p);
        }

        if let Some(config_dir) = dirs::config_dir() {
            let default_path = config_dir.join("bt-autolock").join("config.toml");
            if default_path.exists() {
                return Self::load(&default_path);
            }
        }

        Ok(Self::default())
    }
}

/// Errors found while validating a [`Config`].
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Idle time must be greater than zero")]
    ZeroIdleTime,

    #[error("Warning time must be greater than zero")]
    ZeroWarningTime,

    #[error("Invalid lockapp: {0:?}")]
    InvalidLockCommand(String),

    #[error(transparent)]
    InvalidAddress(#[from] AddressError),
}

/// Validated settings the decision loop runs with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Idle time after which the session counts as idle.
    pub max_idle: Duration,
    /// Lock command as program followed by its arguments.
    pub lock_command: Vec<String>,
    /// Bluetooth companion whose presence prevents locking, if any.
    pub companion: Option<DeviceAddress>,
    /// Bluetooth adapter the companion is paired with, e.g. `hci0`.
    pub adapter: String,
    /// How idle samples are turned into remaining idle time.
    pub idle_policy: IdlePolicy,
    pub timings: Timings,
    /// Log the lock command instead of running it.
    pub dry_run: bool,
}

/// Fixed delays used by the decision loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timings {
    /// Grace period after the warning notification.
    pub warning: Duration,
    /// Pause after the lock command returns.
    pub debounce: Duration,
    /// Backoff after a failed idle query.
    pub idle_retry: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            warning: Duration::from_secs(5),
            debounce: Duration::from_secs(5),
            idle_retry: Duration::from_millis(1000),
        }
    }
}

impl Settings {
    /// Validate a config into settings.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        if config.idle_time_seconds == 0 {
            return Err(ConfigError::ZeroIdleTime);
        }
        if config.warning_seconds == 0 {
            return Err(ConfigError::ZeroWarningTime);
        }

        let lock_command = tokenize_command(&config.lock_command)?;

        let companion = config
            .mac_address
            .as_deref()
            .filter(|addr| !addr.trim().is_empty())
            .map(DeviceAddress::parse)
            .transpose()?;

        Ok(Self {
            max_idle: Duration::from_secs(config.idle_time_seconds),
            lock_command,
            companion,
            adapter: config.adapter.clone(),
            idle_policy: config.idle_policy,
            timings: Timings {
                warning: Duration::from_secs(config.warning_seconds),
                debounce: Duration::from_secs(config.debounce_seconds),
                idle_retry: Duration::from_millis(config.idle_retry_millis),
            },
            dry_run: config.dry_run,
        })
    }
}

/// Split a lock command shell-style, rejecting unbalanced quoting and empty commands.
fn tokenize_command(command: &str) -> Result<Vec<String>, ConfigError> {
    match shlex::split(command) {
        Some(tokens) if !tokens.is_empty() => Ok(tokens),
        _ => Err(ConfigError::InvalidLockCommand(command.to_string())),
    }
}
