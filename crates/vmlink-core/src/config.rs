//! Configuration system for vmlink.
//!
//! Resolution order: environment variables → config file → defaults.
//!
//! Config file location:
//!   1. $VMLINK_CONFIG (explicit override)
//!   2. $XDG_CONFIG_HOME/vmlink/config.toml
//!   3. ~/.config/vmlink/config.toml

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VmlinkConfig {
    pub network: NetworkConfig,
    pub registry: RegistryConfig,
    pub discovery: DiscoveryConfig,
    pub maintenance: MaintenanceConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Interface the fast path is attached to.
    pub interface: String,
    /// Local HTTP API port.
    pub api_port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Number of bucket chains in each index. 0 is treated as 1.
    pub buckets: usize,
    /// Maximum live entries. Inserts beyond this fail with ResourceExhausted.
    pub max_entries: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Expected period between discovery rounds.
    pub interval_ms: u64,
    /// Rounds without a refresh before an entry counts as stale.
    pub timeout_rounds: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MaintenanceConfig {
    /// Period of the timeout sweep + reap loop.
    pub sweep_interval_ms: u64,
    /// How long a migration freeze waits for suspended entries to clear.
    pub freeze_timeout_ms: u64,
}

// ── Defaults ──────────────────────────────────────────────────────────────────

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            interface: "eth0".to_string(),
            api_port: 9101,
        }
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            buckets: 13,
            max_entries: 1024,
        }
    }
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            interval_ms: 1000,
            timeout_rounds: 5,
        }
    }
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            sweep_interval_ms: 1000,
            freeze_timeout_ms: 5000,
        }
    }
}

impl DiscoveryConfig {
    /// Age after which an unrefreshed entry is considered stale.
    pub fn staleness_threshold(&self) -> Duration {
        Duration::from_millis(self.interval_ms.saturating_mul(self.timeout_rounds as u64))
    }
}

impl MaintenanceConfig {
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms.max(1))
    }

    pub fn freeze_timeout(&self) -> Duration {
        Duration::from_millis(self.freeze_timeout_ms)
    }
}

// ── Path helpers ──────────────────────────────────────────────────────────────

fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".config"))
        .join("vmlink")
}

fn dirs_or_home() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),
    #[error("failed to write {0}: {1}")]
    WriteFailed(PathBuf, std::io::Error),
    #[error("failed to serialize: {0}")]
    SerializeFailed(toml::ser::Error),
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl VmlinkConfig {
    /// Load config: env vars → file → defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::file_path();
        let mut config = if path.exists() {
            Self::from_file(&path)?
        } else {
            VmlinkConfig::default()
        };
        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Parse a config file without applying env overrides.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadFailed(path.to_path_buf(), e))?;
        toml::from_str(&text).map_err(|e| ConfigError::ParseFailed(path.to_path_buf(), e))
    }

    /// Config file path.
    pub fn file_path() -> PathBuf {
        std::env::var("VMLINK_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir().join("config.toml"))
    }

    /// Write default config if none exists. Returns the path.
    pub fn write_default_if_missing() -> Result<PathBuf, ConfigError> {
        let path = Self::file_path();
        if !path.exists() {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
            }
            let text = toml::to_string_pretty(&VmlinkConfig::default())
                .map_err(ConfigError::SerializeFailed)?;
            std::fs::write(&path, text).map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
        }
        Ok(path)
    }

    /// Apply VMLINK_* overrides. `lookup` is the env source, injected so
    /// tests do not have to mutate process state.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("VMLINK_NETWORK__INTERFACE") {
            self.network.interface = v;
        }
        if let Some(p) = lookup("VMLINK_NETWORK__API_PORT").and_then(|v| v.parse().ok()) {
            self.network.api_port = p;
        }
        if let Some(n) = lookup("VMLINK_REGISTRY__BUCKETS").and_then(|v| v.parse().ok()) {
            self.registry.buckets = n;
        }
        if let Some(n) = lookup("VMLINK_REGISTRY__MAX_ENTRIES").and_then(|v| v.parse().ok()) {
            self.registry.max_entries = n;
        }
        if let Some(ms) = lookup("VMLINK_DISCOVERY__INTERVAL_MS").and_then(|v| v.parse().ok()) {
            self.discovery.interval_ms = ms;
        }
        if let Some(ms) =
            lookup("VMLINK_MAINTENANCE__SWEEP_INTERVAL_MS").and_then(|v| v.parse().ok())
        {
            self.maintenance.sweep_interval_ms = ms;
        }
    }
}
