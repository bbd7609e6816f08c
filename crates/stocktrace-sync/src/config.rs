//! # Sync Configuration
//!
//! Configuration for the reconciliation engine and scan queue.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                           │
//! │                                                                     │
//! │  1. Environment Variables (highest priority)                        │
//! │     STOCKTRACE_REMOTE_URL=https://remote.example.com                │
//! │     STOCKTRACE_DEVICE_ID=abc-123                                    │
//! │                                                                     │
//! │  2. TOML Config File                                                │
//! │     ~/.config/stocktrace/sync.toml (Linux)                          │
//! │     ~/Library/Application Support/com.stocktrace.app/sync.toml      │
//! │                                                                     │
//! │  3. Default Values (lowest priority)                                │
//! │     auto-generated device_id, no remote configured                  │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # sync.toml
//! [device]
//! id = "550e8400-e29b-41d4-a716-446655440000"
//! name = "Warehouse Scanner"
//!
//! [remote]
//! base_url = "https://remote.example.com"
//! api_key = "service-role-key"
//! timeout_secs = 10
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{SyncError, SyncResult};

// =============================================================================
// Device Configuration
// =============================================================================

/// Identity of this device, attached to queued scans.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Unique device identifier (UUID v4).
    /// Auto-generated on first run if not provided.
    pub id: String,

    /// Human-readable device name (e.g., "Warehouse Scanner").
    #[serde(default = "default_device_name")]
    pub name: String,
}

fn default_device_name() -> String {
    "Inventory Terminal".to_string()
}

impl Default for DeviceConfig {
    fn default() -> Self {
        DeviceConfig {
            id: Uuid::new_v4().to_string(),
            name: default_device_name(),
        }
    }
}

// =============================================================================
// Remote Settings
// =============================================================================

/// Remote store endpoint settings.
///
/// `base_url` unset means no remote is configured: sync cycles are
/// skipped entirely and the device runs pure-offline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Base URL of the remote store REST endpoint.
    #[serde(default)]
    pub base_url: Option<String>,

    /// API key sent with every remote request.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Per-call timeout (seconds).
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_timeout() -> u64 {
    10
}

impl Default for RemoteConfig {
    fn default() -> Self {
        RemoteConfig {
            base_url: None,
            api_key: None,
            timeout_secs: default_timeout(),
        }
    }
}

impl RemoteConfig {
    /// Per-call timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

// =============================================================================
// Root Configuration
// =============================================================================

/// Complete sync configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Device identity.
    #[serde(default)]
    pub device: DeviceConfig,

    /// Remote endpoint settings.
    #[serde(default)]
    pub remote: RemoteConfig,
}

impl SyncConfig {
    /// Loads configuration from file (or defaults), applies environment
    /// overrides, and validates.
    pub fn load(config_path: Option<PathBuf>) -> SyncResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading sync config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load sync config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> SyncResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| SyncError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| SyncError::ConfigSaveFailed(e.to_string()))?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents).map_err(|e| SyncError::ConfigSaveFailed(e.to_string()))?;

        info!(?path, "Sync config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> SyncResult<()> {
        if self.device.id.is_empty() {
            return Err(SyncError::InvalidConfig("Device ID must not be empty".into()));
        }

        if let Some(ref url) = self.remote.base_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(SyncError::InvalidConfig(format!(
                    "Remote URL must start with http:// or https://, got: {}",
                    url
                )));
            }
        }

        if self.remote.timeout_secs == 0 {
            return Err(SyncError::InvalidConfig(
                "Remote timeout must be at least 1 second".into(),
            ));
        }

        Ok(())
    }

    /// Returns true when a remote endpoint is configured.
    pub fn has_remote(&self) -> bool {
        self.remote.base_url.is_some()
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(id) = std::env::var("STOCKTRACE_DEVICE_ID") {
            debug!("Device ID overridden from environment");
            self.device.id = id;
        }
        if let Ok(url) = std::env::var("STOCKTRACE_REMOTE_URL") {
            debug!("Remote URL overridden from environment");
            self.remote.base_url = Some(url);
        }
        if let Ok(key) = std::env::var("STOCKTRACE_API_KEY") {
            self.remote.api_key = Some(key);
        }
    }

    /// Platform config file location:
    /// `<config dir>/stocktrace/sync.toml`.
    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "stocktrace", "app")
            .map(|dirs| dirs.config_dir().join("sync.toml"))
    }
}
