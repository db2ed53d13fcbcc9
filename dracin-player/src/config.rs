//! Configuration management for dracin-player
//!
//! Bootstrap configuration comes from an optional TOML file:
//! - `[backend]`: where the catalog/progress API lives
//! - `[player]`: timing and input tuning (defaults are the shipped behavior)
//! - `[logging]`: fallback log filter when `RUST_LOG` is unset
//!
//! # Settings Sources Priority
//!
//! 1. Command-line arguments (--base-url)
//! 2. Environment variables (DRACIN_API_URL, DRACIN_CONFIG)
//! 3. TOML configuration file
//! 4. Built-in defaults (code constants)

use crate::error::{Error, Result};
use dracin_common::time::secs_to_duration;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// Bootstrap configuration loaded from TOML file
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlConfig {
    #[serde(default)]
    pub backend: BackendConfig,

    #[serde(default)]
    pub player: PlayerSettings,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Catalog/progress backend location
#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
    /// Base URL of the web backend (no trailing `/api`)
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl BackendConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error) or a full filter directive
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl LoggingConfig {
    /// `EnvFilter` directive for the player's own crates; a level that is
    /// already a directive passes through untouched
    pub fn filter_directive(&self) -> String {
        if self.level.contains('=') || self.level.contains(',') {
            self.level.clone()
        } else {
            format!("dracin_player={level},dracin_common={level}", level = self.level)
        }
    }
}

/// Player timing and input tuning
///
/// The defaults are the player's fixed behavior; they are exposed only so a
/// deployment can tune them without a rebuild.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PlayerSettings {
    /// Periodic progress sync interval while playing
    pub sync_interval_secs: f64,
    /// Non-forced syncs closer than this to the last synced position are skipped
    pub sync_debounce_secs: f64,
    /// Auto-advance countdown length
    pub auto_advance_secs: u32,
    /// Controls hide after this long without pointer movement while playing
    pub controls_hide_secs: f64,
    /// Seek distance for arrows, J/L and double-tap
    pub seek_step_secs: f64,
    /// Seek distance for `,` and `.`
    pub fine_seek_step_secs: f64,
    /// Volume change for up/down arrows
    pub volume_step: f64,
    /// Second tap must land within this window to count as a double-tap
    pub double_tap_window_ms: u64,
    /// Second tap must land within this horizontal distance (px)
    pub double_tap_max_dx: f64,
    /// Broadcast capacity of the per-session event bus
    pub event_capacity: usize,
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            sync_interval_secs: 10.0,
            sync_debounce_secs: 5.0,
            auto_advance_secs: 5,
            controls_hide_secs: 3.0,
            seek_step_secs: 10.0,
            fine_seek_step_secs: 5.0,
            volume_step: 0.1,
            double_tap_window_ms: 300,
            double_tap_max_dx: 50.0,
            event_capacity: 256,
        }
    }
}

impl PlayerSettings {
    pub fn sync_interval(&self) -> Duration {
        secs_to_duration(self.sync_interval_secs)
    }

    pub fn controls_hide_delay(&self) -> Duration {
        secs_to_duration(self.controls_hide_secs)
    }

    pub fn double_tap_window(&self) -> Duration {
        Duration::from_millis(self.double_tap_window_ms)
    }

    /// Reject settings that would stall timers or invert input
    pub fn validate(&self) -> Result<()> {
        if !(self.sync_interval_secs > 0.0) {
            return Err(Error::Config(format!(
                "player.sync_interval_secs must be positive, got {}",
                self.sync_interval_secs
            )));
        }
        if !(self.sync_debounce_secs >= 0.0) {
            return Err(Error::Config(format!(
                "player.sync_debounce_secs must not be negative, got {}",
                self.sync_debounce_secs
            )));
        }
        if self.auto_advance_secs == 0 {
            return Err(Error::Config(
                "player.auto_advance_secs must be at least 1".to_string(),
            ));
        }
        if !(self.controls_hide_secs > 0.0) {
            return Err(Error::Config(format!(
                "player.controls_hide_secs must be positive, got {}",
                self.controls_hide_secs
            )));
        }
        if self.event_capacity == 0 {
            return Err(Error::Config(
                "player.event_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_base_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_log_level() -> String {
    "info".to_string()
}

impl TomlConfig {
    /// Load configuration from an explicit TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let config: TomlConfig = dracin_common::config::load_toml(path)?;
        config.player.validate()?;
        info!("Loaded TOML configuration from {:?}", path);
        Ok(config)
    }

    /// Resolve the config file (CLI > env > per-user file) and load it,
    /// falling back to built-in defaults when no file applies
    pub fn resolve(cli_path: Option<&Path>) -> Result<Self> {
        match dracin_common::config::resolve_config_path(
            cli_path,
            dracin_common::config::CONFIG_ENV_VAR,
        ) {
            Some(path) => Self::load(&path),
            None => {
                info!("No configuration file found, using built-in defaults");
                Ok(Self::default())
            }
        }
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: TomlConfig = dracin_common::config::parse_toml(content)?;
        config.player.validate()?;
        Ok(config)
    }

    /// Apply command-line overrides
    pub fn with_overrides(mut self, overrides: ConfigOverrides) -> Self {
        if let Some(base_url) = overrides.base_url {
            self.backend.base_url = base_url;
        }
        if let Some(level) = overrides.log_level {
            self.logging.level = level;
        }
        self
    }
}

/// Command-line configuration overrides
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub base_url: Option<String>,
    pub log_level: Option<String>,
    pub config_path: Option<PathBuf>,
}
