//! Configuration management for procond
//!
//! Loads and validates the JSON configuration file. The default location is
//! `~/.config/procond/config.json`; a missing file means defaults.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::connection::ConnectionSettings;
use crate::input::AnalogDpad;

// ============================================================================
// Constants
// ============================================================================

/// Default config directory name
const CONFIG_DIR: &str = "procond";

/// Default config file name
const CONFIG_FILE: &str = "config.json";

/// Accepted range for the discovery poll interval (ms)
const POLL_INTERVAL_RANGE: (u64, u64) = (100, 60_000);

/// Accepted range for the gesture hold time (ms)
const HOLD_RANGE: (u64, u64) = (250, 10_000);

/// Upper bound for the home light settle delay (ms)
const MAX_SETTLE_MS: u64 = 1_000;

// ============================================================================
// Sections
// ============================================================================

/// Device discovery settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// How often `/sys/class/hidraw` is rescanned for new controllers
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
}

fn default_poll_interval() -> u64 { 2_000 }

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval(),
        }
    }
}

/// Home button gesture settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GestureConfig {
    /// Hold time before a gesture fires
    #[serde(default = "default_hold")]
    pub hold_ms: u64,
}

fn default_hold() -> u64 { 2_000 }

impl Default for GestureConfig {
    fn default() -> Self {
        Self { hold_ms: default_hold() }
    }
}

/// Protocol timing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolConfig {
    /// Delay between a home light ack and the finalizing no-op
    #[serde(default = "default_settle")]
    pub settle_ms: u64,
}

fn default_settle() -> u64 { 50 }

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self { settle_ms: default_settle() }
    }
}

/// Input and force-feedback behaviour
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputConfig {
    /// D-pad policy for newly connected controllers
    #[serde(default)]
    pub analog_dpad: AnalogDpad,

    /// Forward rumble requests to the controller
    #[serde(default = "default_true")]
    pub rumble: bool,
}

fn default_true() -> bool { true }

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            analog_dpad: AnalogDpad::Off,
            rumble: true,
        }
    }
}

// ============================================================================
// Main Configuration
// ============================================================================

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub discovery: DiscoveryConfig,

    #[serde(default)]
    pub gesture: GestureConfig,

    #[serde(default)]
    pub protocol: ProtocolConfig,

    #[serde(default)]
    pub input: InputConfig,

    /// Configuration file path (not serialized)
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

impl Config {
    /// Get the default config directory path
    pub fn default_config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join(CONFIG_DIR))
    }

    /// Get the default config file path
    pub fn default_config_path() -> Option<PathBuf> {
        Self::default_config_dir().map(|p| p.join(CONFIG_FILE))
    }

    /// Load configuration from the default location
    pub fn load_default() -> Result<Self, ConfigError> {
        match Self::default_config_path() {
            Some(path) => Self::load(&path),
            None => {
                tracing::warn!("Could not determine config directory, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Load configuration from file path
    ///
    /// Returns default config if file doesn't exist.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            tracing::info!(path = %path.display(), "Config file not found, using defaults");
            let mut config = Self::default();
            config.config_path = Some(path.to_path_buf());
            return Ok(config);
        }

        let contents = fs::read_to_string(path)?;
        let mut config: Config = serde_json::from_str(&contents)?;
        config.validate();
        config.config_path = Some(path.to_path_buf());

        tracing::info!(
            path = %path.display(),
            poll_interval_ms = config.discovery.poll_interval_ms,
            hold_ms = config.gesture.hold_ms,
            settle_ms = config.protocol.settle_ms,
            analog_dpad = ?config.input.analog_dpad,
            rumble = config.input.rumble,
            "Configuration loaded"
        );

        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<(), ConfigError> {
        let path = match &self.config_path {
            Some(p) => p.clone(),
            None => Self::default_config_path()
                .ok_or_else(|| ConfigError::Validation("No config path".to_string()))?,
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = serde_json::to_string_pretty(self)?;
        fs::write(&path, contents)?;

        tracing::info!(path = %path.display(), "Configuration saved");
        Ok(())
    }

    /// Clamp values into their accepted ranges
    pub fn validate(&mut self) {
        let (lo, hi) = POLL_INTERVAL_RANGE;
        self.discovery.poll_interval_ms = self.discovery.poll_interval_ms.clamp(lo, hi);
        let (lo, hi) = HOLD_RANGE;
        self.gesture.hold_ms = self.gesture.hold_ms.clamp(lo, hi);
        self.protocol.settle_ms = self.protocol.settle_ms.min(MAX_SETTLE_MS);
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.discovery.poll_interval_ms)
    }

    /// Per-connection settings derived from this configuration
    pub fn connection_settings(&self) -> ConnectionSettings {
        ConnectionSettings {
            gesture_hold: Duration::from_millis(self.gesture.hold_ms),
            settle: Duration::from_millis(self.protocol.settle_ms),
            analog_dpad: self.input.analog_dpad,
            rumble: self.input.rumble,
        }
    }
}

// ============================================================================
// Error Types
// ============================================================================

/// Configuration error type
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// I/O error reading/writing file
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// JSON parsing error
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Validation error: {0}")]
    Validation(String),
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.discovery.poll_interval_ms, 2_000);
        assert_eq!(config.gesture.hold_ms, 2_000);
        assert_eq!(config.protocol.settle_ms, 50);
        assert_eq!(config.input.analog_dpad, AnalogDpad::Off);
        assert!(config.input.rumble);
    }

    #[test]
    fn test_default_settings_match_connection_defaults() {
        assert_eq!(Config::default().connection_settings(), ConnectionSettings::default());
    }

    #[test]
    fn test_config_json_partial() {
        let json = r#"{
            "gesture": { "hold_ms": 1500 },
            "input": { "analog_dpad": "right_stick" }
        }"#;

        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.gesture.hold_ms, 1500);
        assert_eq!(config.input.analog_dpad, AnalogDpad::RightStick);
        // Defaults fill in missing fields
        assert!(config.input.rumble);
        assert_eq!(config.protocol.settle_ms, 50);
    }

    #[test]
    fn test_config_json_minimal() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_validation_clamps() {
        let mut config = Config::default();
        config.discovery.poll_interval_ms = 1;
        config.gesture.hold_ms = 999_999;
        config.protocol.settle_ms = 5_000;
        config.validate();
        assert_eq!(config.discovery.poll_interval_ms, 100);
        assert_eq!(config.gesture.hold_ms, 10_000);
        assert_eq!(config.protocol.settle_ms, 1_000);
    }

    #[test]
    fn test_load_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let config = Config::load(&path).unwrap();
        assert_eq!(config.gesture.hold_ms, 2_000);
        assert_eq!(config.config_path, Some(path));
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/config.json");
        let mut config = Config::load(&path).unwrap();
        config.input.rumble = false;
        config.protocol.settle_ms = 20;
        config.save().unwrap();

        let loaded = Config::load(&path).unwrap();
        assert!(!loaded.input.rumble);
        assert_eq!(loaded.protocol.settle_ms, 20);
        assert_eq!(loaded.connection_settings().settle, Duration::from_millis(20));
    }

    #[test]
    fn test_load_rejects_bad_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(Config::load(&path), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_load_clamps_file_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"discovery": {"poll_interval_ms": 0}}"#).unwrap();
        let config = Config::load(&path).unwrap();
        assert_eq!(config.poll_interval(), Duration::from_millis(100));
    }
}
