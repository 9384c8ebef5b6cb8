//! Configuration Management

use crate::capture::{TapLocation, TapPlacement};
use crate::pipeline::CoordinatorOptions;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Longest accepted throttle interval
pub const MAX_THROTTLE_MS: u64 = 60_000;

/// Main configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Tap installation and throttling
    #[serde(default)]
    pub tap: TapConfig,
    /// Delivery and retention
    #[serde(default)]
    pub capture: CaptureConfig,
}

/// Tap configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TapConfig {
    /// Where in the event chain to tap
    pub location: TapLocation,
    /// Before or after other taps
    pub placement: TapPlacement,
    /// Minimum delivery interval (ms, 0 = every event)
    pub throttle_ms: u64,
}

/// Capture configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Capture-to-delivery ring buffer size
    pub channel_capacity: usize,
    /// Keep delivered events in the log
    pub retain_events: bool,
}

impl Default for TapConfig {
    fn default() -> Self {
        Self {
            location: TapLocation::Session,
            placement: TapPlacement::Head,
            throttle_ms: 500,
        }
    }
}

impl TapConfig {
    pub fn throttle(&self) -> Duration {
        Duration::from_millis(self.throttle_ms)
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 8192,
            retain_events: true,
        }
    }
}

impl CaptureConfig {
    pub fn coordinator_options(&self) -> CoordinatorOptions {
        CoordinatorOptions {
            channel_capacity: self.channel_capacity,
            retain_events: self.retain_events,
        }
    }

    /// Options for a consumer that only reads the subscription stream.
    /// Nothing is retained, so memory stays flat however long it runs.
    pub fn streaming_options(&self) -> CoordinatorOptions {
        CoordinatorOptions {
            retain_events: false,
            ..self.coordinator_options()
        }
    }
}

impl Config {
    /// Validate config values are within acceptable ranges.
    /// Returns Ok(()) if valid, or Err with a description of the first invalid field.
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.capture.channel_capacity == 0 {
            return Err(crate::Error::Config(
                "channel_capacity must be > 0".to_string(),
            ));
        }
        if self.tap.throttle_ms > MAX_THROTTLE_MS {
            return Err(crate::Error::Config(format!(
                "throttle_ms must be at most {}, got {}",
                MAX_THROTTLE_MS, self.tap.throttle_ms
            )));
        }
        Ok(())
    }

    /// Load config from file
    pub fn load(path: &Path) -> Result<Self, crate::Error> {
        let content = std::fs::read_to_string(path)?;
        let config: Self =
            toml::from_str(&content).map_err(|e| crate::Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load config from default location
    pub fn load_default() -> Result<Self, crate::Error> {
        let path = Self::default_path();
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save config to file
    pub fn save(&self, path: &Path) -> Result<(), crate::Error> {
        let content = self.to_toml()?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get default config path
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .map(|h| h.join(".event_tapper").join("config.toml"))
            .unwrap_or_else(|| PathBuf::from("config.toml"))
    }

    /// Generate TOML representation
    pub fn to_toml(&self) -> Result<String, crate::Error> {
        toml::to_string_pretty(self).map_err(|e| crate::Error::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.tap.location, TapLocation::Session);
        assert_eq!(config.tap.placement, TapPlacement::Head);
        assert_eq!(config.tap.throttle(), Duration::from_millis(500));
        assert_eq!(config.capture.channel_capacity, 8192);
        assert!(config.capture.retain_events);
    }

    #[test]
    fn test_config_serialization() {
        let toml = Config::default().to_toml().unwrap();
        assert!(toml.contains("[tap]"));
        assert!(toml.contains("[capture]"));
        assert!(toml.contains("location = \"session\""));
        assert!(toml.contains("placement = \"head\""));
    }

    #[test]
    fn test_default_path() {
        let path = Config::default_path();
        assert!(path.to_string_lossy().contains("config.toml"));
    }

    #[test]
    fn test_config_save_and_load() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config_path = temp_dir.path().join("nested").join("config.toml");

        let mut original = Config::default();
        original.tap.location = TapLocation::AnnotatedSession;
        original.tap.placement = TapPlacement::Tail;
        original.tap.throttle_ms = 0;
        original.capture.retain_events = false;

        original.save(&config_path).expect("Failed to save config");
        let loaded = Config::load(&config_path).expect("Failed to load config");
        assert_eq!(loaded, original);
    }

    #[test]
    fn test_load_nonexistent_file() {
        let temp_dir = TempDir::new().unwrap();
        let result = Config::load(&temp_dir.path().join("missing.toml"));
        assert!(matches!(result, Err(crate::Error::Io(_))));
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
[tap]
location = "hid"
"#,
        )
        .unwrap();

        assert_eq!(config.tap.location, TapLocation::Hid);
        assert_eq!(config.tap.placement, TapPlacement::Head);
        assert_eq!(config.tap.throttle_ms, 500);
        assert_eq!(config.capture, CaptureConfig::default());
    }

    #[test]
    fn test_invalid_toml_parsing() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "[tap]\nlocation = \"nowhere\"\n").unwrap();

        let result = Config::load(&path);
        assert!(matches!(result, Err(crate::Error::Config(_))));
    }

    #[test]
    fn test_validate_default_config() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_validate_zero_capacity() {
        let mut config = Config::default();
        config.capture.channel_capacity = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_throttle_bounds() {
        let mut config = Config::default();
        config.tap.throttle_ms = MAX_THROTTLE_MS;
        assert!(config.validate().is_ok());
        config.tap.throttle_ms = MAX_THROTTLE_MS + 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_invalid_values() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "[capture]\nchannel_capacity = 0\n").unwrap();
        assert!(Config::load(&path).is_err());
    }

    #[test]
    fn test_coordinator_options() {
        let capture = CaptureConfig {
            channel_capacity: 64,
            retain_events: false,
        };
        let options = capture.coordinator_options();
        assert_eq!(options.channel_capacity, 64);
        assert!(!options.retain_events);
    }

    #[test]
    fn test_streaming_options_never_retain() {
        let capture = CaptureConfig {
            channel_capacity: 128,
            retain_events: true,
        };
        let options = capture.streaming_options();
        assert_eq!(options.channel_capacity, 128);
        assert!(!options.retain_events);
    }
}
