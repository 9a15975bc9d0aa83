//! Configuration file support.
//!
//! Review settings are stored as JSON. Every field has a default, so a
//! partial file (or none at all) is always usable.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_DEAD_PIXEL_THRESHOLD, DEFAULT_DOUBLE_CHECK_PERCENTAGE, DEFAULT_LOW_ALPHA, FULL_ALPHA,
};

/// Log level setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Show only errors
    Error,
    /// Show errors and warnings
    Warn,
    /// Show errors, warnings, and info messages
    #[default]
    Info,
    /// Show debug-level logging
    Debug,
    /// Show all log messages including trace
    Trace,
}

impl LogLevel {
    /// Convert to log crate's LevelFilter.
    pub fn to_level_filter(&self) -> log::LevelFilter {
        match self {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

/// Current configuration file format version.
pub const CONFIG_VERSION: u32 = 1;

/// Overlay appearance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlaySettings {
    /// Alpha of every object in the overview
    pub low_alpha: u8,
    /// Alpha of the isolated and hovered object
    pub highlight_alpha: u8,
}

impl Default for OverlaySettings {
    fn default() -> Self {
        Self {
            low_alpha: DEFAULT_LOW_ALPHA,
            highlight_alpha: FULL_ALPHA,
        }
    }
}

/// Connectivity analysis settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisSettings {
    /// Objects with at most this many pixels are flagged as dead pixels
    pub dead_pixel_threshold: u64,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            dead_pixel_threshold: DEFAULT_DEAD_PIXEL_THRESHOLD,
        }
    }
}

/// Double-check sampling settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DoubleCheckSettings {
    /// Share of objects to sample, in percent
    pub percentage: f64,
    /// Fixed seed for reproducible samples; `None` samples from OS entropy
    pub seed: Option<u64>,
}

impl Default for DoubleCheckSettings {
    fn default() -> Self {
        Self {
            percentage: DEFAULT_DOUBLE_CHECK_PERCENTAGE,
            seed: None,
        }
    }
}

/// Auto-save timing, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoSaveSettings {
    /// Whether the ledger is saved automatically
    pub enabled: bool,
    /// Minimum time between two saves
    pub interval_secs: u64,
    /// Quiet time after the last decision before saving
    pub debounce_secs: u64,
}

impl Default for AutoSaveSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 60,
            debounce_secs: 5,
        }
    }
}

/// Review configuration that can be exported and imported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewConfig {
    /// Version of the configuration file format
    pub version: u32,
    /// Overlay appearance
    pub overlay: OverlaySettings,
    /// Connectivity analysis
    pub analysis: AnalysisSettings,
    /// Double-check sampling
    pub double_check: DoubleCheckSettings,
    /// Auto-save timing
    pub autosave: AutoSaveSettings,
    /// Log verbosity level
    pub log_level: LogLevel,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            overlay: OverlaySettings::default(),
            analysis: AnalysisSettings::default(),
            double_check: DoubleCheckSettings::default(),
            autosave: AutoSaveSettings::default(),
            log_level: LogLevel::default(),
        }
    }
}

impl ReviewConfig {
    /// Serialize the configuration to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Deserialize configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;

        if config.version > CONFIG_VERSION {
            return Err(ConfigError::VersionTooNew {
                file_version: config.version,
                supported_version: CONFIG_VERSION,
            });
        }
        if !(0.0..=100.0).contains(&config.double_check.percentage) {
            return Err(ConfigError::InvalidValue {
                field: "double_check.percentage",
                message: format!("{} is not within 0..=100", config.double_check.percentage),
            });
        }

        Ok(config)
    }

    /// Default filename for the config file.
    pub fn default_filename() -> &'static str {
        "maskreview-config.json"
    }

    /// Default config file path, under the platform config directory.
    pub fn default_path() -> Option<PathBuf> {
        if let Some(config_dir) = dirs::config_dir() {
            Some(config_dir.join("maskreview").join(Self::default_filename()))
        } else {
            dirs::home_dir().map(|home| {
                home.join(".config")
                    .join("maskreview")
                    .join(Self::default_filename())
            })
        }
    }

    /// Load configuration from `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        let config = Self::from_json(&json)?;
        log::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Write configuration to `path`, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_json()?)?;
        log::info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Load from the default path, falling back to defaults when the file is
    /// missing or unreadable.
    pub fn load_from_default_path() -> Self {
        let Some(path) = Self::default_path() else {
            return Self::default();
        };
        if !path.exists() {
            log::debug!("No config file found at {:?}", path);
            return Self::default();
        }
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!("Failed to load config file {:?}: {}", path, e);
            Self::default()
        })
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// JSON parsing error
    #[error("Failed to parse configuration: {0}")]
    ParseError(#[from] serde_json::Error),

    /// Configuration version is newer than supported
    #[error(
        "Configuration file version {file_version} is newer than supported version {supported_version}"
    )]
    VersionTooNew {
        file_version: u32,
        supported_version: u32,
    },

    /// A value is out of range
    #[error("Invalid value for {field}: {message}")]
    InvalidValue {
        field: &'static str,
        message: String,
    },

    /// I/O error when reading/writing config
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ReviewConfig::default();
        assert_eq!(config.overlay.low_alpha, 128);
        assert_eq!(config.overlay.highlight_alpha, 255);
        assert_eq!(config.analysis.dead_pixel_threshold, 10);
        assert_eq!(config.double_check.percentage, 5.0);
        assert_eq!(config.double_check.seed, None);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config =
            ReviewConfig::from_json(r#"{"version": 1, "overlay": {"low_alpha": 90}}"#).unwrap();
        assert_eq!(config.overlay.low_alpha, 90);
        assert_eq!(config.overlay.highlight_alpha, 255);
        assert_eq!(config.log_level, LogLevel::Info);
    }

    #[test]
    fn test_json_round_trip() {
        let mut config = ReviewConfig::default();
        config.double_check.seed = Some(42);
        config.log_level = LogLevel::Debug;
        let parsed = ReviewConfig::from_json(&config.to_json().unwrap()).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_version_too_new() {
        let err = ReviewConfig::from_json(r#"{"version": 99}"#).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::VersionTooNew {
                file_version: 99,
                ..
            }
        ));
    }

    #[test]
    fn test_percentage_out_of_range() {
        let err =
            ReviewConfig::from_json(r#"{"double_check": {"percentage": 150.0}}"#).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_save_and_load_file() {
        let path = std::env::temp_dir()
            .join(format!("maskreview-config-{}", std::process::id()))
            .join("config.json");
        let mut config = ReviewConfig::default();
        config.analysis.dead_pixel_threshold = 3;

        config.save(&path).unwrap();
        let loaded = ReviewConfig::load(&path).unwrap();
        assert_eq!(loaded, config);

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }
}
