//! Configuration types for Retrace

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::record::privacy::PrivacyLevel;

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct RetraceConfig {
    /// Recorder configuration
    pub recorder: RecorderConfig,

    /// Playback configuration
    pub playback: PlaybackConfig,

    /// Record bus configuration
    pub bus: BusConfig,
}

/// Recorder configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecorderConfig {
    /// Level applied where no `data-retrace-privacy` override exists
    pub default_privacy_level: PrivacyLevel,

    /// Tags never serialized
    pub ignored_tags: Vec<String>,

    /// Ancillary observers to install
    pub features: RecorderFeatures,

    /// How often a driver loop should call `Recorder::flush`
    #[serde(with = "humantime_serde")]
    pub flush_interval: Duration,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            default_privacy_level: PrivacyLevel::Mask,
            ignored_tags: vec!["script".to_string(), "noscript".to_string()],
            features: RecorderFeatures::default(),
            flush_interval: Duration::from_millis(100),
        }
    }
}

/// Feature toggles for the ancillary observers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecorderFeatures {
    pub scroll: bool,
    pub media: bool,
    pub input: bool,
    pub viewport_resize: bool,
    pub mouse_move: bool,
    pub focus: bool,
}

impl Default for RecorderFeatures {
    fn default() -> Self {
        Self {
            scroll: true,
            media: true,
            input: true,
            viewport_resize: true,
            mouse_move: true,
            focus: true,
        }
    }
}

/// Playback configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Origin the renderer posts its messages from
    pub sandbox_origin: String,

    /// View the replayed records belong to
    pub view_id: String,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            sandbox_origin: "https://sandbox.retrace.dev".to_string(),
            view_id: uuid::Uuid::new_v4().to_string(),
        }
    }
}

/// Record bus configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    /// Records buffered per subscriber before it starts lagging
    pub capacity: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self { capacity: 1024 }
    }
}

/// Builder for RetraceConfig
pub struct ConfigBuilder {
    config: RetraceConfig,
}

impl ConfigBuilder {
    /// Create a new configuration builder
    pub fn new() -> Self {
        Self {
            config: RetraceConfig::default(),
        }
    }

    /// Set recorder configuration
    pub fn recorder(mut self, config: RecorderConfig) -> Self {
        self.config.recorder = config;
        self
    }

    /// Set the default privacy level
    pub fn default_privacy_level(mut self, level: PrivacyLevel) -> Self {
        self.config.recorder.default_privacy_level = level;
        self
    }

    /// Set playback configuration
    pub fn playback(mut self, config: PlaybackConfig) -> Self {
        self.config.playback = config;
        self
    }

    /// Set bus configuration
    pub fn bus(mut self, config: BusConfig) -> Self {
        self.config.bus = config;
        self
    }

    /// Build and validate the configuration
    pub fn build(self) -> crate::error::Result<RetraceConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RetraceConfig {
    /// Load configuration from file and environment variables.
    ///
    /// Loads in this order:
    /// 1. Default configuration
    /// 2. `retrace.toml` in the working directory
    /// 3. `RETRACE_` prefixed environment variables (`__` separates sections)
    /// 4. The file named by `RETRACE_CONFIG_PATH`, if set
    ///
    /// # Errors
    ///
    /// Returns an error if a source is malformed or the result does not validate.
    pub fn load() -> crate::error::Result<Self> {
        use figment::{
            Figment,
            providers::{Env, Format, Serialized, Toml},
        };

        let mut figment = Figment::from(Serialized::defaults(RetraceConfig::default()))
            .merge(Toml::file("retrace.toml"))
            .merge(
                Env::prefixed("RETRACE_")
                    .ignore(&["LOG", "CONFIG_PATH"])
                    .split("__"),
            );

        if let Ok(path) = std::env::var("RETRACE_CONFIG_PATH") {
            figment = figment.merge(Toml::file(path));
        }

        let config: RetraceConfig = figment.extract().map_err(|e| {
            crate::error::RetraceError::Configuration(format!("Failed to load configuration: {}", e))
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::error::Result<Self> {
        use figment::{
            Figment,
            providers::{Format, Serialized, Toml},
        };

        let path = path.as_ref();
        if !path.exists() {
            return Err(crate::error::RetraceError::Configuration(format!(
                "Configuration file not found: {}",
                path.display()
            )));
        }

        let config: RetraceConfig = Figment::from(Serialized::defaults(RetraceConfig::default()))
            .merge(Toml::file(path))
            .extract()
            .map_err(|e| {
                crate::error::RetraceError::Configuration(format!(
                    "Failed to load configuration file: {}",
                    e
                ))
            })?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.recorder.default_privacy_level == PrivacyLevel::Hidden {
            return Err(crate::error::RetraceError::Configuration(
                "default privacy level cannot be hidden".to_string(),
            ));
        }
        if self.recorder.ignored_tags.iter().any(|tag| tag.trim().is_empty()) {
            return Err(crate::error::RetraceError::Configuration(
                "ignored tags cannot be empty".to_string(),
            ));
        }
        if self.recorder.flush_interval.is_zero() {
            return Err(crate::error::RetraceError::Configuration(
                "flush interval must be greater than zero".to_string(),
            ));
        }
        if self.playback.sandbox_origin.trim().is_empty() {
            return Err(crate::error::RetraceError::Configuration(
                "sandbox origin must be set".to_string(),
            ));
        }
        if self.bus.capacity == 0 {
            return Err(crate::error::RetraceError::Configuration(
                "bus capacity must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
