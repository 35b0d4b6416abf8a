//! # Panel Configuration
//!
//! Loaded once at startup from a TOML file. Every field has a default, so
//! an empty file (or no file) is a valid configuration.
//!
//! ```toml
//! title = "TickPanel"
//! width = 800
//! height = 800
//! visible = true
//! tick_period_ms = 10
//! purge = "dedicated"        # or "after_tick"
//! host_event_capacity = 1024
//! run_for_secs = 5           # demo binary only
//!
//! [idle]
//! kind = "yield"             # "spin", "yield" or "sleep" (+ micros = N)
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::scheduler::{IdleStrategy, PurgeMode};

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "TICKPANEL_CONFIG";

/// Default delay between two tick firings, in milliseconds.
pub const DEFAULT_TICK_PERIOD_MS: u64 = 10;

/// Longest accepted delay between two tick firings, in milliseconds.
pub const MAX_TICK_PERIOD_MS: u64 = 60_000;

/// Default panel edge length, in pixels.
pub const DEFAULT_PANEL_SIZE: u32 = 800;

/// Default capacity of the host event channel.
pub const DEFAULT_HOST_EVENT_CAPACITY: usize = 1024;

/// Runtime configuration for a panel and its execution contexts.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PanelConfig {
    /// Window title, for the windowing collaborator.
    pub title: String,
    /// Preferred panel width in pixels.
    pub width: u32,
    /// Preferred panel height in pixels.
    pub height: u32,
    /// Whether the window should be shown once the loops start.
    pub visible: bool,
    /// Delay between two tick firings.
    pub tick_period_ms: u64,
    /// Where dead entities get purged.
    pub purge: PurgeMode,
    /// Capacity of the host event channel.
    pub host_event_capacity: usize,
    /// Stop the demo after this many seconds. Runs forever when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_for_secs: Option<u64>,
    /// What the render and purge loops do between iterations.
    pub idle: IdleStrategy,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            title: "TickPanel".to_string(),
            width: DEFAULT_PANEL_SIZE,
            height: DEFAULT_PANEL_SIZE,
            visible: true,
            tick_period_ms: DEFAULT_TICK_PERIOD_MS,
            purge: PurgeMode::default(),
            host_event_capacity: DEFAULT_HOST_EVENT_CAPACITY,
            run_for_secs: None,
            idle: IdleStrategy::default(),
        }
    }
}

impl PanelConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed TOML or unknown keys and
    /// [`ConfigError::Invalid`] for out-of-range values.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, otherwise the
    /// same errors as [`PanelConfig::from_toml_str`].
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Serializes the config back to TOML.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Serialize`] if serialization fails.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string(self)?)
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first bad field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_period_ms == 0 {
            return Err(ConfigError::Invalid("tick_period_ms must be at least 1".into()));
        }
        if self.tick_period_ms > MAX_TICK_PERIOD_MS {
            return Err(ConfigError::Invalid(format!(
                "tick_period_ms must be at most {MAX_TICK_PERIOD_MS}, got {}",
                self.tick_period_ms
            )));
        }
        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::Invalid(format!(
                "panel size must be positive, got {}x{}",
                self.width, self.height
            )));
        }
        if self.host_event_capacity == 0 {
            return Err(ConfigError::Invalid(
                "host_event_capacity must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Delay between two tick firings.
    #[must_use]
    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(self.tick_period_ms)
    }

    /// Preferred `(width, height)` of the panel.
    #[must_use]
    pub fn preferred_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// How long the demo should run, if bounded.
    #[must_use]
    pub fn run_for(&self) -> Option<Duration> {
        self.run_for_secs.map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PanelConfig::default();
        assert_eq!(config.tick_period(), Duration::from_millis(10));
        assert_eq!(config.preferred_size(), (800, 800));
        assert!(config.visible);
        assert_eq!(config.purge, PurgeMode::Dedicated);
        assert_eq!(config.idle, IdleStrategy::Yield);
        assert!(config.run_for().is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_document_is_default() {
        assert_eq!(PanelConfig::from_toml_str("").unwrap(), PanelConfig::default());
    }

    #[test]
    fn test_parse_full_document() {
        let config = PanelConfig::from_toml_str(
            r#"
            title = "Arena"
            width = 640
            height = 480
            tick_period_ms = 16
            purge = "after_tick"
            host_event_capacity = 64
            run_for_secs = 3

            [idle]
            kind = "sleep"
            micros = 250
            "#,
        )
        .unwrap();

        assert_eq!(config.title, "Arena");
        assert_eq!(config.preferred_size(), (640, 480));
        assert_eq!(config.tick_period(), Duration::from_millis(16));
        assert_eq!(config.purge, PurgeMode::AfterTick);
        assert_eq!(config.idle, IdleStrategy::Sleep { micros: 250 });
        assert_eq!(config.run_for(), Some(Duration::from_secs(3)));
    }

    #[test]
    fn test_round_trip() {
        let config = PanelConfig {
            visible: false,
            idle: IdleStrategy::Spin,
            run_for_secs: Some(1),
            ..PanelConfig::default()
        };
        let text = config.to_toml_string().unwrap();
        assert_eq!(PanelConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn test_rejects_zero_tick_period() {
        let err = PanelConfig::from_toml_str("tick_period_ms = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_tick_period_upper_bound() {
        let err = PanelConfig::from_toml_str("tick_period_ms = 9223372036854775807").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
        let err = PanelConfig::from_toml_str("tick_period_ms = 60001").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let config = PanelConfig::from_toml_str("tick_period_ms = 60000").unwrap();
        assert_eq!(config.tick_period(), Duration::from_secs(60));
    }

    #[test]
    fn test_rejects_unknown_key() {
        let err = PanelConfig::from_toml_str("tick_speed = 5").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_missing_file() {
        let err = PanelConfig::from_path("/definitely/not/here/panel.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_from_path() {
        let path = std::env::temp_dir().join(format!(
            "tickpanel_config_{}.toml",
            std::process::id()
        ));
        std::fs::write(&path, "width = 320\nheight = 200\n").unwrap();
        let config = PanelConfig::from_path(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(config.preferred_size(), (320, 200));
    }
}
