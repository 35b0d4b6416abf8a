//! # Error Types
//!
//! Errors raised while configuring and starting a panel. Entity callback
//! failures are not errors at this level; they are isolated and reported
//! through a `FaultSink`.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors loading or validating a [`PanelConfig`](crate::PanelConfig).
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read config {}: {source}", .path.display())]
    Io {
        /// File that was being read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The config file is not valid TOML for a panel config.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// The config could not be written back out as TOML.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// A value is out of range.
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Errors starting or stopping the execution contexts.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration failed to load.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The OS refused to start an execution context thread.
    #[error("failed to spawn {context} thread: {source}")]
    Spawn {
        /// Which execution context.
        context: &'static str,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// An execution context thread panicked.
    #[error("{context} thread panicked")]
    ThreadPanicked {
        /// Which execution context.
        context: &'static str,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ConfigError::Io {
            path: PathBuf::from("/nope/panel.toml"),
            source: io::Error::new(io::ErrorKind::NotFound, "missing"),
        };
        assert_eq!(
            err.to_string(),
            "failed to read config /nope/panel.toml: missing"
        );

        let err = AppError::from(ConfigError::Invalid("width must be positive".into()));
        assert_eq!(err.to_string(), "invalid config: width must be positive");

        let err = AppError::ThreadPanicked { context: "render" };
        assert_eq!(err.to_string(), "render thread panicked");
    }
}
