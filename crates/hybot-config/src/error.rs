//! Configuration error types.

use thiserror::Error;

/// Errors raised while loading, validating or saving configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A config file exists but could not be read.
    #[error("failed to read {path}: {source}")]
    ReadError {
        /// File path.
        path: String,
        /// Underlying error.
        source: std::io::Error,
    },

    /// A config file could not be written.
    #[error("failed to write {path}: {source}")]
    WriteError {
        /// File path.
        path: String,
        /// Underlying error.
        source: std::io::Error,
    },

    /// A config file is not valid YAML or does not match the schema.
    #[error("failed to parse {path}: {source}")]
    ParseError {
        /// File path, or `<merged config>`.
        path: String,
        /// Underlying error.
        source: serde_yaml::Error,
    },

    /// A value is out of range.
    #[error("invalid value for {field}: {message}")]
    ValidationError {
        /// Dotted field path.
        field: String,
        /// What is wrong.
        message: String,
    },

    /// No home directory and no `HYBOT_HOME`.
    #[error("could not determine home directory; set HYBOT_HOME")]
    NoHomeDir,
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;
