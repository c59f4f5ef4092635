//! Configuration loading errors.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    ReadFile { path: PathBuf, #[source] source: std::io::Error },

    #[error("failed to parse config file '{path}': {source}")]
    ParseToml { path: PathBuf, #[source] source: Box<toml::de::Error> },

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("failed to write config file '{path}': {source}")]
    WriteFile { path: PathBuf, #[source] source: std::io::Error },

    #[error("invalid value for environment variable '{var}': '{value}'")]
    InvalidEnvValue { var: String, value: String },

    #[error("could not determine a home/config directory for this platform")]
    NoConfigDir,
}

pub type Result<T> = std::result::Result<T, ConfigError>;
