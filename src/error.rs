//! Error types for instance-init-rs

use thiserror::Error;

/// Main error type for instance-init-rs operations
#[derive(Error, Debug)]
pub enum InitError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Metadata service error: {0}")]
    Metadata(String),

    #[error("No metadata service found")]
    NoMetadataService,

    #[error("Plugin status storage error: {0}")]
    Storage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Plugin '{plugin}' error: {message}")]
    Plugin { plugin: String, message: String },

    #[error("Command execution failed: {0}")]
    Command(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),
}

impl InitError {
    /// Create a plugin error
    pub fn plugin(plugin: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Plugin {
            plugin: plugin.into(),
            message: message.into(),
        }
    }

    /// Create a storage error
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }
}
