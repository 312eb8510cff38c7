//! Agent configuration
//!
//! Loads the agent's own configuration from a YAML file. Every field has a
//! default, so a missing or partial file still yields a runnable agent.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

use crate::InitError;
use crate::osutils::paths;

/// Agent configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Base directory for persisted agent state
    pub state_dir: PathBuf,

    /// Plugins to execute, in execution order
    ///
    /// Order is significant: plugins that depend on earlier side effects
    /// rely on their position in this list.
    pub plugins: Vec<String>,

    /// Metadata service settings
    pub metadata: MetadataConfig,
}

/// Metadata service settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataConfig {
    /// Endpoint for the HTTP metadata service
    pub base_url: String,

    /// Seed directories probed by the config drive service
    pub seed_dirs: Vec<PathBuf>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            state_dir: PathBuf::from(paths::STATE_DIR),
            plugins: crate::plugins::default_plugin_names(),
            metadata: MetadataConfig::default(),
        }
    }
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            base_url: crate::metadata::http::DEFAULT_BASE_URL.to_string(),
            seed_dirs: vec![
                PathBuf::from("/var/lib/instance-init/seed"),
                PathBuf::from("/media/configdrive"),
            ],
        }
    }
}

impl AgentConfig {
    /// Parse a config from YAML
    pub fn from_yaml(yaml: &str) -> Result<Self, InitError> {
        Ok(serde_yaml::from_str(yaml)?)
    }
}

/// Load the agent config from the given path, or the default location
///
/// A missing file yields the built-in defaults; an unreadable or invalid
/// file is an error, since silently falling back could run the wrong
/// plugin list.
pub async fn load(path: Option<&Path>) -> Result<AgentConfig, InitError> {
    let path = path.unwrap_or_else(|| Path::new(paths::CONFIG_FILE));

    if !path.exists() {
        debug!("No config file at {}, using defaults", path.display());
        return Ok(AgentConfig::default());
    }

    let content = fs::read_to_string(path).await?;
    let config = AgentConfig::from_yaml(&content)
        .map_err(|e| InitError::Config(format!("{}: {e}", path.display())))?;

    if config.plugins.is_empty() {
        warn!("Config at {} lists no plugins", path.display());
    }

    debug!("Loaded config from {}", path.display());
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AgentConfig::default();
        assert_eq!(config.state_dir, PathBuf::from("/var/lib/instance-init"));
        assert!(!config.plugins.is_empty());
        assert_eq!(config.metadata.base_url, "http://169.254.169.254");
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = AgentConfig::from_yaml("state_dir: /tmp/agent\n").unwrap();
        assert_eq!(config.state_dir, PathBuf::from("/tmp/agent"));
        assert_eq!(config.plugins, crate::plugins::default_plugin_names());
    }

    #[test]
    fn test_plugin_order_preserved() {
        let yaml = "plugins:\n  - UserDataPlugin\n  - SetHostnamePlugin\n";
        let config = AgentConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.plugins, vec!["UserDataPlugin", "SetHostnamePlugin"]);
    }

    #[test]
    fn test_metadata_overrides() {
        let yaml = "metadata:\n  base_url: http://127.0.0.1:8080\n";
        let config = AgentConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.metadata.base_url, "http://127.0.0.1:8080");
        assert!(!config.metadata.seed_dirs.is_empty());
    }

    #[tokio::test]
    async fn test_load_missing_file_is_default() {
        let config = load(Some(Path::new("/nonexistent/agent.yaml")))
            .await
            .unwrap();
        assert_eq!(config.plugins, crate::plugins::default_plugin_names());
    }

    #[tokio::test]
    async fn test_load_invalid_yaml_is_error() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("config.yaml");
        tokio::fs::write(&path, "plugins: {not a list").await.unwrap();

        let result = load(Some(&path)).await;
        assert!(matches!(result, Err(InitError::Config(_))));
    }
}
