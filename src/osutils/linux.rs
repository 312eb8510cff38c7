//! Linux implementation of the OS capability surface
//!
//! Configuration values are stored one file per key under
//! `<state>/config/<section>/`, so a value survives process restarts without
//! any parsing beyond a trim. Boot readiness and reboot go through systemd.

use async_trait::async_trait;
use std::io::ErrorKind;
use tokio::fs;
use tokio::process::Command;
use tracing::{debug, info};

use super::{AgentPaths, OsUtils};
use crate::InitError;

/// OS layer for Linux hosts
#[derive(Debug, Clone)]
pub struct LinuxOsUtils {
    paths: AgentPaths,
}

impl LinuxOsUtils {
    pub fn new(paths: AgentPaths) -> Self {
        Self { paths }
    }

    pub fn paths(&self) -> &AgentPaths {
        &self.paths
    }
}

impl Default for LinuxOsUtils {
    fn default() -> Self {
        Self::new(AgentPaths::new())
    }
}

#[async_trait]
impl OsUtils for LinuxOsUtils {
    async fn wait_for_boot_completion(&self) -> Result<(), InitError> {
        debug!("Waiting for boot completion");

        // `is-system-running --wait` blocks until systemd reaches a terminal
        // state. A degraded system still finished booting, so the exit code
        // is informational only.
        match Command::new("systemctl")
            .args(["is-system-running", "--wait"])
            .output()
            .await
        {
            Ok(output) => {
                let state = String::from_utf8_lossy(&output.stdout);
                debug!("System state after boot wait: {}", state.trim());
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                // Non-systemd host, consider boot complete
                debug!("systemctl not found, skipping boot wait");
                Ok(())
            }
            Err(e) => Err(InitError::Command(format!("boot wait failed: {e}"))),
        }
    }

    async fn get_config_value(
        &self,
        key: &str,
        section: &str,
    ) -> Result<Option<String>, InitError> {
        let path = self.paths.config_value(key, section);
        match fs::read_to_string(&path).await {
            Ok(value) => Ok(Some(value.trim().to_string())),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(InitError::Io(e)),
        }
    }

    async fn set_config_value(
        &self,
        key: &str,
        value: &str,
        section: &str,
    ) -> Result<(), InitError> {
        let path = self.paths.config_value(key, section);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&path, value).await?;
        debug!("Stored config value {}/{}", section, key);
        Ok(())
    }

    async fn reboot(&self) -> Result<(), InitError> {
        info!("Requesting system reboot");

        let output = Command::new("systemctl")
            .arg("reboot")
            .output()
            .await
            .map_err(|e| InitError::Command(format!("failed to run systemctl reboot: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(InitError::Command(format!(
                "reboot request exited with status {}: {}",
                output.status.code().unwrap_or(-1),
                stderr
            )));
        }

        Ok(())
    }

    async fn terminate(&self) -> Result<(), InitError> {
        // Process exit is owned by main; this marks the orderly-completion
        // path so a supervising unit sees a clean stop.
        info!("Provisioning complete, terminating agent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_osutils() -> (LinuxOsUtils, TempDir) {
        let temp = TempDir::new().unwrap();
        let osutils = LinuxOsUtils::new(AgentPaths::with_base(temp.path()));
        (osutils, temp)
    }

    #[tokio::test]
    async fn test_get_missing_value() {
        let (osutils, _temp) = test_osutils();
        let value = osutils.get_config_value("missing", "plugins").await.unwrap();
        assert_eq!(value, None);
    }

    #[tokio::test]
    async fn test_set_then_get_value() {
        let (osutils, _temp) = test_osutils();

        osutils
            .set_config_value("TestPlugin", "execution-done", "plugins")
            .await
            .unwrap();

        let value = osutils
            .get_config_value("TestPlugin", "plugins")
            .await
            .unwrap();
        assert_eq!(value.as_deref(), Some("execution-done"));
    }

    #[tokio::test]
    async fn test_value_survives_new_instance() {
        let (osutils, temp) = test_osutils();

        osutils
            .set_config_value("TestPlugin", "execution-done", "plugins")
            .await
            .unwrap();

        // Fresh OS layer over the same state dir sees the value
        let fresh = LinuxOsUtils::new(AgentPaths::with_base(temp.path()));
        let value = fresh.get_config_value("TestPlugin", "plugins").await.unwrap();
        assert_eq!(value.as_deref(), Some("execution-done"));
    }

    #[tokio::test]
    async fn test_sections_are_isolated() {
        let (osutils, _temp) = test_osutils();

        osutils
            .set_config_value("key", "a", "plugins")
            .await
            .unwrap();
        osutils.set_config_value("key", "b", "chef").await.unwrap();

        let a = osutils.get_config_value("key", "plugins").await.unwrap();
        let b = osutils.get_config_value("key", "chef").await.unwrap();
        assert_eq!(a.as_deref(), Some("a"));
        assert_eq!(b.as_deref(), Some("b"));
    }

    #[tokio::test]
    async fn test_value_is_trimmed() {
        let (osutils, temp) = test_osutils();

        let path = temp.path().join("config/plugins/Manual");
        fs::create_dir_all(path.parent().unwrap()).await.unwrap();
        fs::write(&path, "execution-done\n").await.unwrap();

        let value = osutils.get_config_value("Manual", "plugins").await.unwrap();
        assert_eq!(value.as_deref(), Some("execution-done"));
    }
}
