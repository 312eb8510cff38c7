//! Hostname plugin
//!
//! Applies a `hostname:` (or `fqdn:`) key from cloud-config user data to the
//! host. Without one the plugin is a no-op and completes immediately.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info};

use super::{Plugin, PluginOutcome};
use crate::InitError;
use crate::metadata::MetadataService;

/// Slice of cloud-config this plugin reads; all other keys are ignored
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct HostnameConfig {
    hostname: Option<String>,
    fqdn: Option<String>,
}

/// Sets the system hostname from user data
#[derive(Debug, Default)]
pub struct SetHostnamePlugin;

impl SetHostnamePlugin {
    pub const NAME: &'static str = "SetHostnamePlugin";

    pub fn new() -> Self {
        Self
    }

    /// Extract the desired hostname from raw user data
    ///
    /// Only cloud-config payloads carry one; an explicit `hostname` wins
    /// over `fqdn`.
    fn desired_hostname(user_data: &[u8]) -> Option<String> {
        let text = std::str::from_utf8(user_data).ok()?;
        if !text.trim_start().starts_with("#cloud-config") {
            return None;
        }

        let config: HostnameConfig = serde_yaml::from_str(text).ok()?;
        config
            .hostname
            .or(config.fqdn)
            .filter(|name| !name.is_empty())
    }

    /// Set the system hostname
    async fn apply_hostname(hostname: &str) -> Result<(), InitError> {
        debug!("Setting hostname to: {}", hostname);

        // Write to /etc/hostname
        tokio::fs::write("/etc/hostname", format!("{}\n", hostname))
            .await
            .map_err(InitError::Io)?;

        // Call hostname command to set it immediately
        let output = tokio::process::Command::new("hostname")
            .arg(hostname)
            .output()
            .await
            .map_err(|e| InitError::Command(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(InitError::Command(format!(
                "Failed to set hostname: {}",
                stderr
            )));
        }

        Ok(())
    }
}

#[async_trait]
impl Plugin for SetHostnamePlugin {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn execute(
        &self,
        service: &dyn MetadataService,
    ) -> Result<PluginOutcome, InitError> {
        let user_data = service.get_user_data().await?;

        let Some(hostname) = Self::desired_hostname(&user_data) else {
            debug!("No hostname in user data, nothing to do");
            return Ok(PluginOutcome::done());
        };

        Self::apply_hostname(&hostname).await?;
        info!("Hostname set to '{}'", hostname);

        // Hostname changes apply live on Linux, no reboot needed
        Ok(PluginOutcome::done())
    }
}
