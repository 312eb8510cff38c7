//! User-data plugin
//!
//! Persists and executes a user-supplied boot script. Payloads may arrive
//! gzip-compressed or base64-wrapped; both are unwrapped before inspection.
//! Cloud-config payloads are left to the dedicated plugins.
//!
//! A script can steer the agent through well-known exit codes: 1001 marks
//! the script done, 1002 asks for a re-run on the next boot plus a reboot,
//! 1003 marks it done and asks for a reboot. Any other exit code completes
//! the plugin without a reboot vote.

use async_trait::async_trait;
use base64::Engine;
use flate2::read::GzDecoder;
use std::io::Read;
use tokio::fs;
use tokio::process::Command;
use tracing::{debug, warn};

use super::{Plugin, PluginOutcome};
use crate::InitError;
use crate::metadata::MetadataService;
use crate::osutils::AgentPaths;

/// Script exit code: done, never run again
const EXIT_DONE: i32 = 1001;
/// Script exit code: run again next boot and reboot now
const EXIT_RETRY_AND_REBOOT: i32 = 1002;
/// Script exit code: done and reboot now
const EXIT_DONE_AND_REBOOT: i32 = 1003;

/// Executes the instance's user-data script
#[derive(Debug)]
pub struct UserDataPlugin {
    paths: AgentPaths,
}

impl UserDataPlugin {
    pub const NAME: &'static str = "UserDataPlugin";

    pub fn new(paths: AgentPaths) -> Self {
        Self { paths }
    }

    /// Unwrap gzip and base64 envelopes around the payload
    fn decode(data: &[u8]) -> Result<Vec<u8>, InitError> {
        // Gzip magic bytes
        if data.len() >= 2 && data[0] == 0x1f && data[1] == 0x8b {
            debug!("Decompressing gzip user data");
            let mut decoder = GzDecoder::new(data);
            let mut decompressed = Vec::new();
            decoder.read_to_end(&mut decompressed).map_err(|e| {
                InitError::InvalidData(format!("Gzip decompression failed: {e}"))
            })?;
            return Ok(decompressed);
        }

        // A base64 envelope only counts if the decoded bytes are a payload
        // we recognize; anything else passes through untouched
        if let Some(decoded) = Self::try_base64(data) {
            if decoded.starts_with(b"#!")
                || decoded.starts_with(b"#cloud-config")
                || decoded.starts_with(&[0x1f, 0x8b])
            {
                debug!("Decoding base64 user data");
                return Self::decode(&decoded);
            }
        }

        Ok(data.to_vec())
    }

    fn try_base64(data: &[u8]) -> Option<Vec<u8>> {
        let text = std::str::from_utf8(data).ok()?;
        let cleaned: String = text.chars().filter(|c| !c.is_whitespace()).collect();
        base64::engine::general_purpose::STANDARD.decode(cleaned).ok()
    }

    /// Persist and execute the script, mapping its exit code onto the
    /// plugin contract
    async fn run_script(&self, script: &[u8]) -> Result<PluginOutcome, InitError> {
        let path = self.paths.user_data_script();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&path, script).await?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&path, std::fs::Permissions::from_mode(0o700)).await?;
        }

        debug!("Executing user data script {}", path.display());
        let output = Command::new(&path)
            .output()
            .await
            .map_err(|e| InitError::Command(format!("user data script failed to start: {e}")))?;

        if !output.stdout.is_empty() {
            debug!("stdout: {}", String::from_utf8_lossy(&output.stdout));
        }

        let code = output.status.code();
        match code {
            Some(0) | Some(EXIT_DONE) => Ok(PluginOutcome::done()),
            Some(EXIT_RETRY_AND_REBOOT) => {
                Ok(PluginOutcome::execute_on_next_boot().with_reboot())
            }
            Some(EXIT_DONE_AND_REBOOT) => Ok(PluginOutcome::done().with_reboot()),
            _ => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                warn!(
                    "User data script exited with status {}: {}",
                    code.unwrap_or(-1),
                    stderr
                );
                Ok(PluginOutcome::done())
            }
        }
    }
}

#[async_trait]
impl Plugin for UserDataPlugin {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn execute(
        &self,
        service: &dyn MetadataService,
    ) -> Result<PluginOutcome, InitError> {
        let raw = service.get_user_data().await?;
        if raw.is_empty() {
            debug!("No user data, nothing to do");
            return Ok(PluginOutcome::done());
        }

        let data = Self::decode(&raw)?;

        if data.starts_with(b"#!") {
            return self.run_script(&data).await;
        }

        if data.starts_with(b"#cloud-config") {
            debug!("Cloud-config user data is handled by the dedicated plugins");
        } else {
            warn!("Unrecognized user data format, ignoring");
        }
        Ok(PluginOutcome::done())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::mock::MockMetadataService;
    use crate::plugins::PluginStatus;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::io::Write;
    use tempfile::TempDir;

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn test_decode_passthrough() {
        let script = b"#!/bin/sh\ntrue\n";
        assert_eq!(UserDataPlugin::decode(script).unwrap(), script);
    }

    #[test]
    fn test_decode_gzip() {
        let script = b"#!/bin/sh\ntrue\n";
        assert_eq!(UserDataPlugin::decode(&gzip(script)).unwrap(), script);
    }

    #[test]
    fn test_decode_base64_script() {
        let script = b"#!/bin/sh\ntrue\n";
        let encoded = base64::engine::general_purpose::STANDARD.encode(script);
        assert_eq!(UserDataPlugin::decode(encoded.as_bytes()).unwrap(), script);
    }

    #[test]
    fn test_decode_base64_gzip_script() {
        let script = b"#!/bin/sh\ntrue\n";
        let encoded = base64::engine::general_purpose::STANDARD.encode(gzip(script));
        assert_eq!(UserDataPlugin::decode(encoded.as_bytes()).unwrap(), script);
    }

    #[test]
    fn test_plain_text_not_treated_as_base64() {
        // Valid base64 alphabet, but decodes to junk, so it passes through
        let data = b"deadbeef";
        assert_eq!(UserDataPlugin::decode(data).unwrap(), data);
    }

    #[test]
    fn test_corrupt_gzip_is_error() {
        let data = [0x1f, 0x8b, 0x00, 0x01, 0x02];
        assert!(UserDataPlugin::decode(&data).is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_script_exit_zero_is_done() {
        let temp = TempDir::new().unwrap();
        let plugin = UserDataPlugin::new(AgentPaths::with_base(temp.path()));
        let service =
            MockMetadataService::new().with_user_data(b"#!/bin/sh\nexit 0\n".to_vec());

        let outcome = plugin.execute(&service).await.unwrap();
        assert_eq!(outcome.status, PluginStatus::ExecutionDone);
        assert!(!outcome.reboot_required);
        assert!(temp.path().join("user-data-script").exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_script_exit_1002_retries_with_reboot() {
        let temp = TempDir::new().unwrap();
        let plugin = UserDataPlugin::new(AgentPaths::with_base(temp.path()));
        let service =
            MockMetadataService::new().with_user_data(b"#!/bin/sh\nexit 1002\n".to_vec());

        let outcome = plugin.execute(&service).await.unwrap();
        assert_eq!(outcome.status, PluginStatus::ExecuteOnNextBoot);
        assert!(outcome.reboot_required);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_script_exit_1003_is_done_with_reboot() {
        let temp = TempDir::new().unwrap();
        let plugin = UserDataPlugin::new(AgentPaths::with_base(temp.path()));
        let service =
            MockMetadataService::new().with_user_data(b"#!/bin/sh\nexit 1003\n".to_vec());

        let outcome = plugin.execute(&service).await.unwrap();
        assert_eq!(outcome.status, PluginStatus::ExecutionDone);
        assert!(outcome.reboot_required);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failing_script_still_completes() {
        let temp = TempDir::new().unwrap();
        let plugin = UserDataPlugin::new(AgentPaths::with_base(temp.path()));
        let service =
            MockMetadataService::new().with_user_data(b"#!/bin/sh\nexit 7\n".to_vec());

        let outcome = plugin.execute(&service).await.unwrap();
        assert_eq!(outcome.status, PluginStatus::ExecutionDone);
        assert!(!outcome.reboot_required);
    }

    #[tokio::test]
    async fn test_empty_user_data_is_noop() {
        let temp = TempDir::new().unwrap();
        let plugin = UserDataPlugin::new(AgentPaths::with_base(temp.path()));
        let service = MockMetadataService::new();

        let outcome = plugin.execute(&service).await.unwrap();
        assert_eq!(outcome.status, PluginStatus::ExecutionDone);
        assert!(!temp.path().join("user-data-script").exists());
    }

    #[tokio::test]
    async fn test_cloud_config_is_noop() {
        let temp = TempDir::new().unwrap();
        let plugin = UserDataPlugin::new(AgentPaths::with_base(temp.path()));
        let service = MockMetadataService::new()
            .with_user_data(b"#cloud-config\nhostname: web-01\n".to_vec());

        let outcome = plugin.execute(&service).await.unwrap();
        assert_eq!(outcome.status, PluginStatus::ExecutionDone);
        assert!(!temp.path().join("user-data-script").exists());
    }
}
