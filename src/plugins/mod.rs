//! Provisioning plugins
//!
//! Each plugin is a unit of idempotent host-configuration logic executed
//! against the metadata service. Completion state persists per plugin across
//! boots, keyed by the plugin's stable name; a plugin that reported
//! [`PluginStatus::ExecutionDone`] is never executed again.

pub mod chef;
pub mod hostname;
pub mod userdata;

pub use chef::ChefBootstrapPlugin;
pub use hostname::SetHostnamePlugin;
pub use userdata::UserDataPlugin;

use async_trait::async_trait;
use tracing::warn;

use crate::InitError;
use crate::metadata::MetadataService;
use crate::osutils::AgentPaths;

/// Completion state persisted for a plugin
///
/// Absence from the store means the plugin has never run. The state is
/// stored as an opaque string; no other value is meaningful to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluginStatus {
    /// Terminal: the plugin is never re-executed
    ExecutionDone,
    /// Re-execute on every subsequent boot until the plugin reports done
    ExecuteOnNextBoot,
}

impl PluginStatus {
    /// Stored string encoding
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ExecutionDone => "execution-done",
            Self::ExecuteOnNextBoot => "execute-on-next-boot",
        }
    }

    /// Parse the stored encoding, `None` for anything unrecognized
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "execution-done" => Some(Self::ExecutionDone),
            "execute-on-next-boot" => Some(Self::ExecuteOnNextBoot),
            _ => None,
        }
    }
}

impl std::fmt::Display for PluginStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a successful plugin execution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PluginOutcome {
    /// Status to persist for this plugin
    pub status: PluginStatus,
    /// Whether this plugin votes for a reboot at the end of the run
    pub reboot_required: bool,
}

impl PluginOutcome {
    /// Finished, no reboot vote
    pub fn done() -> Self {
        Self {
            status: PluginStatus::ExecutionDone,
            reboot_required: false,
        }
    }

    /// Not finished, try again next boot
    pub fn execute_on_next_boot() -> Self {
        Self {
            status: PluginStatus::ExecuteOnNextBoot,
            reboot_required: false,
        }
    }

    /// Add a reboot vote to this outcome
    pub fn with_reboot(mut self) -> Self {
        self.reboot_required = true;
        self
    }
}

/// Trait for provisioning plugins
#[async_trait]
pub trait Plugin: Send + Sync {
    /// Stable identity of this plugin
    ///
    /// This is the key under which status persists across process restarts,
    /// so it is declared statically rather than derived from the instance.
    fn name(&self) -> &'static str;

    /// Execute against the metadata service
    ///
    /// Must be safe to invoke again if an earlier invocation returned
    /// [`PluginStatus::ExecuteOnNextBoot`] or failed; plugins own their
    /// internal idempotence.
    async fn execute(
        &self,
        service: &dyn MetadataService,
    ) -> Result<PluginOutcome, InitError>;
}

/// Default plugin execution order
pub fn default_plugin_names() -> Vec<String> {
    vec![
        SetHostnamePlugin::NAME.to_string(),
        ChefBootstrapPlugin::NAME.to_string(),
        UserDataPlugin::NAME.to_string(),
    ]
}

/// Resolve the ordered plugin list from configured names
///
/// Order in `names` is the execution order. Unknown names are logged and
/// skipped rather than failing the boot.
pub fn load_plugins(names: &[String], paths: &AgentPaths) -> Vec<Box<dyn Plugin>> {
    let mut plugins: Vec<Box<dyn Plugin>> = Vec::with_capacity(names.len());

    for name in names {
        match name.as_str() {
            SetHostnamePlugin::NAME => plugins.push(Box::new(SetHostnamePlugin::new())),
            ChefBootstrapPlugin::NAME => plugins.push(Box::new(ChefBootstrapPlugin::new())),
            UserDataPlugin::NAME => plugins.push(Box::new(UserDataPlugin::new(paths.clone()))),
            _ => warn!("Unknown plugin '{}' in config, skipping", name),
        }
    }

    plugins
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_encoding_round_trip() {
        for status in [PluginStatus::ExecutionDone, PluginStatus::ExecuteOnNextBoot] {
            assert_eq!(PluginStatus::parse(status.as_str()), Some(status));
        }
    }

    #[test]
    fn test_unknown_status_is_none() {
        assert_eq!(PluginStatus::parse(""), None);
        assert_eq!(PluginStatus::parse("done"), None);
        assert_eq!(PluginStatus::parse("EXECUTION_DONE"), None);
    }

    #[test]
    fn test_outcome_constructors() {
        let done = PluginOutcome::done();
        assert_eq!(done.status, PluginStatus::ExecutionDone);
        assert!(!done.reboot_required);

        let retry = PluginOutcome::execute_on_next_boot().with_reboot();
        assert_eq!(retry.status, PluginStatus::ExecuteOnNextBoot);
        assert!(retry.reboot_required);
    }

    #[test]
    fn test_load_plugins_preserves_order() {
        let paths = AgentPaths::with_base("/tmp/agent-test");
        let names = vec![
            UserDataPlugin::NAME.to_string(),
            SetHostnamePlugin::NAME.to_string(),
        ];

        let plugins = load_plugins(&names, &paths);
        let loaded: Vec<&str> = plugins.iter().map(|p| p.name()).collect();
        assert_eq!(loaded, vec![UserDataPlugin::NAME, SetHostnamePlugin::NAME]);
    }

    #[test]
    fn test_load_plugins_skips_unknown() {
        let paths = AgentPaths::with_base("/tmp/agent-test");
        let names = vec![
            "NoSuchPlugin".to_string(),
            SetHostnamePlugin::NAME.to_string(),
        ];

        let plugins = load_plugins(&names, &paths);
        assert_eq!(plugins.len(), 1);
        assert_eq!(plugins[0].name(), SetHostnamePlugin::NAME);
    }

    #[test]
    fn test_default_names_resolve() {
        let paths = AgentPaths::with_base("/tmp/agent-test");
        let plugins = load_plugins(&default_plugin_names(), &paths);
        assert_eq!(plugins.len(), 3);
    }
}
