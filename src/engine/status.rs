//! Plugin status persistence
//!
//! One status value per plugin identity, keyed by the plugin's stable name.
//! Absence means the plugin never ran. The store is injected into the
//! engine, so tests can swap the OS-backed store for [`InMemoryStatusStore`].

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::warn;

use crate::InitError;
use crate::osutils::OsUtils;
use crate::plugins::PluginStatus;

/// Config section holding plugin statuses
///
/// Fixed and well-known, distinct from any plugin's own configuration
/// namespace.
pub const PLUGIN_STATUS_SECTION: &str = "plugins";

/// Persistent per-plugin completion state
///
/// Each call is independent; there is no transaction spanning multiple
/// plugin updates. Errors are storage errors and must propagate to the
/// caller — when status tracking cannot be trusted the whole run is suspect.
#[async_trait]
pub trait PluginStatusStore: Send + Sync {
    /// Status recorded for a plugin, `None` if it never ran
    async fn get(&self, plugin_name: &str) -> Result<Option<PluginStatus>, InitError>;

    /// Record a plugin's status
    async fn set(&self, plugin_name: &str, status: PluginStatus) -> Result<(), InitError>;
}

/// Status store backed by the OS config-value surface
pub struct ConfigStatusStore {
    osutils: Arc<dyn OsUtils>,
}

impl ConfigStatusStore {
    pub fn new(osutils: Arc<dyn OsUtils>) -> Self {
        Self { osutils }
    }
}

#[async_trait]
impl PluginStatusStore for ConfigStatusStore {
    async fn get(&self, plugin_name: &str) -> Result<Option<PluginStatus>, InitError> {
        let value = self
            .osutils
            .get_config_value(plugin_name, PLUGIN_STATUS_SECTION)
            .await
            .map_err(|e| InitError::storage(format!("reading status of '{plugin_name}': {e}")))?;

        match value {
            None => Ok(None),
            Some(raw) => match PluginStatus::parse(&raw) {
                Some(status) => Ok(Some(status)),
                None => {
                    // Only the two known encodings mean anything; treating
                    // garbage as done could skip a plugin forever, re-running
                    // is safe because plugins are idempotent
                    warn!(
                        "Ignoring unknown status '{}' for plugin '{}'",
                        raw, plugin_name
                    );
                    Ok(None)
                }
            },
        }
    }

    async fn set(&self, plugin_name: &str, status: PluginStatus) -> Result<(), InitError> {
        self.osutils
            .set_config_value(plugin_name, status.as_str(), PLUGIN_STATUS_SECTION)
            .await
            .map_err(|e| InitError::storage(format!("writing status of '{plugin_name}': {e}")))
    }
}

/// In-memory status store for tests
#[derive(Default)]
pub struct InMemoryStatusStore {
    statuses: Mutex<HashMap<String, PluginStatus>>,
}

impl InMemoryStatusStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a status, as if a previous run recorded it
    pub fn with_status(self, plugin_name: &str, status: PluginStatus) -> Self {
        self.statuses
            .lock()
            .unwrap()
            .insert(plugin_name.to_string(), status);
        self
    }

    /// Recorded status for a plugin, if any
    pub fn status(&self, plugin_name: &str) -> Option<PluginStatus> {
        self.statuses.lock().unwrap().get(plugin_name).copied()
    }
}

#[async_trait]
impl PluginStatusStore for InMemoryStatusStore {
    async fn get(&self, plugin_name: &str) -> Result<Option<PluginStatus>, InitError> {
        Ok(self.status(plugin_name))
    }

    async fn set(&self, plugin_name: &str, status: PluginStatus) -> Result<(), InitError> {
        self.statuses
            .lock()
            .unwrap()
            .insert(plugin_name.to_string(), status);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::osutils::mock::MockOsUtils;

    #[tokio::test]
    async fn test_config_store_round_trip() {
        let osutils = Arc::new(MockOsUtils::new());
        let store = ConfigStatusStore::new(osutils.clone());

        assert_eq!(store.get("TestPlugin").await.unwrap(), None);

        store
            .set("TestPlugin", PluginStatus::ExecuteOnNextBoot)
            .await
            .unwrap();
        assert_eq!(
            store.get("TestPlugin").await.unwrap(),
            Some(PluginStatus::ExecuteOnNextBoot)
        );

        // Stored under the dedicated section with the opaque encoding
        assert_eq!(
            osutils.value("TestPlugin", PLUGIN_STATUS_SECTION).as_deref(),
            Some("execute-on-next-boot")
        );
    }

    #[tokio::test]
    async fn test_unknown_stored_value_reads_as_absent() {
        let osutils = Arc::new(
            MockOsUtils::new().with_value("TestPlugin", "garbage", PLUGIN_STATUS_SECTION),
        );
        let store = ConfigStatusStore::new(osutils);

        assert_eq!(store.get("TestPlugin").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_read_failure_is_storage_error() {
        let osutils = Arc::new(MockOsUtils::new().with_failing_reads());
        let store = ConfigStatusStore::new(osutils);

        let result = store.get("TestPlugin").await;
        assert!(matches!(result, Err(InitError::Storage(_))));
    }

    #[tokio::test]
    async fn test_write_failure_is_storage_error() {
        let osutils = Arc::new(MockOsUtils::new().with_failing_writes());
        let store = ConfigStatusStore::new(osutils);

        let result = store.set("TestPlugin", PluginStatus::ExecutionDone).await;
        assert!(matches!(result, Err(InitError::Storage(_))));
    }

    #[tokio::test]
    async fn test_in_memory_store() {
        let store = InMemoryStatusStore::new()
            .with_status("Seeded", PluginStatus::ExecutionDone);

        assert_eq!(
            store.get("Seeded").await.unwrap(),
            Some(PluginStatus::ExecutionDone)
        );
        assert_eq!(store.get("Other").await.unwrap(), None);

        store
            .set("Other", PluginStatus::ExecuteOnNextBoot)
            .await
            .unwrap();
        assert_eq!(
            store.status("Other"),
            Some(PluginStatus::ExecuteOnNextBoot)
        );
    }
}
