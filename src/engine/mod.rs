//! Orchestration engine
//!
//! [`InitManager`] drives one provisioning run: wait for boot readiness,
//! walk the ordered plugin list against the metadata service, then reboot or
//! terminate. Plugins whose persisted status is done are skipped; a failing
//! plugin is logged and retried on the next boot without aborting the run;
//! the metadata service is released on every exit path.

pub mod status;

pub use status::{
    ConfigStatusStore, InMemoryStatusStore, PLUGIN_STATUS_SECTION, PluginStatusStore,
};

use std::sync::Arc;
use tracing::{debug, error, info};

use crate::InitError;
use crate::metadata::MetadataService;
use crate::osutils::OsUtils;
use crate::plugins::{Plugin, PluginStatus};

/// The provisioning orchestrator
pub struct InitManager {
    osutils: Arc<dyn OsUtils>,
    status: Arc<dyn PluginStatusStore>,
}

impl InitManager {
    pub fn new(osutils: Arc<dyn OsUtils>, status: Arc<dyn PluginStatusStore>) -> Self {
        Self { osutils, status }
    }

    /// Execute one provisioning run
    ///
    /// The terminal action is a side effect: a reboot request when any
    /// executed plugin voted for one, an orderly terminate otherwise. Only
    /// status-storage failures abort the run; they propagate to the caller
    /// after the metadata service has been released.
    pub async fn run(
        &self,
        service: &dyn MetadataService,
        plugins: &[Box<dyn Plugin>],
    ) -> Result<(), InitError> {
        self.osutils.wait_for_boot_completion().await?;

        info!("Metadata service loaded: '{}'", service.name());

        // Capture the loop result, always release the service, then let the
        // result propagate
        let loop_result = self.execute_plugins(service, plugins).await;
        if let Err(e) = service.cleanup().await {
            error!("Metadata service cleanup failed with error '{}'", e);
        }
        let reboot_required = loop_result?;

        if reboot_required {
            // A failed reboot request must not crash the agent
            if let Err(e) = self.osutils.reboot().await {
                error!("Reboot failed with error '{}'", e);
            }
        } else {
            self.osutils.terminate().await?;
        }

        Ok(())
    }

    /// Walk the plugin list in order, aggregating reboot votes
    async fn execute_plugins(
        &self,
        service: &dyn MetadataService,
        plugins: &[Box<dyn Plugin>],
    ) -> Result<bool, InitError> {
        let mut reboot_required = false;

        for plugin in plugins {
            if self.execute_plugin(service, plugin.as_ref()).await? {
                reboot_required = true;
            }
        }

        Ok(reboot_required)
    }

    /// Run one plugin if it is due; true when it voted for a reboot
    ///
    /// This is the failure-isolation boundary: a plugin error is logged with
    /// the plugin's identity, no status is recorded (so the plugin is
    /// retried next boot), no reboot vote is counted, and the run continues.
    async fn execute_plugin(
        &self,
        service: &dyn MetadataService,
        plugin: &dyn Plugin,
    ) -> Result<bool, InitError> {
        let plugin_name = plugin.name();

        if self.status.get(plugin_name).await? == Some(PluginStatus::ExecutionDone) {
            debug!("Plugin '{}' execution already done, skipping", plugin_name);
            return Ok(false);
        }

        info!("Executing plugin '{}'", plugin_name);
        match plugin.execute(service).await {
            Ok(outcome) => {
                self.status.set(plugin_name, outcome.status).await?;
                Ok(outcome.reboot_required)
            }
            Err(e) => {
                error!("Plugin '{}' failed with error '{}'", plugin_name, e);
                Ok(false)
            }
        }
    }
}
