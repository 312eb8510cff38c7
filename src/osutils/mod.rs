//! OS abstraction layer
//!
//! Everything the agent asks of the operating system goes through the
//! [`OsUtils`] trait: waiting for boot readiness, persisting configuration
//! values, and the terminal reboot/terminate actions. The engine only ever
//! sees this capability surface, so tests can swap in [`mock::MockOsUtils`].

pub mod linux;
pub mod mock;
pub mod paths;

pub use linux::LinuxOsUtils;
pub use paths::AgentPaths;

use async_trait::async_trait;

use crate::InitError;

/// Capability surface the agent consumes from the operating system
#[async_trait]
pub trait OsUtils: Send + Sync {
    /// Block until the OS reports boot completion readiness
    ///
    /// No timeout is imposed at this layer; callers rely on the OS (or the
    /// service manager supervising the agent) to bound the wait.
    async fn wait_for_boot_completion(&self) -> Result<(), InitError>;

    /// Read a persisted configuration value, `None` if it was never written
    async fn get_config_value(
        &self,
        key: &str,
        section: &str,
    ) -> Result<Option<String>, InitError>;

    /// Persist a configuration value under the given section
    async fn set_config_value(
        &self,
        key: &str,
        value: &str,
        section: &str,
    ) -> Result<(), InitError>;

    /// Request a system reboot
    async fn reboot(&self) -> Result<(), InitError>;

    /// Request orderly termination of the agent
    async fn terminate(&self) -> Result<(), InitError>;
}
