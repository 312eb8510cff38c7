//! Metadata service implementations
//!
//! Metadata services provide the instance identity and user-supplied
//! configuration payload the plugins consume. The agent resolves one service
//! per run, holds it for the duration of the plugin loop, and releases it
//! with [`MetadataService::cleanup`] on every exit path.

pub mod configdrive;
pub mod http;
pub mod mock;

pub use configdrive::ConfigDriveService;
pub use http::HttpMetadataService;

use async_trait::async_trait;

use crate::InitError;
use crate::config::AgentConfig;

/// Capability surface of a resolved metadata service
///
/// Plugins may read through the service but must not release or reconfigure
/// it; the engine is the sole caller of [`cleanup`](Self::cleanup).
#[async_trait]
pub trait MetadataService: Send + Sync {
    /// Name of this service (e.g., "HTTP", "ConfigDrive")
    fn name(&self) -> &'static str;

    /// Check if this service is available
    ///
    /// This should be a quick check (e.g., probing for seed files or a
    /// single HTTP request with a short timeout).
    async fn is_available(&self) -> bool;

    /// Instance identity, `None` when the platform has not assigned one yet
    async fn get_instance_id(&self) -> Result<Option<String>, InitError>;

    /// Raw user-supplied data, empty when the instance has none
    async fn get_user_data(&self) -> Result<Vec<u8>, InitError>;

    /// Release the service
    ///
    /// Called exactly once per run, after the plugin loop, regardless of how
    /// the loop terminated.
    async fn cleanup(&self) -> Result<(), InitError>;
}

/// Detect and return the metadata service for this instance
///
/// Services are probed in priority order; local sources win over the network.
pub async fn detect_service(
    config: &AgentConfig,
) -> Result<Box<dyn MetadataService>, InitError> {
    let services: Vec<Box<dyn MetadataService>> = vec![
        Box::new(ConfigDriveService::with_seed_dirs(&config.metadata.seed_dirs)),
        Box::new(HttpMetadataService::with_base_url(
            &config.metadata.base_url,
        )),
    ];

    for service in services {
        if service.is_available().await {
            tracing::info!("Detected metadata service: {}", service.name());
            return Ok(service);
        }
    }

    Err(InitError::NoMetadataService)
}
