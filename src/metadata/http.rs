//! HTTP metadata service
//!
//! Fetches instance identity and user data from a link-local instance
//! metadata endpoint (IMDS-style).

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::debug;

use super::MetadataService;
use crate::InitError;

/// Default metadata endpoint (link-local address)
pub const DEFAULT_BASE_URL: &str = "http://169.254.169.254";

/// HTTP metadata service for IMDS-compatible clouds
pub struct HttpMetadataService {
    client: Client,
    base_url: String,
}

impl HttpMetadataService {
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    /// Create against a specific endpoint (configuration or tests)
    pub fn with_base_url(base_url: &str) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(5))
            .connect_timeout(Duration::from_secs(2))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Fetch a metadata path, `None` on 404
    async fn fetch(&self, path: &str) -> Result<Option<Vec<u8>>, InitError> {
        let url = format!("{}/{}", self.base_url, path);
        let response = self.client.get(&url).send().await?;

        match response.status() {
            StatusCode::NOT_FOUND => {
                debug!("Metadata path not present: {}", path);
                Ok(None)
            }
            status if status.is_success() => Ok(Some(response.bytes().await?.to_vec())),
            status => Err(InitError::Metadata(format!(
                "failed to fetch {path}: {status}"
            ))),
        }
    }
}

impl Default for HttpMetadataService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MetadataService for HttpMetadataService {
    fn name(&self) -> &'static str {
        "HTTP"
    }

    async fn is_available(&self) -> bool {
        let url = format!("{}/latest/meta-data/", self.base_url);
        match self.client.get(&url).send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }

    async fn get_instance_id(&self) -> Result<Option<String>, InitError> {
        let Some(bytes) = self.fetch("latest/meta-data/instance-id").await? else {
            return Ok(None);
        };

        let id = String::from_utf8_lossy(&bytes).trim().to_string();
        Ok((!id.is_empty()).then_some(id))
    }

    async fn get_user_data(&self) -> Result<Vec<u8>, InitError> {
        Ok(self
            .fetch("latest/user-data")
            .await?
            .unwrap_or_default())
    }

    async fn cleanup(&self) -> Result<(), InitError> {
        // Nothing held open between requests
        debug!("Releasing HTTP metadata service");
        Ok(())
    }
}
