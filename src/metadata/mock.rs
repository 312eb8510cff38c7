//! Mock metadata service for testing
//!
//! Provides a configurable mock service that records cleanup calls, so tests
//! can assert the engine releases the handle exactly once per run.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::MetadataService;
use crate::InitError;

/// Mock metadata service for testing
///
/// # Example
/// ```
/// use instance_init_rs::metadata::mock::MockMetadataService;
///
/// let mock = MockMetadataService::new()
///     .with_instance_id("i-test-123")
///     .with_user_data(b"#!/bin/sh\ntrue\n".to_vec());
/// ```
#[derive(Default)]
pub struct MockMetadataService {
    instance_id: Option<String>,
    user_data: Vec<u8>,
    instance_id_error: Option<String>,
    user_data_error: Option<String>,
    cleanup_calls: AtomicUsize,
}

impl MockMetadataService {
    /// Create a new mock service with no metadata
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the instance id to return
    pub fn with_instance_id(mut self, instance_id: &str) -> Self {
        self.instance_id = Some(instance_id.to_string());
        self
    }

    /// Set the user data to return
    pub fn with_user_data(mut self, user_data: Vec<u8>) -> Self {
        self.user_data = user_data;
        self
    }

    /// Configure instance id retrieval to fail
    pub fn with_instance_id_error(mut self, error: &str) -> Self {
        self.instance_id_error = Some(error.to_string());
        self
    }

    /// Configure user data retrieval to fail
    pub fn with_user_data_error(mut self, error: &str) -> Self {
        self.user_data_error = Some(error.to_string());
        self
    }

    /// Number of cleanup calls received
    pub fn cleanup_calls(&self) -> usize {
        self.cleanup_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MetadataService for MockMetadataService {
    fn name(&self) -> &'static str {
        "Mock"
    }

    async fn is_available(&self) -> bool {
        true
    }

    async fn get_instance_id(&self) -> Result<Option<String>, InitError> {
        if let Some(error) = &self.instance_id_error {
            return Err(InitError::Metadata(error.clone()));
        }
        Ok(self.instance_id.clone())
    }

    async fn get_user_data(&self) -> Result<Vec<u8>, InitError> {
        if let Some(error) = &self.user_data_error {
            return Err(InitError::Metadata(error.clone()));
        }
        Ok(self.user_data.clone())
    }

    async fn cleanup(&self) -> Result<(), InitError> {
        self.cleanup_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
