//! Config-drive metadata service
//!
//! Reads instance identity and user data from local seed files, typically a
//! mounted configuration drive or a seeded state directory. Common locations:
//! - /var/lib/instance-init/seed/
//! - /media/configdrive/

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tokio::fs;
use tracing::debug;

use super::MetadataService;
use crate::InitError;

/// Metadata service backed by local seed files
pub struct ConfigDriveService {
    seed_dirs: Vec<PathBuf>,
    // Seed dir resolved on first access, dropped again by cleanup()
    resolved: Mutex<Option<PathBuf>>,
}

impl ConfigDriveService {
    pub fn new() -> Self {
        Self::with_seed_dirs(&[
            PathBuf::from("/var/lib/instance-init/seed"),
            PathBuf::from("/media/configdrive"),
        ])
    }

    /// Create with explicit seed directories (configuration or tests)
    pub fn with_seed_dirs(seed_dirs: &[PathBuf]) -> Self {
        Self {
            seed_dirs: seed_dirs.to_vec(),
            resolved: Mutex::new(None),
        }
    }

    /// Find the seed directory containing an instance-id file
    async fn find_seed_dir(&self) -> Option<PathBuf> {
        if let Some(dir) = self.resolved.lock().unwrap().clone() {
            return Some(dir);
        }

        for dir in &self.seed_dirs {
            if fs::metadata(dir.join("instance-id")).await.is_ok() {
                debug!("Using config drive seed directory {:?}", dir);
                *self.resolved.lock().unwrap() = Some(dir.clone());
                return Some(dir.clone());
            }
        }

        None
    }

    async fn read_file(&self, seed_dir: &Path, filename: &str) -> Option<Vec<u8>> {
        fs::read(seed_dir.join(filename)).await.ok()
    }
}

impl Default for ConfigDriveService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MetadataService for ConfigDriveService {
    fn name(&self) -> &'static str {
        "ConfigDrive"
    }

    async fn is_available(&self) -> bool {
        self.find_seed_dir().await.is_some()
    }

    async fn get_instance_id(&self) -> Result<Option<String>, InitError> {
        let seed_dir = self.find_seed_dir().await.ok_or_else(|| {
            InitError::Metadata("config drive seed directory not found".into())
        })?;

        match self.read_file(&seed_dir, "instance-id").await {
            Some(bytes) => {
                let id = String::from_utf8_lossy(&bytes).trim().to_string();
                Ok((!id.is_empty()).then_some(id))
            }
            None => Ok(None),
        }
    }

    async fn get_user_data(&self) -> Result<Vec<u8>, InitError> {
        let seed_dir = self.find_seed_dir().await.ok_or_else(|| {
            InitError::Metadata("config drive seed directory not found".into())
        })?;

        Ok(self
            .read_file(&seed_dir, "user-data")
            .await
            .unwrap_or_default())
    }

    async fn cleanup(&self) -> Result<(), InitError> {
        debug!("Releasing config drive metadata service");
        *self.resolved.lock().unwrap() = None;
        Ok(())
    }
}
