//! Mock OS layer for testing
//!
//! Provides a configurable in-memory [`OsUtils`] that records the terminal
//! actions the engine takes, so tests can assert on reboot/terminate calls
//! without touching the host.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::OsUtils;
use crate::InitError;

/// Mock OS layer for testing
///
/// # Example
/// ```
/// use instance_init_rs::osutils::mock::MockOsUtils;
///
/// let mock = MockOsUtils::new().with_value("TestPlugin", "execution-done", "plugins");
/// ```
#[derive(Default)]
pub struct MockOsUtils {
    values: Mutex<HashMap<(String, String), String>>,
    boot_waits: AtomicUsize,
    reboot_calls: AtomicUsize,
    terminate_calls: AtomicUsize,
    fail_reads: bool,
    fail_writes: bool,
    fail_reboot: bool,
}

impl MockOsUtils {
    /// Create a new mock OS layer with no stored values
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a stored config value
    pub fn with_value(self, key: &str, value: &str, section: &str) -> Self {
        self.values
            .lock()
            .unwrap()
            .insert((section.to_string(), key.to_string()), value.to_string());
        self
    }

    /// Configure every config read to fail
    pub fn with_failing_reads(mut self) -> Self {
        self.fail_reads = true;
        self
    }

    /// Configure every config write to fail
    pub fn with_failing_writes(mut self) -> Self {
        self.fail_writes = true;
        self
    }

    /// Configure the reboot request to fail
    pub fn with_failing_reboot(mut self) -> Self {
        self.fail_reboot = true;
        self
    }

    /// Stored value for a key, if any
    pub fn value(&self, key: &str, section: &str) -> Option<String> {
        self.values
            .lock()
            .unwrap()
            .get(&(section.to_string(), key.to_string()))
            .cloned()
    }

    /// Number of boot-completion waits performed
    pub fn boot_waits(&self) -> usize {
        self.boot_waits.load(Ordering::SeqCst)
    }

    /// Number of reboot requests received
    pub fn reboot_calls(&self) -> usize {
        self.reboot_calls.load(Ordering::SeqCst)
    }

    /// Number of terminate requests received
    pub fn terminate_calls(&self) -> usize {
        self.terminate_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OsUtils for MockOsUtils {
    async fn wait_for_boot_completion(&self) -> Result<(), InitError> {
        self.boot_waits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn get_config_value(
        &self,
        key: &str,
        section: &str,
    ) -> Result<Option<String>, InitError> {
        if self.fail_reads {
            return Err(InitError::storage("mock read failure"));
        }
        Ok(self.value(key, section))
    }

    async fn set_config_value(
        &self,
        key: &str,
        value: &str,
        section: &str,
    ) -> Result<(), InitError> {
        if self.fail_writes {
            return Err(InitError::storage("mock write failure"));
        }
        self.values
            .lock()
            .unwrap()
            .insert((section.to_string(), key.to_string()), value.to_string());
        Ok(())
    }

    async fn reboot(&self) -> Result<(), InitError> {
        self.reboot_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_reboot {
            return Err(InitError::Command("mock reboot failure".to_string()));
        }
        Ok(())
    }

    async fn terminate(&self) -> Result<(), InitError> {
        self.terminate_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
