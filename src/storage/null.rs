use super::{StorageBackend, StorageCapabilities, StorageError};
use async_trait::async_trait;

/// NullStorage is a storage implementation that retains nothing.
/// Every code issued against it is immediately unreachable, which makes it
/// useful for wiring tests that never read back and for disabled deployments.
#[derive(Clone, Debug)]
pub struct NullStorage;

impl NullStorage {
    /// Create a new NullStorage instance
    pub fn new() -> Self {
        NullStorage
    }
}

impl Default for NullStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StorageBackend for NullStorage {
    fn capabilities(&self) -> StorageCapabilities {
        StorageCapabilities {
            context_size: usize::MAX,
            key_size: usize::MAX,
        }
    }

    async fn create(
        &self,
        _context: &str,
        _key: &str,
        _value: &str,
        _expires_at: u64,
    ) -> Result<bool, StorageError> {
        // Accept the record and forget it
        Ok(true)
    }

    async fn read(&self, _context: &str, _key: &str) -> Result<Option<String>, StorageError> {
        // Always return None
        Ok(None)
    }

    async fn update(
        &self,
        _context: &str,
        _key: &str,
        _value: &str,
        _expires_at: u64,
    ) -> Result<bool, StorageError> {
        // Nothing is ever present to update
        Ok(false)
    }

    async fn delete(&self, _context: &str, _key: &str) -> Result<bool, StorageError> {
        Ok(false)
    }

    async fn health_check(&self) -> Result<(), String> {
        // NullStorage is always healthy as it doesn't interact with any external systems
        Ok(())
    }
}
