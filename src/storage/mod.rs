use async_trait::async_trait;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

pub mod memory;
pub mod null;
pub mod redis;

/// Errors that can occur while talking to a storage backend
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Redis error: {0}")]
    Redis(String),
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Size limits a storage backend declares for the namespaces and keys it
/// accepts. Callers must adapt anything longer before handing it over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageCapabilities {
    /// Maximum length of a context (namespace) name, in bytes.
    pub context_size: usize,
    /// Maximum length of a record key, in bytes.
    pub key_size: usize,
}

/// Contract for a durable key-value store with per-record absolute expiry.
///
/// Records live under a `(context, key)` pair. `create` is the only atomic
/// primitive: it fails (returns `false`) when the key is already present and
/// unexpired in that context. Expired records are indistinguishable from
/// records that never existed.
///
/// Implementations must be thread-safe (Send + Sync) and cloneable so they
/// can be shared across request handlers.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Declared size limits of this backend.
    fn capabilities(&self) -> StorageCapabilities;

    /// Insert a record if and only if the key is absent in the context.
    /// Returns `false` when the slot is already occupied.
    async fn create(
        &self,
        context: &str,
        key: &str,
        value: &str,
        expires_at: u64,
    ) -> Result<bool, StorageError>;

    /// Read a record. Returns `None` when the key is absent or expired.
    async fn read(&self, context: &str, key: &str) -> Result<Option<String>, StorageError>;

    /// Overwrite an existing record with a new value and expiry.
    /// Returns `false` when there is nothing to update.
    async fn update(
        &self,
        context: &str,
        key: &str,
        value: &str,
        expires_at: u64,
    ) -> Result<bool, StorageError>;

    /// Remove a record. Returns `false` when the key was already absent.
    async fn delete(&self, context: &str, key: &str) -> Result<bool, StorageError>;

    /// Performs a deep health check on the storage backend.
    ///
    /// For Redis this pings the server; for the memory backend this checks
    /// the cache is initialized. Returns Ok(()) if healthy, or Err with a
    /// descriptive message if unhealthy.
    async fn health_check(&self) -> Result<(), String>;
}

/// Storage implementation that provides a uniform interface regardless of
/// backend.
///
/// The concrete implementation is chosen at deployment time; handlers only
/// ever see this enum.
#[derive(Clone)]
pub enum Storage {
    /// In-memory backend using Moka, for single-process deployments and tests
    InMemory(memory::InMemoryStorage),
    /// Redis-based backend for deployments sharing state across processes
    Redis(redis::RedisStorage),
    /// No-op backend that never retains anything
    Null(null::NullStorage),
}

#[async_trait]
impl StorageBackend for Storage {
    fn capabilities(&self) -> StorageCapabilities {
        match self {
            Self::InMemory(storage) => storage.capabilities(),
            Self::Redis(storage) => storage.capabilities(),
            Self::Null(storage) => storage.capabilities(),
        }
    }

    async fn create(
        &self,
        context: &str,
        key: &str,
        value: &str,
        expires_at: u64,
    ) -> Result<bool, StorageError> {
        match self {
            Self::InMemory(storage) => storage.create(context, key, value, expires_at).await,
            Self::Redis(storage) => storage.create(context, key, value, expires_at).await,
            Self::Null(storage) => storage.create(context, key, value, expires_at).await,
        }
    }

    async fn read(&self, context: &str, key: &str) -> Result<Option<String>, StorageError> {
        match self {
            Self::InMemory(storage) => storage.read(context, key).await,
            Self::Redis(storage) => storage.read(context, key).await,
            Self::Null(storage) => storage.read(context, key).await,
        }
    }

    async fn update(
        &self,
        context: &str,
        key: &str,
        value: &str,
        expires_at: u64,
    ) -> Result<bool, StorageError> {
        match self {
            Self::InMemory(storage) => storage.update(context, key, value, expires_at).await,
            Self::Redis(storage) => storage.update(context, key, value, expires_at).await,
            Self::Null(storage) => storage.update(context, key, value, expires_at).await,
        }
    }

    async fn delete(&self, context: &str, key: &str) -> Result<bool, StorageError> {
        match self {
            Self::InMemory(storage) => storage.delete(context, key).await,
            Self::Redis(storage) => storage.delete(context, key).await,
            Self::Null(storage) => storage.delete(context, key).await,
        }
    }

    async fn health_check(&self) -> Result<(), String> {
        match self {
            Self::InMemory(storage) => storage.health_check().await,
            Self::Redis(storage) => storage.health_check().await,
            Self::Null(storage) => storage.health_check().await,
        }
    }
}

/// Current time as milliseconds since the Unix epoch. Record expiry is
/// expressed on this clock.
pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::storage::memory::InMemoryStorage;

    #[tokio::test]
    async fn test_storage_basic_operations() {
        let storage = Storage::InMemory(InMemoryStorage::new(128).expect("Failed to create storage"));
        let expires_at = now_millis() + 60_000;

        assert!(storage
            .create("ctx", "key1", "value1", expires_at)
            .await
            .unwrap());
        assert_eq!(
            storage.read("ctx", "key1").await.unwrap(),
            Some("value1".to_string())
        );

        // Second create against the same slot is a collision
        assert!(!storage
            .create("ctx", "key1", "value2", expires_at)
            .await
            .unwrap());
        assert_eq!(
            storage.read("ctx", "key1").await.unwrap(),
            Some("value1".to_string())
        );

        // Same key in another context is a separate record
        assert!(storage
            .create("other", "key1", "value3", expires_at)
            .await
            .unwrap());
        assert_eq!(
            storage.read("other", "key1").await.unwrap(),
            Some("value3".to_string())
        );

        assert!(storage.delete("ctx", "key1").await.unwrap());
        assert_eq!(storage.read("ctx", "key1").await.unwrap(), None);
        assert!(!storage.delete("ctx", "key1").await.unwrap());
    }

    #[tokio::test]
    async fn test_storage_update_requires_existing_record() {
        let storage = Storage::InMemory(InMemoryStorage::new(128).expect("Failed to create storage"));
        let expires_at = now_millis() + 60_000;

        assert!(!storage
            .update("ctx", "missing", "value", expires_at)
            .await
            .unwrap());

        assert!(storage
            .create("ctx", "key1", "value1", expires_at)
            .await
            .unwrap());
        assert!(storage
            .update("ctx", "key1", "value2", expires_at)
            .await
            .unwrap());
        assert_eq!(
            storage.read("ctx", "key1").await.unwrap(),
            Some("value2".to_string())
        );
    }
}
