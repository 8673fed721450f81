use super::{now_millis, StorageBackend, StorageCapabilities, StorageError};
use async_trait::async_trait;
use moka::future::Cache as MokaCache;
use moka::Expiry;
use std::time::{Duration, Instant};

/// Limits mirroring a typical server-side memory store.
const MEMORY_CAPABILITIES: StorageCapabilities = StorageCapabilities {
    context_size: 255,
    key_size: 255,
};

#[derive(Clone, Debug)]
struct StoredRecord {
    value: String,
    /// Absolute expiry, epoch milliseconds.
    expires_at: u64,
}

impl StoredRecord {
    fn remaining(&self) -> Duration {
        Duration::from_millis(self.expires_at.saturating_sub(now_millis()))
    }

    fn is_expired(&self) -> bool {
        self.expires_at <= now_millis()
    }
}

/// Per-record expiry policy: every record carries its own absolute
/// expiration instant rather than sharing a cache-wide TTL.
struct RecordExpiry;

impl Expiry<(String, String), StoredRecord> for RecordExpiry {
    fn expire_after_create(
        &self,
        _key: &(String, String),
        value: &StoredRecord,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.remaining())
    }

    fn expire_after_update(
        &self,
        _key: &(String, String),
        value: &StoredRecord,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.remaining())
    }
}

#[derive(Clone)]
pub struct InMemoryStorage {
    cache: MokaCache<(String, String), StoredRecord>,
}

impl InMemoryStorage {
    /// Initialize a new in-memory storage instance
    pub fn new(capacity_mib: usize) -> Result<Self, String> {
        // Convert MiB to bytes for max_capacity (1 MiB = 1024 * 1024 bytes)
        let max_capacity_bytes: u64 = (capacity_mib * 1024 * 1024)
            .try_into()
            .map_err(|_| "Capacity overflow".to_string())?;

        let cache = MokaCache::builder()
            .expire_after(RecordExpiry)
            .weigher(|_key, record: &StoredRecord| -> u32 {
                record.value.len().try_into().unwrap_or(u32::MAX)
            })
            .max_capacity(max_capacity_bytes)
            .build();

        Ok(Self { cache })
    }

    /// Read a record, treating anything past its expiry as absent. Moka
    /// evicts on its own schedule; the explicit check keeps reads exact.
    async fn read_live(&self, context: &str, key: &str) -> Option<StoredRecord> {
        self.cache
            .get(&(context.to_string(), key.to_string()))
            .await
            .filter(|record| !record.is_expired())
    }
}

#[async_trait]
impl StorageBackend for InMemoryStorage {
    fn capabilities(&self) -> StorageCapabilities {
        MEMORY_CAPABILITIES
    }

    async fn create(
        &self,
        context: &str,
        key: &str,
        value: &str,
        expires_at: u64,
    ) -> Result<bool, StorageError> {
        let cache_key = (context.to_string(), key.to_string());
        if let Some(existing) = self.cache.get(&cache_key).await {
            if existing.is_expired() {
                self.cache.remove(&cache_key).await;
            }
        }
        let entry = self
            .cache
            .entry(cache_key)
            .or_insert_with(async {
                StoredRecord {
                    value: value.to_string(),
                    expires_at,
                }
            })
            .await;
        Ok(entry.is_fresh())
    }

    async fn read(&self, context: &str, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self
            .read_live(context, key)
            .await
            .map(|record| record.value))
    }

    async fn update(
        &self,
        context: &str,
        key: &str,
        value: &str,
        expires_at: u64,
    ) -> Result<bool, StorageError> {
        if self.read_live(context, key).await.is_none() {
            return Ok(false);
        }
        self.cache
            .insert(
                (context.to_string(), key.to_string()),
                StoredRecord {
                    value: value.to_string(),
                    expires_at,
                },
            )
            .await;
        Ok(true)
    }

    async fn delete(&self, context: &str, key: &str) -> Result<bool, StorageError> {
        let removed = self
            .cache
            .remove(&(context.to_string(), key.to_string()))
            .await;
        Ok(removed.is_some())
    }

    async fn health_check(&self) -> Result<(), String> {
        Ok(())
    }
}
