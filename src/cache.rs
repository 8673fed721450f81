//! The device/user code cache: the core lifecycle store pairing a
//! [`DeviceCodeRecord`] (keyed by user code) with a [`DeviceStateRecord`]
//! (keyed by device code) on top of a generic key-value storage backend.

use crate::records::{DeviceCodeRecord, DeviceStateRecord, RecordError};
use crate::storage::{now_millis, Storage, StorageBackend, StorageError};
use log::{debug, warn};
use sha2::{Digest, Sha256};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;

/// Storage context (namespace) for pairing records, keyed by user code.
pub const CONTEXT_DEVICE_CODE: &str = "oauth2_device_grant.DEVICE_CODE";

/// Storage context (namespace) for state records, keyed by device code.
pub const CONTEXT_STATE: &str = "oauth2_device_grant.STATE";

/// Errors that can occur during cache operations
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Failed to serialize record: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Failed to parse stored record: {0}")]
    Parse(String),
    #[error("Stored record violates invariants: {0}")]
    Invalid(#[from] RecordError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Cache for storing a [`DeviceCodeRecord`] per user code and the state of
/// the request, a [`DeviceStateRecord`], per device code.
///
/// Every public operation is serialized behind a single async lock: the
/// backing store's `create` is the only atomic primitive available, and the
/// two linked records must be installed as a unit from this process's point
/// of view. Across processes sharing one store, collision safety rests on
/// the store's create-if-absent guarantee alone.
pub struct DeviceCodesCache {
    storage: Storage,
    lock: Mutex<()>,
}

impl DeviceCodesCache {
    /// Wrap a storage backend, first checking that its declared capabilities
    /// can hold the two context names.
    pub fn new(storage: Storage) -> Result<Self, CacheError> {
        let caps = storage.capabilities();
        for context in [CONTEXT_DEVICE_CODE, CONTEXT_STATE] {
            if context.len() > caps.context_size {
                return Err(CacheError::Config(format!(
                    "context {} too long for storage backend ({} > {})",
                    context,
                    context.len(),
                    caps.context_size
                )));
            }
        }
        Ok(Self {
            storage,
            lock: Mutex::new(()),
        })
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    /// Adjusts the key to a smaller size if needed. The original key never
    /// reaches the backend once it exceeds the declared key size, only its
    /// SHA-256 digest does.
    fn adjust_key(&self, key: &str) -> String {
        if key.len() > self.storage.capabilities().key_size {
            format!("{:x}", Sha256::digest(key.as_bytes()))
        } else {
            key.to_string()
        }
    }

    /// Stores a [`DeviceCodeRecord`] keyed by user code and, only if that
    /// succeeds, a fresh PENDING [`DeviceStateRecord`] keyed by device code,
    /// both expiring `ttl` from now.
    ///
    /// Returns `false` without error when either slot is already occupied;
    /// the caller retries with freshly generated codes. When the device-code
    /// create collides, the just-created pairing record is deleted again on
    /// a best-effort basis so the user code is immediately reusable; if that
    /// delete fails the pairing record lingers as an orphan until its TTL.
    pub async fn store_device_code(
        &self,
        record: &DeviceCodeRecord,
        user_code: &str,
        ttl: Duration,
    ) -> Result<bool, CacheError> {
        let _guard = self.lock.lock().await;
        let expires_at = now_millis() + ttl.as_millis() as u64;

        let pairing_key = self.adjust_key(user_code);
        let pairing_value = serde_json::to_string(record)?;
        if !self
            .storage
            .create(CONTEXT_DEVICE_CODE, &pairing_key, &pairing_value, expires_at)
            .await?
        {
            debug!("User code collision for code {}", user_code);
            return Ok(false);
        }

        let state_key = self.adjust_key(&record.device_code);
        let state_value = serde_json::to_string(&DeviceStateRecord::pending())?;
        if !self
            .storage
            .create(CONTEXT_STATE, &state_key, &state_value, expires_at)
            .await?
        {
            debug!("Device code collision for code {}", record.device_code);
            if let Err(err) = self
                .storage
                .delete(CONTEXT_DEVICE_CODE, &pairing_key)
                .await
            {
                warn!(
                    "Failed to roll back pairing record for user code {}: {}",
                    user_code, err
                );
            }
            return Ok(false);
        }
        Ok(true)
    }

    /// Get the [`DeviceCodeRecord`] stored under a user code. `None` when
    /// the code is unknown or expired.
    pub async fn get_device_code(
        &self,
        user_code: &str,
    ) -> Result<Option<DeviceCodeRecord>, CacheError> {
        let _guard = self.lock.lock().await;
        let key = self.adjust_key(user_code);
        let Some(value) = self.storage.read(CONTEXT_DEVICE_CODE, &key).await? else {
            return Ok(None);
        };
        let record: DeviceCodeRecord =
            serde_json::from_str(&value).map_err(|e| CacheError::Parse(e.to_string()))?;
        record.validate()?;
        Ok(Some(record))
    }

    /// Get the [`DeviceStateRecord`] stored under a device code. `None` when
    /// the code is unknown or expired.
    pub async fn get_device_state(
        &self,
        device_code: &str,
    ) -> Result<Option<DeviceStateRecord>, CacheError> {
        let _guard = self.lock.lock().await;
        let key = self.adjust_key(device_code);
        let Some(value) = self.storage.read(CONTEXT_STATE, &key).await? else {
            return Ok(None);
        };
        let record: DeviceStateRecord =
            serde_json::from_str(&value).map_err(|e| CacheError::Parse(e.to_string()))?;
        record.validate()?;
        Ok(Some(record))
    }

    /// Overwrite the [`DeviceStateRecord`] under a device code with a new
    /// expiry `ttl` from now. Returns `false` when there is no record left
    /// to update, which the caller treats as a stale or expired code.
    pub async fn update_device_state(
        &self,
        device_code: &str,
        record: &DeviceStateRecord,
        ttl: Duration,
    ) -> Result<bool, CacheError> {
        let _guard = self.lock.lock().await;
        let expires_at = now_millis() + ttl.as_millis() as u64;
        let key = self.adjust_key(device_code);
        let value = serde_json::to_string(record)?;
        Ok(self
            .storage
            .update(CONTEXT_STATE, &key, &value, expires_at)
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::DeviceState;
    use crate::storage::memory::InMemoryStorage;
    use std::sync::Arc;

    fn test_cache() -> DeviceCodesCache {
        let storage = Storage::InMemory(InMemoryStorage::new(128).unwrap());
        DeviceCodesCache::new(storage).unwrap()
    }

    fn pairing(device_code: &str) -> DeviceCodeRecord {
        DeviceCodeRecord::new(
            device_code.to_string(),
            "rp1".to_string(),
            Some(vec!["x".to_string()]),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_store_and_read_back() {
        let cache = test_cache();
        let record = pairing("DC1");

        assert!(cache
            .store_device_code(&record, "UC1", Duration::from_millis(100_000))
            .await
            .unwrap());

        let read_back = cache.get_device_code("UC1").await.unwrap().unwrap();
        assert_eq!(read_back, record);

        let state = cache.get_device_state("DC1").await.unwrap().unwrap();
        assert_eq!(state, DeviceStateRecord::pending());
    }

    #[tokio::test]
    async fn test_user_code_collision_leaves_records_unchanged() {
        let cache = test_cache();
        let record = pairing("DC1");
        let ttl = Duration::from_millis(100_000);

        assert!(cache.store_device_code(&record, "UC1", ttl).await.unwrap());

        let other = pairing("DC2");
        assert!(!cache.store_device_code(&other, "UC1", ttl).await.unwrap());

        // Both original records survive, and no state was created for DC2
        assert_eq!(
            cache.get_device_code("UC1").await.unwrap().unwrap(),
            record
        );
        assert_eq!(
            cache
                .get_device_state("DC1")
                .await
                .unwrap()
                .unwrap()
                .state,
            DeviceState::Pending
        );
        assert!(cache.get_device_state("DC2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_device_code_collision_rolls_back_pairing() {
        let cache = test_cache();
        let ttl = Duration::from_millis(100_000);

        assert!(cache
            .store_device_code(&pairing("DC1"), "UC1", ttl)
            .await
            .unwrap());
        // Same device code under a fresh user code collides on the state slot
        assert!(!cache
            .store_device_code(&pairing("DC1"), "UC2", ttl)
            .await
            .unwrap());
        // The rolled-back user code slot is free for immediate reuse
        assert!(cache.get_device_code("UC2").await.unwrap().is_none());
        assert!(cache
            .store_device_code(&pairing("DC3"), "UC2", ttl)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_expired_records_are_gone() {
        let cache = test_cache();

        assert!(cache
            .store_device_code(&pairing("DC1"), "UC1", Duration::from_millis(1))
            .await
            .unwrap());
        tokio::time::sleep(Duration::from_millis(5)).await;

        assert!(cache.get_device_code("UC1").await.unwrap().is_none());
        assert!(cache.get_device_state("DC1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_device_state() {
        let cache = test_cache();
        let ttl = Duration::from_millis(100_000);

        assert!(cache
            .store_device_code(&pairing("DC1"), "UC1", ttl)
            .await
            .unwrap());

        let approved = DeviceStateRecord::approved("tok123".to_string(), now_millis() + 60_000);
        assert!(cache
            .update_device_state("DC1", &approved, ttl)
            .await
            .unwrap());
        assert_eq!(
            cache.get_device_state("DC1").await.unwrap().unwrap(),
            approved
        );
    }

    #[tokio::test]
    async fn test_update_missing_state_returns_false() {
        let cache = test_cache();
        assert!(!cache
            .update_device_state(
                "DC_MISSING",
                &DeviceStateRecord::denied(),
                Duration::from_millis(100_000)
            )
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_long_keys_are_hashed() {
        let cache = test_cache();
        let ttl = Duration::from_millis(100_000);
        // Longer than the memory backend's declared 255-byte key size
        let long_user_code = "U".repeat(300);
        let long_device_code = "D".repeat(300);

        let record = DeviceCodeRecord::new(
            long_device_code.clone(),
            "rp1".to_string(),
            None,
        )
        .unwrap();
        assert!(cache
            .store_device_code(&record, &long_user_code, ttl)
            .await
            .unwrap());
        assert_eq!(
            cache
                .get_device_code(&long_user_code)
                .await
                .unwrap()
                .unwrap(),
            record
        );
        assert_eq!(
            cache
                .get_device_state(&long_device_code)
                .await
                .unwrap()
                .unwrap(),
            DeviceStateRecord::pending()
        );
    }

    #[tokio::test]
    async fn test_corrupt_state_record_is_a_parse_error() {
        let cache = test_cache();
        let key = "DC1";
        cache
            .storage()
            .create(
                CONTEXT_STATE,
                key,
                "not json",
                now_millis() + 60_000,
            )
            .await
            .unwrap();
        assert!(matches!(
            cache.get_device_state(key).await,
            Err(CacheError::Parse(_))
        ));
    }

    #[tokio::test]
    async fn test_decoded_state_record_invariants_enforced() {
        let cache = test_cache();
        let key = "DC1";
        // APPROVED without a token must not decode successfully
        cache
            .storage()
            .create(
                CONTEXT_STATE,
                key,
                r#"{"state":"APPROVED"}"#,
                now_millis() + 60_000,
            )
            .await
            .unwrap();
        assert!(matches!(
            cache.get_device_state(key).await,
            Err(CacheError::Invalid(RecordError::MissingAccessToken))
        ));
    }

    #[tokio::test]
    async fn test_decoded_pairing_record_invariants_enforced() {
        let cache = test_cache();
        let key = "UC1";
        // A pairing record with empty fields decodes but must not be served
        cache
            .storage()
            .create(
                CONTEXT_DEVICE_CODE,
                key,
                r#"{"device_code":"","client_id":""}"#,
                now_millis() + 60_000,
            )
            .await
            .unwrap();
        assert!(matches!(
            cache.get_device_code(key).await,
            Err(CacheError::Invalid(RecordError::EmptyDeviceCode))
        ));
    }

    #[tokio::test]
    async fn test_concurrent_store_same_user_code_single_winner() {
        let cache = Arc::new(test_cache());
        let ttl = Duration::from_millis(100_000);

        let mut handles = vec![];
        for i in 0..8 {
            let cache = cache.clone();
            handles.push(tokio::spawn(async move {
                cache
                    .store_device_code(&pairing(&format!("DC{}", i)), "UC1", ttl)
                    .await
                    .unwrap()
            }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1, "exactly one concurrent store may succeed");

        // The winning pairing record has a matching PENDING state record
        let stored = cache.get_device_code("UC1").await.unwrap().unwrap();
        assert_eq!(
            cache
                .get_device_state(&stored.device_code)
                .await
                .unwrap()
                .unwrap(),
            DeviceStateRecord::pending()
        );
    }
}
