use super::{StorageBackend, StorageCapabilities, StorageError};
use async_trait::async_trait;
use log::error;
use redis::{aio::ConnectionManager, AsyncCommands, Client};

/// Redis accepts far larger keys, but the declared limit keeps record keys
/// short enough to stay readable in diagnostics. Longer keys are hashed by
/// the caller before reaching this backend.
const REDIS_CAPABILITIES: StorageCapabilities = StorageCapabilities {
    context_size: 255,
    key_size: 255,
};

#[derive(Clone)]
pub struct RedisStorage {
    _client: Client,
    conn_manager: ConnectionManager,
}

impl RedisStorage {
    /// Initialize a new Redis storage instance
    pub async fn new(redis_url: &str) -> Result<Self, String> {
        let client = match Client::open(redis_url) {
            Ok(client) => client,
            Err(err) => {
                return Err(format!("Failed to connect to Redis: {}", err));
            }
        };

        let conn_manager = match ConnectionManager::new(client.clone()).await {
            Ok(manager) => manager,
            Err(err) => {
                return Err(format!(
                    "Failed to create Redis connection manager: {}",
                    err
                ));
            }
        };

        // Test the connection to ensure it's working
        let mut conn = conn_manager.clone();
        if let Err(err) = redis::cmd("PING").query_async::<String>(&mut conn).await {
            return Err(format!("Failed to ping Redis: {}", err));
        }

        Ok(Self {
            conn_manager,
            _client: client,
        })
    }

    fn record_key(context: &str, key: &str) -> String {
        format!("{}:{}", context, key)
    }
}

#[async_trait]
impl StorageBackend for RedisStorage {
    fn capabilities(&self) -> StorageCapabilities {
        REDIS_CAPABILITIES
    }

    async fn create(
        &self,
        context: &str,
        key: &str,
        value: &str,
        expires_at: u64,
    ) -> Result<bool, StorageError> {
        let record_key = Self::record_key(context, key);
        let mut conn = self.conn_manager.clone();

        // SET NX is the atomic create-if-absent primitive; PXAT carries the
        // absolute expiry so clock ownership stays with this process.
        match redis::cmd("SET")
            .arg(&record_key)
            .arg(value)
            .arg("NX")
            .arg("PXAT")
            .arg(expires_at)
            .query_async::<Option<String>>(&mut conn)
            .await
        {
            Ok(reply) => Ok(reply.is_some()),
            Err(err) => {
                error!("Redis error while creating key {}: {}", record_key, err);
                Err(StorageError::Redis(err.to_string()))
            }
        }
    }

    async fn read(&self, context: &str, key: &str) -> Result<Option<String>, StorageError> {
        let record_key = Self::record_key(context, key);
        let mut conn = self.conn_manager.clone();

        match conn.get::<_, Option<String>>(&record_key).await {
            Ok(value) => Ok(value),
            Err(err) => {
                if err.kind() == redis::ErrorKind::TypeError {
                    // Key doesn't exist
                    return Ok(None);
                }
                error!("Redis error while reading key {}: {}", record_key, err);
                Err(StorageError::Redis(err.to_string()))
            }
        }
    }

    async fn update(
        &self,
        context: &str,
        key: &str,
        value: &str,
        expires_at: u64,
    ) -> Result<bool, StorageError> {
        let record_key = Self::record_key(context, key);
        let mut conn = self.conn_manager.clone();

        // SET XX only succeeds against an existing, unexpired record.
        match redis::cmd("SET")
            .arg(&record_key)
            .arg(value)
            .arg("XX")
            .arg("PXAT")
            .arg(expires_at)
            .query_async::<Option<String>>(&mut conn)
            .await
        {
            Ok(reply) => Ok(reply.is_some()),
            Err(err) => {
                error!("Redis error while updating key {}: {}", record_key, err);
                Err(StorageError::Redis(err.to_string()))
            }
        }
    }

    async fn delete(&self, context: &str, key: &str) -> Result<bool, StorageError> {
        let record_key = Self::record_key(context, key);
        let mut conn = self.conn_manager.clone();

        match conn.del::<_, i64>(&record_key).await {
            Ok(removed) => Ok(removed > 0),
            Err(err) => {
                error!("Redis error while deleting key {}: {}", record_key, err);
                Err(StorageError::Redis(err.to_string()))
            }
        }
    }

    async fn health_check(&self) -> Result<(), String> {
        let mut conn = self.conn_manager.clone();
        match redis::cmd("PING").query_async::<String>(&mut conn).await {
            Ok(_) => Ok(()),
            Err(err) => Err(format!("Redis health check failed: {}", err)),
        }
    }
}
