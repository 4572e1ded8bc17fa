use std::time::Duration;

use async_trait::async_trait;

use crate::errors::AppError;

pub mod memory;
pub mod redis;

/// The key-value substrate behind all persistence.
///
/// Every write carries a time-to-live; an absent key on `get` is a normal
/// outcome (expired, evicted, or never written), not an error. `list_keys`
/// walks the keyspace under a prefix with no ordering guarantee.
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, AppError>;
    async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<(), AppError>;
    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, AppError>;
}
