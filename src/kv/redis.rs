use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;

use crate::{errors::AppError, kv::KvStore};

/// Redis-backed substrate. Values are plain strings written with `SET EX`;
/// prefix listing uses `SCAN MATCH`, which returns keys in no useful order.
#[derive(Clone)]
pub struct RedisKvStore {
    client: redis::Client,
}

impl RedisKvStore {
    pub fn connect(url: &str) -> Result<Self, AppError> {
        let client = redis::Client::open(url)?;
        Ok(Self { client })
    }
}

#[async_trait]
impl KvStore for RedisKvStore {
    async fn get(&self, key: &str) -> Result<Option<String>, AppError> {
        let mut conn = self.client.get_tokio_connection().await?;
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<(), AppError> {
        let mut conn = self.client.get_tokio_connection().await?;
        let _: () = conn.set_ex(key, value, ttl.as_secs()).await?;
        Ok(())
    }

    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, AppError> {
        let mut conn = self.client.get_tokio_connection().await?;
        let mut iter: redis::AsyncIter<'_, String> =
            conn.scan_match(format!("{prefix}*")).await?;

        let mut keys = Vec::new();
        while let Some(key) = iter.next_item().await {
            keys.push(key);
        }
        Ok(keys)
    }
}
