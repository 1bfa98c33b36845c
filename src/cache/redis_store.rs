//! # Redis 存储实现

use async_trait::async_trait;
use std::time::Duration;

use super::client::RedisClient;
use super::store::KeyValueStore;
use crate::error::{MemoError, Result};

/// 基于 `GET` / `PSETEX` 的键值存储
#[derive(Clone)]
pub struct RedisStore {
    client: RedisClient,
}

impl RedisStore {
    /// 使用已建立的客户端创建存储
    #[must_use]
    pub const fn new(client: RedisClient) -> Self {
        Self { client }
    }

    /// 底层客户端
    #[must_use]
    pub const fn client(&self) -> &RedisClient {
        &self.client
    }
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.client
            .get_bytes(key)
            .await
            .map_err(|e| {
                MemoError::store_unavailable_with_source(format!("Redis GET 失败: {key}"), e)
            })
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<()> {
        self.client
            .pset_ex(key, &value, ttl)
            .await
            .map_err(|e| {
                let message = format!("Redis PSETEX 失败: {key}");
                MemoError::store_unavailable_with_source(message, e)
            })
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }
}
