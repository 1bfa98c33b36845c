//! # Redis 锁实现
//!
//! `SET key token NX PX lease` 获取，Lua 脚本比较令牌后删除释放。

use async_trait::async_trait;
use std::time::Duration;

use super::{DistributedLock, LockRetryPolicy, LockToken};
use crate::cache::RedisClient;
use crate::error::{MemoError, Result};

/// Redis 租约锁
#[derive(Clone)]
pub struct RedisLock {
    client: RedisClient,
    policy: LockRetryPolicy,
}

impl RedisLock {
    /// 使用已建立的客户端创建
    #[must_use]
    pub const fn new(client: RedisClient, policy: LockRetryPolicy) -> Self {
        Self { client, policy }
    }
}

#[async_trait]
impl DistributedLock for RedisLock {
    async fn try_acquire(&self, key: &str, token: &str, lease: Duration) -> Result<bool> {
        self.client
            .set_nx_px(key, token, lease)
            .await
            .map_err(|e| {
                MemoError::lock_unavailable_with_source(format!("Redis 加锁失败: {key}"), e)
            })
    }

    async fn release(&self, lock: &LockToken) -> Result<bool> {
        self.client
            .compare_and_delete(lock.key(), lock.token())
            .await
            .map_err(|e| {
                let message = format!("Redis 解锁失败: {}", lock.key());
                MemoError::lock_unavailable_with_source(message, e)
            })
    }

    fn retry_policy(&self) -> &LockRetryPolicy {
        &self.policy
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }
}
