//! # 内存锁实现
//!
//! 进程内的租约锁，租约到期语义与 Redis 锁一致。用于测试以及只有
//! 单个进程参与的部署。

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

use super::{DistributedLock, LockRetryPolicy, LockToken};
use crate::cache::memory::deadline_after;
use crate::error::Result;

#[derive(Debug)]
struct Lease {
    token: String,
    expires_at: Instant,
}

/// 内存锁
#[derive(Clone, Default)]
pub struct MemoryLock {
    leases: Arc<Mutex<HashMap<String, Lease>>>,
    policy: LockRetryPolicy,
}

impl MemoryLock {
    /// 使用指定重试策略创建
    #[must_use]
    pub fn new(policy: LockRetryPolicy) -> Self {
        Self {
            leases: Arc::new(Mutex::new(HashMap::new())),
            policy,
        }
    }

    /// 键当前是否被未过期的租约占用
    pub async fn is_held(&self, key: &str) -> bool {
        let now = Instant::now();
        self.leases
            .lock()
            .await
            .get(key)
            .is_some_and(|lease| lease.expires_at > now)
    }
}

#[async_trait]
impl DistributedLock for MemoryLock {
    async fn try_acquire(&self, key: &str, token: &str, lease: Duration) -> Result<bool> {
        let now = Instant::now();
        let mut leases = self.leases.lock().await;

        if leases.get(key).is_some_and(|current| current.expires_at > now) {
            return Ok(false);
        }

        leases.insert(
            key.to_string(),
            Lease {
                token: token.to_string(),
                expires_at: deadline_after(now, lease),
            },
        );
        Ok(true)
    }

    async fn release(&self, lock: &LockToken) -> Result<bool> {
        let mut leases = self.leases.lock().await;

        if leases
            .get(lock.key())
            .is_some_and(|current| current.token == lock.token())
        {
            leases.remove(lock.key());
            return Ok(true);
        }
        Ok(false)
    }

    fn retry_policy(&self) -> &LockRetryPolicy {
        &self.policy
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
