//! # 分布式锁模块
//!
//! 锁服务只需提供“带租约的互斥键”：`try_acquire` 在键空闲时
//! 写入令牌并设置租约，`release` 仅在令牌仍匹配时删除。
//! 租约到期由锁服务自身保证，崩溃或挂起的持有者最多阻塞
//! 其他调用方一个租约时长。

pub mod memory;
pub mod redis_lock;

pub use memory::MemoryLock;
pub use redis_lock::RedisLock;

use async_trait::async_trait;
use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Duration;
use tokio::time::Instant;
use uuid::Uuid;

use crate::cache::memory::deadline_after;
use crate::config::LockConfig;
use crate::error::{MemoError, Result};
use crate::logging::{LogComponent, LogStage};
use crate::{ldebug, lwarn};

/// 获取锁的重试策略
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockRetryPolicy {
    /// 放弃前的最长等待时间
    pub acquire_timeout: Duration,
    /// 两次尝试之间的基础间隔
    pub retry_delay: Duration,
}

impl Default for LockRetryPolicy {
    fn default() -> Self {
        Self::from_config(&LockConfig::default())
    }
}

impl LockRetryPolicy {
    /// 从锁配置创建
    #[must_use]
    pub const fn from_config(config: &LockConfig) -> Self {
        Self {
            acquire_timeout: config.acquire_timeout(),
            retry_delay: config.retry_delay(),
        }
    }

    /// 带随机抖动的重试间隔，避免等待者同时醒来
    #[must_use]
    pub fn jittered_delay(&self) -> Duration {
        let base = u64::try_from(self.retry_delay.as_millis()).unwrap_or(u64::MAX);
        let jitter = fastrand::u64(0..=base / 2);
        Duration::from_millis(base.saturating_add(jitter))
    }
}

/// 已持有的租约
#[derive(Debug, Clone)]
pub struct LockToken {
    key: String,
    token: String,
    lease: Duration,
    acquired_at: Instant,
}

impl LockToken {
    /// 锁键
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// 持有者令牌
    #[must_use]
    pub fn token(&self) -> &str {
        &self.token
    }

    /// 租约时长
    #[must_use]
    pub const fn lease(&self) -> Duration {
        self.lease
    }

    /// 租约是否已经（按本地时钟）过期
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.acquired_at.elapsed() >= self.lease
    }
}

/// 分布式锁服务
#[async_trait]
pub trait DistributedLock: Send + Sync {
    /// 尝试一次获取：键空闲（或租约已过期）时写入令牌并返回 `true`
    async fn try_acquire(&self, key: &str, token: &str, lease: Duration) -> Result<bool>;

    /// 释放租约，只有令牌匹配时才删除；返回是否删除
    async fn release(&self, lock: &LockToken) -> Result<bool>;

    /// 重试策略
    fn retry_policy(&self) -> &LockRetryPolicy;

    /// 后端名称，用于日志
    fn backend_name(&self) -> &'static str;

    /// 获取租约，持续重试直到成功或超过 `acquire_timeout`
    async fn acquire(&self, key: &str, lease: Duration) -> Result<LockToken> {
        let policy = self.retry_policy().clone();
        let token = Uuid::new_v4().to_string();
        let started = Instant::now();
        let deadline = deadline_after(started, policy.acquire_timeout);
        let mut attempts: u32 = 0;

        loop {
            attempts += 1;
            if self.try_acquire(key, &token, lease).await? {
                ldebug!(
                    "system",
                    LogStage::Lock,
                    LogComponent::Lock,
                    "lock_acquired",
                    &format!(
                        "获取锁成功: key={key}, attempts={attempts}, waited={}ms",
                        started.elapsed().as_millis()
                    )
                );
                return Ok(LockToken {
                    key: key.to_string(),
                    token,
                    lease,
                    acquired_at: Instant::now(),
                });
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(MemoError::lock_unavailable(format!(
                    "{} 获取锁超时: key={key}, attempts={attempts}, timeout={}ms",
                    self.backend_name(),
                    policy.acquire_timeout.as_millis()
                )));
            }

            tokio::time::sleep(policy.jittered_delay().min(deadline - now)).await;
        }
    }
}

/// 在锁内执行临界区
///
/// 临界区恰好执行一次；无论成功、失败还是 panic，都会尝试释放租约。
/// 释放失败只记录日志，租约到期会兜底。
pub async fn with_lock<T, F, Fut>(
    lock: &dyn DistributedLock,
    key: &str,
    lease: Duration,
    critical_section: F,
) -> Result<T>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let guard = lock.acquire(key, lease).await?;

    let outcome = AssertUnwindSafe(critical_section()).catch_unwind().await;

    match lock.release(&guard).await {
        Ok(true) => ldebug!(
            "system",
            LogStage::Lock,
            LogComponent::Lock,
            "lock_released",
            &format!("释放锁: key={key}")
        ),
        Ok(false) => lwarn!(
            "system",
            LogStage::Lock,
            LogComponent::Lock,
            "lease_lost",
            &format!(
                "租约已过期或被接管: key={key}, lease={}ms",
                lease.as_millis()
            )
        ),
        Err(e) => lwarn!(
            "system",
            LogStage::Lock,
            LogComponent::Lock,
            "release_failed",
            &format!("释放锁失败，等待租约过期: key={key}, error={e}")
        ),
    }

    match outcome {
        Ok(result) => result,
        Err(panic) => std::panic::resume_unwind(panic),
    }
}
