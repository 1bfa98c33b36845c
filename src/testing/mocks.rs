//! # 故障注入
//!
//! `FlakyStore` 包装任意存储，可按需让读或写失败；
//! `FlakyLock` 永远拿不到锁。

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use crate::cache::KeyValueStore;
use crate::error::{MemoError, Result};
use crate::lock::{DistributedLock, LockRetryPolicy, LockToken};

/// 可注入故障的存储
pub struct FlakyStore {
    inner: Arc<dyn KeyValueStore>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    reads: AtomicUsize,
    writes: AtomicUsize,
}

impl FlakyStore {
    /// 包装底层存储，初始不注入故障
    #[must_use]
    pub fn new(inner: Arc<dyn KeyValueStore>) -> Self {
        Self {
            inner,
            fail_reads: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
            reads: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
        }
    }

    /// 之后的读取全部返回 `StoreUnavailable`
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// 之后的写入全部返回 `StoreUnavailable`
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// 已发生的读取次数（含失败）
    #[must_use]
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// 已发生的写入次数（含失败）
    #[must_use]
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KeyValueStore for FlakyStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(MemoError::store_unavailable(format!("注入的读取故障: {key}")));
        }
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(MemoError::store_unavailable(format!("注入的写入故障: {key}")));
        }
        self.inner.set(key, value, ttl).await
    }

    fn backend_name(&self) -> &'static str {
        "flaky"
    }
}

/// 锁服务不可达
pub struct FlakyLock {
    policy: LockRetryPolicy,
    attempts: AtomicUsize,
}

impl FlakyLock {
    /// 等待上限 50ms
    #[must_use]
    pub fn new() -> Self {
        Self {
            policy: LockRetryPolicy {
                acquire_timeout: Duration::from_millis(50),
                retry_delay: Duration::from_millis(5),
            },
            attempts: AtomicUsize::new(0),
        }
    }

    /// 已尝试获取的次数
    #[must_use]
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl Default for FlakyLock {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DistributedLock for FlakyLock {
    async fn try_acquire(&self, key: &str, _token: &str, _lease: Duration) -> Result<bool> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(MemoError::lock_unavailable(format!("注入的锁服务故障: {key}")))
    }

    async fn release(&self, _lock: &LockToken) -> Result<bool> {
        Ok(false)
    }

    fn retry_policy(&self) -> &LockRetryPolicy {
        &self.policy
    }

    fn backend_name(&self) -> &'static str {
        "flaky"
    }
}
