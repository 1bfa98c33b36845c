//! # 记忆化引擎
//!
//! 把一个异步操作包装成带共享缓存的版本：
//!
//! - 快速路径直接读缓存，命中即返回，不触碰锁
//! - 未命中时在调用键对应的分布式锁内复查并计算，
//!   同一调用键在任意时刻最多只有一个计算在进行
//! - 操作失败不写缓存，原始错误通过 `MemoError::Operation` 透传
//! - 存储故障与损坏记录视为未命中，只记录日志

pub mod stats;

pub use stats::{MemoStats, MemoStatsSnapshot};

use serde::{Serialize, de::DeserializeOwned};
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::cache::{
    CacheKeyBuilder, CacheStore, CallKey, FunctionKey, KeyValueStore, MemoArgs, MemoryStore,
    RedisClient, RedisStore,
};
use crate::config::{BackendType, MemoizerConfig};
use crate::error::{MemoError, Result};
use crate::lock::{DistributedLock, LockRetryPolicy, MemoryLock, RedisLock, with_lock};
use crate::logging::{LogComponent, LogStage};
use crate::{config_error, ldebug, lerror, linfo, lwarn};

/// 一次 `memoize` 的元数据，创建后不可变
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoSpec {
    /// 逻辑名称，缓存条目的命名空间
    pub name: String,
    /// 由名称计算出的函数键
    pub function_key: FunctionKey,
}

/// 单次 `memoize` 的选项
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoOptions {
    /// 新写入记录的存活时间
    pub ttl: Duration,
    /// 为 `true` 时，包装后的第一次调用跳过缓存强制重新计算
    pub reset: bool,
}

impl MemoOptions {
    /// 指定 TTL，不重置
    #[must_use]
    pub const fn new(ttl: Duration) -> Self {
        Self { ttl, reset: false }
    }

    /// 请求一次强制重算
    #[must_use]
    pub const fn with_reset(mut self) -> Self {
        self.reset = true;
        self
    }
}

/// 记忆化入口，持有存储、锁与键构建器
///
/// 克隆开销很小，所有克隆共享同一组后端与统计。
#[derive(Clone)]
pub struct Memoizer {
    store: CacheStore,
    lock: Arc<dyn DistributedLock>,
    keys: CacheKeyBuilder,
    lock_lease: Duration,
    default_ttl: Duration,
    stats: Arc<MemoStats>,
}

impl Memoizer {
    /// 使用给定的存储与锁后端创建
    #[must_use]
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        lock: Arc<dyn DistributedLock>,
        config: &MemoizerConfig,
    ) -> Self {
        Self {
            store: CacheStore::new(store, config.store_timeout()),
            lock,
            keys: CacheKeyBuilder::from_config(config),
            lock_lease: config.lock.lease(),
            default_ttl: config.default_ttl(),
            stats: Arc::new(MemoStats::default()),
        }
    }

    /// 进程内后端
    #[must_use]
    pub fn in_memory(config: &MemoizerConfig) -> Self {
        Self::new(
            Arc::new(MemoryStore::new(config.memory_max_entries)),
            Arc::new(MemoryLock::new(LockRetryPolicy::from_config(&config.lock))),
            config,
        )
    }

    /// 按配置选择后端并建立连接
    pub async fn from_config(config: &MemoizerConfig) -> Result<Self> {
        config.validate()?;

        let memoizer = match config.backend {
            BackendType::Memory => Self::in_memory(config),
            BackendType::Redis => {
                let redis = config.redis.clone().ok_or_else(|| {
                    config_error!("backend = \"redis\" 时必须提供 redis 配置")
                })?;
                let client = RedisClient::connect(redis).await?;
                client.ping().await?;

                Self::new(
                    Arc::new(RedisStore::new(client.clone())),
                    Arc::new(RedisLock::new(
                        client,
                        LockRetryPolicy::from_config(&config.lock),
                    )),
                    config,
                )
            }
        };

        linfo!(
            "system",
            LogStage::Startup,
            LogComponent::Memoizer,
            "memoizer_ready",
            &format!(
                "记忆化引擎就绪: store={}, lock={}, namespace={}",
                memoizer.store.backend().backend_name(),
                memoizer.lock.backend_name(),
                memoizer.keys.namespace()
            )
        );
        Ok(memoizer)
    }

    /// 包装操作，使用给定 TTL
    pub fn memoize<A, T, E, F, Fut>(
        &self,
        name: impl Into<String>,
        ttl: Duration,
        operation: F,
    ) -> Memoized<A, T, F>
    where
        F: Fn(A) -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
    {
        self.memoize_with(name, MemoOptions::new(ttl), operation)
    }

    /// 包装操作，使用配置中的默认 TTL
    pub fn memoize_default<A, T, E, F, Fut>(
        &self,
        name: impl Into<String>,
        operation: F,
    ) -> Memoized<A, T, F>
    where
        F: Fn(A) -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
    {
        self.memoize_with(name, MemoOptions::new(self.default_ttl), operation)
    }

    /// 包装操作
    ///
    /// 同名的两次包装共享缓存条目；`reset` 只影响本次返回的包装。
    pub fn memoize_with<A, T, E, F, Fut>(
        &self,
        name: impl Into<String>,
        options: MemoOptions,
        operation: F,
    ) -> Memoized<A, T, F>
    where
        F: Fn(A) -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
    {
        let name = name.into();
        let function_key = self.keys.function_key(&name);

        Memoized {
            spec: MemoSpec { name, function_key },
            ttl: options.ttl,
            reset_requested: options.reset,
            reset_consumed: AtomicBool::new(false),
            engine: self.clone(),
            operation,
            _marker: PhantomData,
        }
    }

    /// 默认 TTL
    #[must_use]
    pub const fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// 缓存键构建器
    #[must_use]
    pub const fn keys(&self) -> &CacheKeyBuilder {
        &self.keys
    }

    /// 统计快照
    #[must_use]
    pub fn stats(&self) -> MemoStatsSnapshot {
        self.stats.snapshot()
    }
}

/// 记忆化后的操作
pub struct Memoized<A, T, F> {
    spec: MemoSpec,
    ttl: Duration,
    reset_requested: bool,
    reset_consumed: AtomicBool,
    engine: Memoizer,
    operation: F,
    _marker: PhantomData<fn(A) -> T>,
}

impl<A, T, F> Memoized<A, T, F> {
    /// 名称与函数键
    #[must_use]
    pub const fn spec(&self) -> &MemoSpec {
        &self.spec
    }

    /// 写入记录使用的 TTL
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    /// 强制重算是否仍待执行
    #[must_use]
    pub fn reset_pending(&self) -> bool {
        self.reset_requested && !self.reset_consumed.load(Ordering::Acquire)
    }

    /// 参数对应的缓存键
    pub fn call_key(&self, args: &A) -> Result<CallKey>
    where
        A: MemoArgs,
    {
        let values = args.arg_values()?;
        Ok(self.engine.keys.call_key(&self.spec.function_key, &values))
    }

    /// 认领强制重算；并发调用中只有一个能成功
    fn claim_reset(&self) -> bool {
        self.reset_requested
            && self
                .reset_consumed
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
    }

    /// 交还未执行的强制重算
    fn release_reset(&self) {
        self.reset_consumed.store(false, Ordering::Release);
    }
}

impl<A, T, F, Fut, E> Memoized<A, T, F>
where
    A: MemoArgs + Send,
    F: Fn(A) -> Fut + Send + Sync,
    Fut: Future<Output = std::result::Result<T, E>> + Send,
    T: Serialize + DeserializeOwned + Send,
    E: Into<anyhow::Error> + Send,
{
    /// 调用
    ///
    /// 命中时不执行操作也不加锁；未命中时在锁内复查后执行操作。
    /// 操作失败返回 `MemoError::Operation`，可用 `operation_source` 取回原始错误。
    pub async fn call(&self, args: A) -> Result<T> {
        let call_key = self.call_key(&args)?;
        let forced = self.claim_reset();

        if forced {
            ldebug!(
                "system",
                LogStage::Lookup,
                LogComponent::Memoizer,
                "forced_recompute",
                &format!("强制重算，跳过缓存: name={}, key={call_key}", self.spec.name)
            );
        } else if let Some(value) = self.lookup(&call_key).await {
            return Ok(value);
        }

        let lock_key = self.engine.keys.lock_key(&call_key);
        let call_key = &call_key;
        let outcome = with_lock(
            self.engine.lock.as_ref(),
            &lock_key,
            self.engine.lock_lease,
            move || async move {
                if !forced {
                    if let Some(value) = self.lookup(call_key).await {
                        return Ok(value);
                    }
                }
                self.compute(call_key, args).await
            },
        )
        .await;

        if let Err(e) = &outcome
            && matches!(e, MemoError::LockUnavailable { .. })
        {
            if forced {
                // 临界区没有执行，强制重算留给下一次调用
                self.release_reset();
            }
            self.engine.stats.record_lock_failure();
            lerror!(
                "system",
                LogStage::Lock,
                LogComponent::Memoizer,
                "lock_unavailable",
                &format!(
                    "无法获取调用锁，操作未执行: name={}, error={e}",
                    self.spec.name
                )
            );
        }
        outcome
    }

    /// 读取缓存；故障与损坏记录按未命中处理
    async fn lookup(&self, key: &CallKey) -> Option<T> {
        let stats = &self.engine.stats;
        match self.engine.store.get::<T>(key).await {
            Ok(Some(value)) => {
                stats.record_hit();
                Some(value)
            }
            Ok(None) => {
                stats.record_miss();
                None
            }
            Err(e) => {
                if matches!(e, MemoError::CorruptRecord { .. }) {
                    stats.record_corrupt_record();
                } else {
                    stats.record_store_fault();
                }
                lwarn!(
                    "system",
                    LogStage::Lookup,
                    LogComponent::Memoizer,
                    "lookup_degraded",
                    &format!(
                        "缓存读取失败，按未命中处理: name={}, error={e}",
                        self.spec.name
                    )
                );
                None
            }
        }
    }

    /// 执行操作并写入结果；写入失败不影响返回值
    async fn compute(&self, key: &CallKey, args: A) -> Result<T> {
        let stats = &self.engine.stats;
        stats.record_computation();

        let value = (self.operation)(args).await.map_err(|e| {
            stats.record_operation_failure();
            MemoError::operation(e)
        })?;

        match self.engine.store.set(key, &value, self.ttl).await {
            Ok(()) => {}
            Err(e @ MemoError::Operation { .. }) => return Err(e),
            Err(e) => {
                stats.record_store_fault();
                lwarn!(
                    "system",
                    LogStage::Store,
                    LogComponent::Memoizer,
                    "store_write_failed",
                    &format!(
                        "结果写入缓存失败，仍返回计算结果: name={}, error={e}",
                        self.spec.name
                    )
                );
            }
        }

        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::store::MockKeyValueStore;
    use std::sync::atomic::AtomicUsize;

    fn config() -> MemoizerConfig {
        let mut config = MemoizerConfig::default();
        config.lock.acquire_timeout_ms = 1_000;
        config.lock.retry_delay_ms = 5;
        config
    }

    #[tokio::test]
    async fn test_spec_is_derived_from_name() {
        let memoizer = Memoizer::in_memory(&config());
        let memo = memoizer.memoize(
            "users.lookup",
            Duration::from_secs(1),
            |(id,): (u32,)| async move { Ok::<_, std::io::Error>(id) },
        );

        assert_eq!(memo.spec().name, "users.lookup");
        assert_eq!(memo.spec().function_key, memoizer.keys().function_key("users.lookup"));
        assert_eq!(memo.ttl(), Duration::from_secs(1));
        assert!(!memo.reset_pending());

        let key = memo.call_key(&(7,)).unwrap();
        assert!(key.as_str().starts_with("memos:"));
    }

    #[tokio::test]
    async fn test_reset_is_claimed_once() {
        let memoizer = Memoizer::in_memory(&config());
        let memo = memoizer.memoize_with(
            "f",
            MemoOptions::new(Duration::from_secs(1)).with_reset(),
            |(): ()| async { Ok::<_, std::io::Error>(1u8) },
        );

        assert!(memo.reset_pending());
        assert!(memo.claim_reset());
        assert!(!memo.claim_reset());
        assert!(!memo.reset_pending());
    }

    #[tokio::test]
    async fn test_unreadable_store_still_computes() {
        let mut mock = MockKeyValueStore::new();
        mock.expect_get()
            .returning(|_| Err(MemoError::store_unavailable("down")));
        mock.expect_set()
            .returning(|_, _, _| Err(MemoError::store_unavailable("down")));
        mock.expect_backend_name().return_const("mock");

        let cfg = config();
        let memoizer = Memoizer::new(
            Arc::new(mock),
            Arc::new(MemoryLock::new(LockRetryPolicy::from_config(&cfg.lock))),
            &cfg,
        );
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&runs);
        let memo = memoizer.memoize("f", Duration::from_secs(1), move |(x,): (u32,)| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok::<_, std::io::Error>(x * 2)
            }
        });

        assert_eq!(memo.call((2,)).await.unwrap(), 4);
        assert_eq!(memo.call((2,)).await.unwrap(), 4);
        assert_eq!(runs.load(Ordering::SeqCst), 2);

        let stats = memoizer.stats();
        assert_eq!(stats.computations, 2);
        assert_eq!(stats.store_faults, 6);
        assert_eq!(stats.hits, 0);
    }

    #[tokio::test]
    async fn test_unserializable_result_is_operation_failure() {
        use std::collections::HashMap;

        let memoizer = Memoizer::in_memory(&config());
        let memo = memoizer.memoize("f", Duration::from_secs(1), |(): ()| async {
            let mut map = HashMap::new();
            map.insert(vec![1u8], 1u8);
            Ok::<_, std::io::Error>(map)
        });

        let err = memo.call(()).await.unwrap_err();
        assert!(matches!(err, MemoError::Operation { .. }));
    }
}
