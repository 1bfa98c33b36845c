//! # 内存存储实现
//!
//! 进程内的 `KeyValueStore`，语义与 Redis 后端一致（按条目过期），
//! 用于单进程部署和测试。

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

use super::store::KeyValueStore;
use crate::error::Result;

/// 无法表示的截止时间退化为约 30 年之后
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// `now + duration`，溢出时返回远期截止时间
pub(crate) fn deadline_after(now: Instant, duration: Duration) -> Instant {
    now.checked_add(duration).unwrap_or_else(|| now + FAR_FUTURE)
}

/// 缓存项
#[derive(Debug, Clone)]
struct CacheEntry {
    value: Vec<u8>,
    expires_at: Instant,
}

impl CacheEntry {
    fn new(value: Vec<u8>, ttl: Duration) -> Self {
        Self {
            value,
            expires_at: deadline_after(Instant::now(), ttl),
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// 内存存储
#[derive(Clone)]
pub struct MemoryStore {
    data: Arc<RwLock<HashMap<String, CacheEntry>>>,
    max_entries: usize,
}

impl MemoryStore {
    /// 创建内存存储
    #[must_use]
    pub fn new(max_entries: usize) -> Self {
        Self {
            data: Arc::new(RwLock::new(HashMap::new())),
            max_entries: max_entries.max(1),
        }
    }

    /// 当前未过期的条目数
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        self.data
            .read()
            .await
            .values()
            .filter(|entry| !entry.is_expired(now))
            .count()
    }

    /// 是否没有未过期条目
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// 直接写入原始字节（测试与排障用，例如模拟被外部改写的记录）
    pub async fn put_raw(&self, key: &str, value: Vec<u8>, ttl: Duration) {
        let mut data = self.data.write().await;
        data.insert(key.to_string(), CacheEntry::new(value, ttl));
    }

    fn ensure_capacity(data: &mut HashMap<String, CacheEntry>, max_entries: usize) {
        if data.len() < max_entries {
            return;
        }

        let now = Instant::now();
        data.retain(|_, entry| !entry.is_expired(now));

        if data.len() >= max_entries {
            // 没有过期项时淘汰最早到期的一项
            let victim = data
                .iter()
                .min_by_key(|(_, entry)| entry.expires_at)
                .map(|(key, _)| key.clone());
            if let Some(key) = victim {
                data.remove(&key);
            }
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(10_000)
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let now = Instant::now();
        {
            let data = self.data.read().await;
            match data.get(key) {
                Some(entry) if !entry.is_expired(now) => return Ok(Some(entry.value.clone())),
                Some(_) => {}
                None => return Ok(None),
            }
        }

        // 过期项在读到时清理
        let mut data = self.data.write().await;
        if data.get(key).is_some_and(|entry| entry.is_expired(now)) {
            data.remove(key);
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<()> {
        let mut data = self.data.write().await;
        if !data.contains_key(key) {
            Self::ensure_capacity(&mut data, self.max_entries);
        }
        data.insert(key.to_string(), CacheEntry::new(value, ttl));
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
