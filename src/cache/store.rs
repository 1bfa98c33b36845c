//! # 缓存存储适配器
//!
//! `KeyValueStore` 是面向外部键值存储的原始字节接口；`CacheStore` 在其上
//! 加入编解码、超时和错误归类。

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use super::codec;
use super::keys::CallKey;
use crate::error::{MemoError, Result};
use crate::ldebug;
use crate::logging::{LogComponent, LogStage};

/// 外部键值存储
///
/// 过期由存储自身负责：TTL 到期后 `get` 必须返回 `None`。
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// 读取原始字节，键不存在或已过期时返回 `None`
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// 写入原始字节并设置过期时间
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<()>;

    /// 后端名称，用于日志
    fn backend_name(&self) -> &'static str;
}

/// 带编解码的缓存存储
#[derive(Clone)]
pub struct CacheStore {
    backend: Arc<dyn KeyValueStore>,
    timeout: Duration,
}

impl CacheStore {
    /// 创建缓存存储，`timeout` 限定单次读写的最长耗时
    #[must_use]
    pub fn new(backend: Arc<dyn KeyValueStore>, timeout: Duration) -> Self {
        Self { backend, timeout }
    }

    /// 底层存储
    #[must_use]
    pub fn backend(&self) -> &Arc<dyn KeyValueStore> {
        &self.backend
    }

    /// 读取缓存值
    ///
    /// `Ok(None)` 表示未命中；`CorruptRecord` 表示记录无法解码；
    /// `StoreUnavailable` 表示存储故障。是否当作未命中由调用方决定。
    pub async fn get<T: DeserializeOwned>(&self, key: &CallKey) -> Result<Option<T>> {
        let raw = self
            .bounded("get", key, self.backend.get(key.as_str()))
            .await?;

        match raw {
            Some(bytes) => {
                let value = codec::decode(key.as_str(), &bytes)?;
                ldebug!(
                    "system",
                    LogStage::Lookup,
                    LogComponent::Store,
                    "cache_hit",
                    &format!("缓存命中: {key}")
                );
                Ok(Some(value))
            }
            None => {
                ldebug!(
                    "system",
                    LogStage::Lookup,
                    LogComponent::Store,
                    "cache_miss",
                    &format!("缓存未命中: {key}")
                );
                Ok(None)
            }
        }
    }

    /// 编码并写入缓存值
    ///
    /// TTL 原样传给存储，不做上下限约束。
    pub async fn set<T: Serialize + ?Sized>(
        &self,
        key: &CallKey,
        value: &T,
        ttl: Duration,
    ) -> Result<()> {
        let bytes = codec::encode(value)?;
        self.bounded("set", key, self.backend.set(key.as_str(), bytes, ttl))
            .await?;

        ldebug!(
            "system",
            LogStage::Store,
            LogComponent::Store,
            "set_cache_ok",
            &format!("缓存设置成功: key={key}, ttl={}ms", ttl.as_millis())
        );
        Ok(())
    }

    async fn bounded<R>(
        &self,
        operation: &str,
        key: &CallKey,
        future: impl Future<Output = Result<R>>,
    ) -> Result<R> {
        match tokio::time::timeout(self.timeout, future).await {
            Ok(result) => result,
            Err(elapsed) => Err(MemoError::store_unavailable_with_source(
                format!(
                    "{} {operation} 超时 ({}ms): {key}",
                    self.backend.backend_name(),
                    self.timeout.as_millis()
                ),
                elapsed,
            )),
        }
    }
}
