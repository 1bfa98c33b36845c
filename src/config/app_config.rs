//! # 记忆化配置结构定义

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 存储与锁后端类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackendType {
    /// 进程内存储与锁，仅适用于单进程或测试
    #[default]
    Memory,
    /// Redis 存储与 Redis 租约锁
    Redis,
}

/// 记忆化主配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoizerConfig {
    /// 后端类型
    pub backend: BackendType,
    /// 未显式指定时使用的缓存 TTL（毫秒）
    pub default_ttl_ms: u64,
    /// 缓存键命名空间前缀
    pub key_namespace: String,
    /// 键摘要使用的 HMAC 密钥
    pub key_secret: String,
    /// 单次存储读写的超时时间（毫秒）
    pub store_timeout_ms: u64,
    /// 内存后端最大条目数
    pub memory_max_entries: usize,
    /// 锁配置
    pub lock: LockConfig,
    /// Redis 配置
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redis: Option<RedisConfig>,
}

impl Default for MemoizerConfig {
    fn default() -> Self {
        Self {
            backend: BackendType::Memory,
            default_ttl_ms: 60_000,
            key_namespace: "memos".to_string(),
            key_secret: "memo".to_string(),
            store_timeout_ms: 2_000,
            memory_max_entries: 10_000,
            lock: LockConfig::default(),
            redis: None,
        }
    }
}

impl MemoizerConfig {
    /// 默认 TTL
    #[must_use]
    pub const fn default_ttl(&self) -> Duration {
        Duration::from_millis(self.default_ttl_ms)
    }

    /// 存储操作超时
    #[must_use]
    pub const fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    /// 验证配置的有效性
    pub fn validate(&self) -> crate::error::Result<()> {
        crate::ensure_config!(!self.key_namespace.is_empty(), "key_namespace 不能为空");
        crate::ensure_config!(
            !self.key_namespace.starts_with(crate::cache::keys::LOCK_KEY_PREFIX),
            "key_namespace 不能与锁键前缀冲突: {}",
            self.key_namespace
        );
        crate::ensure_config!(!self.key_secret.is_empty(), "key_secret 不能为空");
        crate::ensure_config!(self.store_timeout_ms > 0, "store_timeout_ms 必须大于0");
        crate::ensure_config!(self.memory_max_entries > 0, "memory_max_entries 必须大于0");

        self.lock.validate()?;

        match self.backend {
            BackendType::Memory => {
                crate::ensure_config!(
                    self.redis.is_none(),
                    "redis 配置仅在 backend = \"redis\" 时可用"
                );
            }
            BackendType::Redis => {
                let redis = self.redis.as_ref().ok_or_else(|| {
                    crate::config_error!("backend = \"redis\" 时必须提供 redis 配置")
                })?;
                redis.validate()?;
            }
        }

        Ok(())
    }
}

/// 分布式锁配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LockConfig {
    /// 租约时长（毫秒），持有者崩溃或挂起后最多阻塞其他调用方这么久
    pub lease_ms: u64,
    /// 获取锁的最长等待时间（毫秒），超过则返回 LockUnavailable
    pub acquire_timeout_ms: u64,
    /// 两次尝试之间的基础间隔（毫秒）
    pub retry_delay_ms: u64,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            lease_ms: 5_000,
            acquire_timeout_ms: 10_000,
            retry_delay_ms: 50,
        }
    }
}

impl LockConfig {
    /// 租约时长
    #[must_use]
    pub const fn lease(&self) -> Duration {
        Duration::from_millis(self.lease_ms)
    }

    /// 获取锁超时
    #[must_use]
    pub const fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }

    /// 重试间隔
    #[must_use]
    pub const fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    fn validate(&self) -> crate::error::Result<()> {
        crate::ensure_config!(self.lease_ms > 0, "lock.lease_ms 必须大于0");
        crate::ensure_config!(self.retry_delay_ms > 0, "lock.retry_delay_ms 必须大于0");
        crate::ensure_config!(
            self.acquire_timeout_ms >= self.retry_delay_ms,
            "lock.acquire_timeout_ms ({}) 不能小于 lock.retry_delay_ms ({})",
            self.acquire_timeout_ms,
            self.retry_delay_ms
        );
        Ok(())
    }
}

/// Redis配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RedisConfig {
    /// Redis连接URL，非空时优先于 host/port
    pub url: String,
    /// 服务器地址
    pub host: String,
    /// 服务器端口
    pub port: u16,
    /// 数据库编号
    pub database: u8,
    /// 连接密码（可选）
    pub password: Option<String>,
    /// 连接超时时间（秒）
    pub connection_timeout: u64,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            host: "127.0.0.1".to_string(),
            port: 6379,
            database: 0,
            password: None,
            connection_timeout: 10,
        }
    }
}

impl RedisConfig {
    /// 构建 Redis 连接 URL
    #[must_use]
    pub fn build_url(&self) -> String {
        if !self.url.is_empty() {
            return self.url.clone();
        }
        if let Some(password) = &self.password {
            format!(
                "redis://:{}@{}:{}/{}",
                password, self.host, self.port, self.database
            )
        } else {
            format!("redis://{}:{}/{}", self.host, self.port, self.database)
        }
    }

    /// 连接超时
    #[must_use]
    pub const fn connection_timeout(&self) -> Duration {
        Duration::from_secs(self.connection_timeout)
    }

    fn validate(&self) -> crate::error::Result<()> {
        crate::ensure_config!(
            !self.url.is_empty() || !self.host.is_empty(),
            "Redis 必须提供 url 或 host"
        );
        crate::ensure_config!(
            self.connection_timeout > 0,
            "redis.connection_timeout 必须大于0"
        );
        Ok(())
    }
}
