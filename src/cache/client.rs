//! # Redis 客户端
//!
//! 提供 Redis 连接管理和记忆化所需的少量命令。缓存存储与分布式锁共享
//! 同一个连接管理器。

use redis::{AsyncCommands, Client, RedisResult, Script, aio::ConnectionManager};
use std::sync::Arc;
use std::time::Duration;

use crate::config::RedisConfig;
use crate::error::{MemoError, Result};
use crate::logging::{LogComponent, LogStage};
use crate::{ldebug, lerror, linfo};

/// 仅当令牌仍然匹配时删除锁键
const RELEASE_SCRIPT: &str = r#"
if redis.call("GET", KEYS[1]) == ARGV[1] then
    return redis.call("DEL", KEYS[1])
else
    return 0
end
"#;

/// Redis 客户端
#[derive(Clone)]
pub struct RedisClient {
    /// Redis 连接管理器
    connection_manager: ConnectionManager,
    /// 锁释放脚本
    release_script: Arc<Script>,
    /// 配置信息
    config: RedisConfig,
}

impl RedisClient {
    /// 建立连接
    pub async fn connect(config: RedisConfig) -> Result<Self> {
        linfo!(
            "system",
            LogStage::Startup,
            LogComponent::Redis,
            "connect_to_redis",
            &format!("正在连接 Redis 服务器: {}:{}", config.host, config.port)
        );

        let client = Client::open(config.build_url())
            .map_err(|e| MemoError::config_with_source("创建 Redis 客户端失败", e))?;

        let connection_manager =
            tokio::time::timeout(config.connection_timeout(), ConnectionManager::new(client))
                .await
                .map_err(|e| MemoError::store_unavailable_with_source("连接 Redis 超时", e))?
                .map_err(|e| {
                    MemoError::store_unavailable_with_source("建立 Redis 连接失败", e)
                })?;

        linfo!(
            "system",
            LogStage::Startup,
            LogComponent::Redis,
            "redis_connected",
            "Redis 连接建立成功"
        );

        Ok(Self {
            connection_manager,
            release_script: Arc::new(Script::new(RELEASE_SCRIPT)),
            config,
        })
    }

    /// 读取原始字节
    pub async fn get_bytes(&self, key: &str) -> RedisResult<Option<Vec<u8>>> {
        let mut conn = self.connection_manager.clone();
        conn.get(key).await
    }

    /// 写入原始字节并以毫秒为单位设置过期时间（PSETEX）
    pub async fn pset_ex(&self, key: &str, value: &[u8], ttl: Duration) -> RedisResult<()> {
        let mut conn = self.connection_manager.clone();
        conn.pset_ex::<_, _, ()>(key, value, duration_millis(ttl)).await
    }

    /// `SET key token NX PX lease`，返回是否设置成功
    pub async fn set_nx_px(&self, key: &str, token: &str, lease: Duration) -> RedisResult<bool> {
        let mut conn = self.connection_manager.clone();

        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(token)
            .arg("NX")
            .arg("PX")
            .arg(duration_millis(lease))
            .query_async(&mut conn)
            .await?;

        Ok(reply.is_some())
    }

    /// 令牌匹配时删除键，返回是否删除
    pub async fn compare_and_delete(&self, key: &str, token: &str) -> RedisResult<bool> {
        let mut conn = self.connection_manager.clone();

        let deleted: i64 = self
            .release_script
            .key(key)
            .arg(token)
            .invoke_async(&mut conn)
            .await?;

        Ok(deleted > 0)
    }

    /// 测试连接
    pub async fn ping(&self) -> Result<()> {
        ldebug!("system", LogStage::Startup, LogComponent::Redis, "ping", "测试 Redis 连接");

        let mut conn = self.connection_manager.clone();
        let response: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| MemoError::store_unavailable_with_source("Redis ping 失败", e))?;

        if response == "PONG" {
            Ok(())
        } else {
            lerror!(
                "system",
                LogStage::Startup,
                LogComponent::Redis,
                "ping_fail",
                &format!("Redis ping 响应异常: {response}")
            );
            Err(MemoError::store_unavailable(format!(
                "Redis ping 响应异常: {response}"
            )))
        }
    }

    /// 获取配置信息
    #[must_use]
    pub const fn config(&self) -> &RedisConfig {
        &self.config
    }
}

/// Redis 的 PX/PSETEX 要求至少 1 毫秒
fn duration_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration_millis() {
        assert_eq!(duration_millis(Duration::from_millis(1500)), 1500);
        assert_eq!(duration_millis(Duration::from_micros(10)), 1);
        assert_eq!(duration_millis(Duration::ZERO), 1);
    }

    #[test]
    fn test_build_url() {
        let config = RedisConfig {
            password: Some("secret".to_string()),
            database: 3,
            ..RedisConfig::default()
        };
        assert_eq!(config.build_url(), "redis://:secret@127.0.0.1:6379/3");

        let config = RedisConfig {
            url: "redis://cache.internal:6380/1".to_string(),
            ..RedisConfig::default()
        };
        assert_eq!(config.build_url(), "redis://cache.internal:6380/1");
    }
}
