//! # 错误类型定义

use thiserror::Error;

use super::ErrorCategory;

/// 记忆化系统主要错误类型
#[derive(Debug, Error)]
pub enum MemoError {
    /// 与键值存储通信失败（网络、超时）
    #[error("缓存存储不可用: {message}")]
    StoreUnavailable {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// 存储中的字节无法解码
    #[error("缓存记录损坏: {key}: {message}")]
    CorruptRecord {
        key: String,
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// 锁服务失败或在限定时间内无法获得租约
    #[error("分布式锁不可用: {message}")]
    LockUnavailable {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// 被包装操作本身失败，或其结果无法编码
    #[error("操作执行失败: {message}")]
    Operation {
        message: String,
        #[source]
        source: anyhow::Error,
    },

    /// 调用参数无法序列化为缓存键
    #[error("调用参数无法序列化: {message}")]
    InvalidArguments {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// 配置相关错误
    #[error("配置错误: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },
}

impl MemoError {
    /// 创建存储不可用错误
    pub fn store_unavailable<T: Into<String>>(message: T) -> Self {
        Self::StoreUnavailable {
            message: message.into(),
            source: None,
        }
    }

    /// 创建带来源的存储不可用错误
    pub fn store_unavailable_with_source<T: Into<String>, E: Into<anyhow::Error>>(
        message: T,
        source: E,
    ) -> Self {
        Self::StoreUnavailable {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// 创建记录损坏错误
    pub fn corrupt_record<K: Into<String>, T: Into<String>>(key: K, message: T) -> Self {
        Self::CorruptRecord {
            key: key.into(),
            message: message.into(),
            source: None,
        }
    }

    /// 创建带来源的记录损坏错误
    pub fn corrupt_record_with_source<K: Into<String>, T: Into<String>, E: Into<anyhow::Error>>(
        key: K,
        message: T,
        source: E,
    ) -> Self {
        Self::CorruptRecord {
            key: key.into(),
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// 创建锁不可用错误
    pub fn lock_unavailable<T: Into<String>>(message: T) -> Self {
        Self::LockUnavailable {
            message: message.into(),
            source: None,
        }
    }

    /// 创建带来源的锁不可用错误
    pub fn lock_unavailable_with_source<T: Into<String>, E: Into<anyhow::Error>>(
        message: T,
        source: E,
    ) -> Self {
        Self::LockUnavailable {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// 包装被记忆化操作返回的错误，原始错误保留为 source
    pub fn operation<E: Into<anyhow::Error>>(source: E) -> Self {
        let source = source.into();
        Self::Operation {
            message: source.to_string(),
            source,
        }
    }

    /// 创建带说明的操作错误（例如结果无法编码）
    pub fn operation_with_message<T: Into<String>, E: Into<anyhow::Error>>(
        message: T,
        source: E,
    ) -> Self {
        Self::Operation {
            message: message.into(),
            source: source.into(),
        }
    }

    /// 创建参数序列化错误
    pub fn invalid_arguments_with_source<T: Into<String>, E: Into<anyhow::Error>>(
        message: T,
        source: E,
    ) -> Self {
        Self::InvalidArguments {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// 创建配置错误
    pub fn config<T: Into<String>>(message: T) -> Self {
        Self::Config {
            message: message.into(),
            source: None,
        }
    }

    /// 创建带来源的配置错误
    pub fn config_with_source<T: Into<String>, E: Into<anyhow::Error>>(
        message: T,
        source: E,
    ) -> Self {
        Self::Config {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// 存储或编解码层面的故障，引擎会降级为重新计算
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::StoreUnavailable { .. } | Self::CorruptRecord { .. }
        )
    }

    /// 错误归类，用于监控告警
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidArguments { .. } | Self::Config { .. } => ErrorCategory::Client,
            Self::StoreUnavailable { .. }
            | Self::CorruptRecord { .. }
            | Self::LockUnavailable { .. }
            | Self::Operation { .. } => ErrorCategory::Server,
        }
    }

    /// 稳定的错误代码
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::StoreUnavailable { .. } => "STORE_UNAVAILABLE",
            Self::CorruptRecord { .. } => "CORRUPT_RECORD",
            Self::LockUnavailable { .. } => "LOCK_UNAVAILABLE",
            Self::Operation { .. } => "OPERATION_FAILURE",
            Self::InvalidArguments { .. } => "INVALID_ARGUMENTS",
            Self::Config { .. } => "CONFIG_ERROR",
        }
    }

    /// 取回被包装操作的原始错误
    #[must_use]
    pub fn operation_source<E>(&self) -> Option<&E>
    where
        E: std::fmt::Display + std::fmt::Debug + Send + Sync + 'static,
    {
        match self {
            Self::Operation { source, .. } => source.downcast_ref::<E>(),
            _ => None,
        }
    }
}

impl From<std::io::Error> for MemoError {
    fn from(err: std::io::Error) -> Self {
        Self::config_with_source("文件操作失败", err)
    }
}

impl From<toml::de::Error> for MemoError {
    fn from(err: toml::de::Error) -> Self {
        Self::config_with_source("TOML解析失败", err)
    }
}
