//! # 日志配置模块
//!
//! 结构化日志宏以及 tracing 订阅器初始化

use std::env;
use std::fmt;
use tracing_subscriber::{
    EnvFilter, fmt as tracing_fmt, layer::SubscriberExt, util::SubscriberInitExt,
};

/// 日志所处的处理阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogStage {
    /// 启动与连接建立
    Startup,
    /// 配置加载
    Config,
    /// 缓存读取（快速路径与锁内复查）
    Lookup,
    /// 锁获取与释放
    Lock,
    /// 执行被包装操作
    Compute,
    /// 写入缓存
    Store,
}

impl LogStage {
    /// 阶段名称
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Startup => "startup",
            Self::Config => "config",
            Self::Lookup => "lookup",
            Self::Lock => "lock",
            Self::Compute => "compute",
            Self::Store => "store",
        }
    }
}

impl fmt::Display for LogStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 产生日志的组件
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogComponent {
    /// 记忆化引擎
    Memoizer,
    /// 缓存存储适配器
    Store,
    /// Redis 客户端
    Redis,
    /// 分布式锁适配器
    Lock,
    /// 配置
    Config,
}

impl LogComponent {
    /// 组件名称
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Memoizer => "memoizer",
            Self::Store => "store",
            Self::Redis => "redis",
            Self::Lock => "lock",
            Self::Config => "config",
        }
    }
}

impl fmt::Display for LogComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 结构化 info 日志: `linfo!(request_id, stage, component, operation, message)`
#[macro_export]
macro_rules! linfo {
    ($request_id:expr, $stage:expr, $component:expr, $operation:expr, $message:expr $(,)?) => {
        ::tracing::info!(
            request_id = %$request_id,
            stage = %$stage,
            component = %$component,
            operation = $operation,
            "{}",
            $message
        )
    };
}

/// 结构化 debug 日志
#[macro_export]
macro_rules! ldebug {
    ($request_id:expr, $stage:expr, $component:expr, $operation:expr, $message:expr $(,)?) => {
        ::tracing::debug!(
            request_id = %$request_id,
            stage = %$stage,
            component = %$component,
            operation = $operation,
            "{}",
            $message
        )
    };
}

/// 结构化 warn 日志
#[macro_export]
macro_rules! lwarn {
    ($request_id:expr, $stage:expr, $component:expr, $operation:expr, $message:expr $(,)?) => {
        ::tracing::warn!(
            request_id = %$request_id,
            stage = %$stage,
            component = %$component,
            operation = $operation,
            "{}",
            $message
        )
    };
}

/// 结构化 error 日志
#[macro_export]
macro_rules! lerror {
    ($request_id:expr, $stage:expr, $component:expr, $operation:expr, $message:expr $(,)?) => {
        ::tracing::error!(
            request_id = %$request_id,
            stage = %$stage,
            component = %$component,
            operation = $operation,
            "{}",
            $message
        )
    };
}

/// 初始化日志系统
///
/// `RUST_LOG` 优先；否则使用传入级别（默认 `info`），本 crate 开到 `debug`。
pub fn init_logging(log_level: Option<&str>) {
    let level = log_level.unwrap_or("info");
    let default_filter = format!("{level},locking_memoizer=debug,redis=warn");
    let log_filter = env::var("RUST_LOG").unwrap_or(default_filter);

    let initialized = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| log_filter.into()))
        .with(
            tracing_fmt::layer()
                .with_target(true)
                .with_level(true)
                .with_thread_ids(false)
                .with_thread_names(false)
                .with_file(false)
                .with_line_number(false)
                .compact(),
        )
        .try_init();

    if initialized.is_ok() {
        tracing::info!("日志系统初始化完成");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_and_component_names() {
        assert_eq!(LogStage::Lookup.to_string(), "lookup");
        assert_eq!(LogComponent::Memoizer.as_str(), "memoizer");
    }

    #[test]
    fn test_init_logging_is_idempotent() {
        init_logging(Some("debug"));
        init_logging(None);
        crate::linfo!(
            "test",
            LogStage::Startup,
            LogComponent::Config,
            "init",
            "重复初始化不会失败"
        );
    }
}
