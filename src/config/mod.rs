//! # 配置管理模块
//!
//! 处理配置加载、环境变量覆盖和验证

mod app_config;

pub use app_config::{BackendType, LockConfig, MemoizerConfig, RedisConfig};

use std::env;
use std::path::Path;

use crate::error::{MemoError, Result};
use crate::logging::{LogComponent, LogStage};
use crate::{ldebug, linfo};

/// 配置文件路径环境变量
pub const CONFIG_PATH_ENV: &str = "MEMOIZER_CONFIG_PATH";

/// 加载配置文件
///
/// 优先使用 `MEMOIZER_CONFIG_PATH`，否则读取 `config/memoizer.{RUST_ENV}.toml`。
pub fn load_config() -> Result<MemoizerConfig> {
    let config_file = env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| {
        let env = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());
        format!("config/memoizer.{env}.toml")
    });

    load_config_from(&config_file)
}

/// 从指定文件加载配置，并应用环境变量覆盖
pub fn load_config_from(path: impl AsRef<Path>) -> Result<MemoizerConfig> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(MemoError::config(format!("配置文件不存在: {}", path.display())));
    }

    let content = std::fs::read_to_string(path).map_err(|e| {
        MemoError::config_with_source(format!("读取配置文件失败: {}", path.display()), e)
    })?;

    let mut config = parse_config(&content)?;
    let applied = apply_env_overrides(&mut config)?;
    config.validate()?;

    linfo!(
        "system",
        LogStage::Config,
        LogComponent::Config,
        "config_loaded",
        &format!(
            "配置加载完成: file={}, backend={:?}, env_overrides={}",
            path.display(),
            config.backend,
            applied
        )
    );

    Ok(config)
}

/// 解析 TOML 配置文本
pub fn parse_config(content: &str) -> Result<MemoizerConfig> {
    let config: MemoizerConfig = toml::from_str(content)?;
    Ok(config)
}

/// 应用环境变量覆盖，返回生效的覆盖数量
pub fn apply_env_overrides(config: &mut MemoizerConfig) -> Result<usize> {
    apply_overrides_from(config, |name| env::var(name).ok())
}

/// 从任意变量来源应用覆盖
pub fn apply_overrides_from<F>(config: &mut MemoizerConfig, lookup: F) -> Result<usize>
where
    F: Fn(&str) -> Option<String>,
{
    let mut applied = 0;

    if let Some(backend) = lookup("MEMOIZER_BACKEND") {
        config.backend = match backend.to_lowercase().as_str() {
            "memory" => BackendType::Memory,
            "redis" => BackendType::Redis,
            other => {
                return Err(MemoError::config(format!(
                    "MEMOIZER_BACKEND 取值无效: {other}"
                )));
            }
        };
        applied += 1;
    }

    if let Some(url) = lookup("MEMOIZER_REDIS_URL") {
        config.redis.get_or_insert_with(RedisConfig::default).url = url;
        applied += 1;
    }

    if let Some(ttl) = parse_u64_var(&lookup, "MEMOIZER_DEFAULT_TTL_MS")? {
        config.default_ttl_ms = ttl;
        applied += 1;
    }

    if let Some(lease) = parse_u64_var(&lookup, "MEMOIZER_LOCK_LEASE_MS")? {
        config.lock.lease_ms = lease;
        applied += 1;
    }

    if applied > 0 {
        ldebug!(
            "system",
            LogStage::Config,
            LogComponent::Config,
            "env_overrides",
            &format!("应用环境变量覆盖 {applied} 项")
        );
    }

    Ok(applied)
}

fn parse_u64_var<F>(lookup: &F, name: &str) -> Result<Option<u64>>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|e| {
                MemoError::config_with_source(format!("{name} 不是有效的整数: {raw}"), e)
            }),
        None => Ok(None),
    }
}
