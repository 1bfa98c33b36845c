//! # 测试辅助函数

use std::sync::Once;
use tracing::Level;

use crate::config::MemoizerConfig;

static INIT: Once = Once::new();

/// 初始化测试环境
pub fn init_test_env() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_max_level(Level::DEBUG)
            .with_test_writer()
            .try_init()
            .ok();
    });
}

/// 锁等待较短的内存后端配置
#[must_use]
pub fn fast_config() -> MemoizerConfig {
    let mut config = MemoizerConfig::default();
    config.lock.lease_ms = 2_000;
    config.lock.acquire_timeout_ms = 3_000;
    config.lock.retry_delay_ms = 5;
    config.store_timeout_ms = 500;
    config
}
