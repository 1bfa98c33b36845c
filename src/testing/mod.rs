//! # 测试框架模块
//!
//! 提供测试辅助函数以及可注入故障的存储与锁

pub mod helpers;
pub mod mocks;

pub use helpers::*;
pub use mocks::*;
