//! # Locking Memoizer
//!
//! 基于共享键值存储与分布式锁的异步函数记忆化库

pub mod cache;
pub mod config;
pub mod error;
pub mod lock;
pub mod logging;
pub mod memo;
pub mod testing;

// Re-export commonly used types
pub use cache::{CacheKeyBuilder, CallKey, FunctionKey, MemoArgs};
pub use config::{BackendType, MemoizerConfig};
pub use error::{MemoError, Result};
pub use lock::{DistributedLock, with_lock};
pub use memo::{MemoOptions, MemoSpec, Memoized, Memoizer};
