//! # 缓存模块
//!
//! 缓存键、值编解码、存储适配器以及内存 / Redis 两种后端

pub mod client;
pub mod codec;
pub mod keys;
pub mod memory;
pub mod redis_store;
pub mod store;

pub use client::RedisClient;
pub use keys::{CacheKeyBuilder, CallKey, FunctionKey, MemoArgs};
pub use memory::MemoryStore;
pub use redis_store::RedisStore;
pub use store::{CacheStore, KeyValueStore};
