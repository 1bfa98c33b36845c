//! # 缓存键命名规范
//!
//! 函数键与调用键的生成：
//!
//! - 函数键 `function_key = HMAC(secret, name)`，每次 `memoize` 计算一次
//! - 调用键 `{namespace}:{function_key}:{HMAC(secret, args...)}`，每次调用计算
//! - 锁键 `lock.{call_key}`，与缓存键处于不同前缀

use hmac::{Hmac, Mac};
use serde::Serialize;
use serde_json::Value;
use sha2::Sha256;
use std::fmt;

use crate::error::{MemoError, Result};

type HmacSha256 = Hmac<Sha256>;

/// 缓存键默认命名空间
pub const DEFAULT_NAMESPACE: &str = "memos";
/// 锁键前缀
pub const LOCK_KEY_PREFIX: &str = "lock.";
/// 参数序列化后的连接符
pub const ARGUMENT_DELIMITER: &str = ",";

/// 逻辑名称的摘要，跨进程重启保持稳定
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FunctionKey(String);

impl FunctionKey {
    /// 由逻辑名称计算函数键
    #[must_use]
    pub fn from_name(name: &str, secret: &str) -> Self {
        Self(keyed_digest(secret, name.as_bytes()))
    }

    /// 十六进制摘要
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FunctionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 一次调用对应的缓存键
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CallKey(String);

impl CallKey {
    /// 完整键字符串
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CallKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 缓存键构建器
#[derive(Debug, Clone)]
pub struct CacheKeyBuilder {
    namespace: String,
    secret: String,
}

impl Default for CacheKeyBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_NAMESPACE, "memo")
    }
}

impl CacheKeyBuilder {
    /// 创建构建器
    #[must_use]
    pub fn new(namespace: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            secret: secret.into(),
        }
    }

    /// 从配置创建构建器
    #[must_use]
    pub fn from_config(config: &crate::config::MemoizerConfig) -> Self {
        Self::new(config.key_namespace.clone(), config.key_secret.clone())
    }

    /// 命名空间
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// 构建函数键
    #[must_use]
    pub fn function_key(&self, name: &str) -> FunctionKey {
        FunctionKey::from_name(name, &self.secret)
    }

    /// 构建调用键
    #[must_use]
    pub fn call_key(&self, function_key: &FunctionKey, args: &[Value]) -> CallKey {
        let serialized = args
            .iter()
            .map(Value::to_string)
            .collect::<Vec<_>>()
            .join(ARGUMENT_DELIMITER);
        let arguments_key = keyed_digest(&self.secret, serialized.as_bytes());

        CallKey(format!("{}:{function_key}:{arguments_key}", self.namespace))
    }

    /// 构建调用键对应的锁键
    #[must_use]
    pub fn lock_key(&self, call_key: &CallKey) -> String {
        format!("{LOCK_KEY_PREFIX}{call_key}")
    }

    /// 某个函数所有调用键的匹配模式（用于运维排查）
    #[must_use]
    pub fn pattern(&self, function_key: &FunctionKey) -> String {
        format!("{}:{function_key}:*", self.namespace)
    }
}

/// 可作为记忆化调用参数的类型
///
/// 为最多 8 元的元组实现，每个元素单独序列化。
pub trait MemoArgs {
    /// 将每个参数转换为 JSON 值
    fn to_arg_values(&self) -> std::result::Result<Vec<Value>, serde_json::Error>;

    /// 转换参数，失败时返回 `InvalidArguments`
    fn arg_values(&self) -> Result<Vec<Value>> {
        self.to_arg_values().map_err(|e| {
            MemoError::invalid_arguments_with_source("参数无法序列化为 JSON", e)
        })
    }
}

impl MemoArgs for () {
    fn to_arg_values(&self) -> std::result::Result<Vec<Value>, serde_json::Error> {
        Ok(Vec::new())
    }
}

macro_rules! impl_memo_args {
    ($($name:ident)+) => {
        impl<$($name: Serialize),+> MemoArgs for ($($name,)+) {
            #[allow(non_snake_case)]
            fn to_arg_values(&self) -> std::result::Result<Vec<Value>, serde_json::Error> {
                let ($($name,)+) = self;
                Ok(vec![$(serde_json::to_value($name)?),+])
            }
        }
    };
}

impl_memo_args!(A1);
impl_memo_args!(A1 A2);
impl_memo_args!(A1 A2 A3);
impl_memo_args!(A1 A2 A3 A4);
impl_memo_args!(A1 A2 A3 A4 A5);
impl_memo_args!(A1 A2 A3 A4 A5 A6);
impl_memo_args!(A1 A2 A3 A4 A5 A6 A7);
impl_memo_args!(A1 A2 A3 A4 A5 A6 A7 A8);

fn keyed_digest(secret: &str, payload: &[u8]) -> String {
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => unreachable!("HMAC accepts keys of any length"),
    };
    mac.update(payload);
    hex::encode(mac.finalize().into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn test_function_key_is_stable() {
        let a = FunctionKey::from_name("users.lookup", "memo");
        let b = FunctionKey::from_name("users.lookup", "memo");
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), 64);
    }

    #[test]
    fn test_function_key_depends_on_secret() {
        let a = FunctionKey::from_name("users.lookup", "memo");
        let b = FunctionKey::from_name("users.lookup", "other");
        assert_ne!(a, b);
    }

    #[test]
    fn test_call_key_layout() {
        let builder = CacheKeyBuilder::default();
        let fk = builder.function_key("users.lookup");
        let key = builder.call_key(&fk, &[json!(42), json!("alice")]);

        let parts: Vec<&str> = key.as_str().split(':').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "memos");
        assert_eq!(parts[1], fk.as_str());
        assert_eq!(parts[2], keyed_digest("memo", br#"42,"alice""#));
    }

    #[test]
    fn test_different_names_never_share_keys() {
        let builder = CacheKeyBuilder::default();
        let args = [json!(1)];
        let a = builder.call_key(&builder.function_key("a"), &args);
        let b = builder.call_key(&builder.function_key("b"), &args);
        assert_ne!(a, b);
    }

    #[test]
    fn test_argument_order_matters() {
        let builder = CacheKeyBuilder::default();
        let fk = builder.function_key("f");
        let a = builder.call_key(&fk, &[json!(1), json!(2)]);
        let b = builder.call_key(&fk, &[json!(2), json!(1)]);
        assert_ne!(a, b);
    }

    #[test]
    fn test_object_arguments_are_canonical() {
        let builder = CacheKeyBuilder::default();
        let fk = builder.function_key("f");
        let a = builder.call_key(&fk, &[json!({"a": 1, "b": 2})]);
        let b = builder.call_key(&fk, &[json!({"b": 2, "a": 1})]);
        assert_eq!(a, b);
    }

    #[test]
    fn test_lock_key_is_distinct_from_cache_key() {
        let builder = CacheKeyBuilder::default();
        let key = builder.call_key(&builder.function_key("f"), &[]);
        let lock_key = builder.lock_key(&key);

        assert!(lock_key.starts_with(LOCK_KEY_PREFIX));
        assert!(!key.as_str().starts_with(LOCK_KEY_PREFIX));
        assert_eq!(lock_key, format!("lock.{key}"));
    }

    #[test]
    fn test_pattern() {
        let builder = CacheKeyBuilder::new("cache", "s");
        let fk = builder.function_key("f");
        assert_eq!(builder.pattern(&fk), format!("cache:{fk}:*"));
    }

    #[test]
    fn test_tuple_args() {
        let values = (1u32, "two", Some(3.5f64), None::<String>).to_arg_values().unwrap();
        assert_eq!(values, vec![json!(1), json!("two"), json!(3.5), Value::Null]);
        assert!(().to_arg_values().unwrap().is_empty());
    }

    #[test]
    fn test_unserializable_args_are_rejected() {
        use std::collections::HashMap;

        let mut map = HashMap::new();
        map.insert((1, 2), "tuple keys are not valid JSON keys");
        let err = (map,).arg_values().unwrap_err();
        assert!(matches!(err, MemoError::InvalidArguments { .. }));
    }

    proptest! {
        #[test]
        fn prop_same_arguments_same_key(name in "[a-z.]{1,16}", n in any::<i64>(), s in ".*") {
            let builder = CacheKeyBuilder::default();
            let fk = builder.function_key(&name);
            let args = (n, s.clone()).to_arg_values().unwrap();
            prop_assert_eq!(builder.call_key(&fk, &args), builder.call_key(&fk, &args.clone()));
        }

        #[test]
        fn prop_distinct_numbers_distinct_keys(a in any::<i64>(), b in any::<i64>()) {
            prop_assume!(a != b);
            let builder = CacheKeyBuilder::default();
            let fk = builder.function_key("f");
            prop_assert_ne!(builder.call_key(&fk, &[json!(a)]), builder.call_key(&fk, &[json!(b)]));
        }
    }
}
