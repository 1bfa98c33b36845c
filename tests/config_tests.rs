//! # 配置加载集成测试

use locking_memoizer::config::{
    BackendType, MemoizerConfig, apply_overrides_from, load_config_from, parse_config,
};
use locking_memoizer::{MemoError, Memoizer};
use pretty_assertions::assert_eq;
use rstest::rstest;
use std::collections::HashMap;
use std::io::Write;
use std::time::Duration;
use tempfile::NamedTempFile;

fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect();
    move |name| map.get(name).cloned()
}

#[test]
fn test_load_redis_config_from_file() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
backend = "redis"
default_ttl_ms = 30000
key_namespace = "memos"

[lock]
lease_ms = 2000
acquire_timeout_ms = 4000
retry_delay_ms = 25

[redis]
host = "cache.internal"
port = 6380
database = 2
password = "s3cret"
"#
    )
    .unwrap();

    let config = load_config_from(file.path()).unwrap();

    assert_eq!(config.backend, BackendType::Redis);
    assert_eq!(config.default_ttl(), Duration::from_secs(30));
    assert_eq!(config.lock.lease(), Duration::from_secs(2));
    assert_eq!(config.lock.retry_delay(), Duration::from_millis(25));
    assert_eq!(config.key_secret, "memo");

    let redis = config.redis.unwrap();
    assert_eq!(redis.build_url(), "redis://:s3cret@cache.internal:6380/2");
}

#[test]
fn test_empty_file_yields_defaults() {
    let file = NamedTempFile::new().unwrap();
    let config = load_config_from(file.path()).unwrap();

    assert_eq!(config.backend, BackendType::Memory);
    assert_eq!(config.default_ttl_ms, 60_000);
    assert_eq!(config.key_namespace, "memos");
    assert!(config.redis.is_none());
}

#[test]
fn test_missing_file_is_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = load_config_from(dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, MemoError::Config { .. }));
}

#[test]
fn test_malformed_toml_is_config_error() {
    let err = parse_config("backend = [not toml").unwrap_err();
    assert!(matches!(err, MemoError::Config { .. }));
}

#[test]
fn test_overrides_apply() {
    let mut config = MemoizerConfig::default();
    let applied = apply_overrides_from(
        &mut config,
        vars(&[
            ("MEMOIZER_BACKEND", "Redis"),
            ("MEMOIZER_REDIS_URL", "redis://10.0.0.5:6379/1"),
            ("MEMOIZER_DEFAULT_TTL_MS", " 1500 "),
            ("MEMOIZER_LOCK_LEASE_MS", "750"),
        ]),
    )
    .unwrap();

    assert_eq!(applied, 4);
    assert_eq!(config.backend, BackendType::Redis);
    assert_eq!(config.default_ttl_ms, 1500);
    assert_eq!(config.lock.lease_ms, 750);
    assert_eq!(config.redis.as_ref().unwrap().build_url(), "redis://10.0.0.5:6379/1");
    config.validate().unwrap();
}

#[rstest]
#[case::backend(("MEMOIZER_BACKEND", "memcached"))]
#[case::ttl(("MEMOIZER_DEFAULT_TTL_MS", "soon"))]
#[case::lease(("MEMOIZER_LOCK_LEASE_MS", "-1"))]
fn test_invalid_overrides_are_rejected(#[case] pair: (&str, &str)) {
    let mut config = MemoizerConfig::default();
    let err = apply_overrides_from(&mut config, vars(&[pair])).unwrap_err();
    assert!(matches!(err, MemoError::Config { .. }));
}

#[rstest]
#[case::zero_lease("[lock]\nlease_ms = 0")]
#[case::zero_retry("[lock]\nretry_delay_ms = 0")]
#[case::timeout_below_retry("[lock]\nacquire_timeout_ms = 10\nretry_delay_ms = 50")]
#[case::empty_namespace("key_namespace = \"\"")]
#[case::lock_prefix_namespace("key_namespace = \"lock.memos\"")]
#[case::empty_secret("key_secret = \"\"")]
#[case::zero_store_timeout("store_timeout_ms = 0")]
#[case::redis_without_section("backend = \"redis\"")]
#[case::redis_without_address("backend = \"redis\"\n[redis]\nhost = \"\"")]
#[case::redis_section_on_memory("[redis]\nurl = \"redis://127.0.0.1/\"")]
fn test_validation_rejects(#[case] content: &str) {
    let config = parse_config(content).unwrap();
    let err = config.validate().unwrap_err();
    assert!(matches!(err, MemoError::Config { .. }), "{content}: {err}");
}

#[tokio::test]
async fn test_memoizer_from_invalid_config_fails() {
    let mut config = MemoizerConfig::default();
    config.lock.lease_ms = 0;

    let err = Memoizer::from_config(&config).await.err().unwrap();
    assert!(matches!(err, MemoError::Config { .. }));
}
