//! # 记忆化统计

use std::sync::atomic::{AtomicU64, Ordering};

/// 进程内计数器，仅用于观测
#[derive(Debug, Default)]
pub struct MemoStats {
    hits: AtomicU64,
    misses: AtomicU64,
    computations: AtomicU64,
    store_faults: AtomicU64,
    corrupt_records: AtomicU64,
    operation_failures: AtomicU64,
    lock_failures: AtomicU64,
}

impl MemoStats {
    pub(crate) fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_computation(&self) {
        self.computations.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_store_fault(&self) {
        self.store_faults.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_corrupt_record(&self) {
        self.corrupt_records.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_operation_failure(&self) {
        self.operation_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_lock_failure(&self) {
        self.lock_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// 当前计数快照
    #[must_use]
    pub fn snapshot(&self) -> MemoStatsSnapshot {
        MemoStatsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            computations: self.computations.load(Ordering::Relaxed),
            store_faults: self.store_faults.load(Ordering::Relaxed),
            corrupt_records: self.corrupt_records.load(Ordering::Relaxed),
            operation_failures: self.operation_failures.load(Ordering::Relaxed),
            lock_failures: self.lock_failures.load(Ordering::Relaxed),
        }
    }
}

/// 统计快照
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoStatsSnapshot {
    /// 缓存命中次数（快速路径与锁内复查）
    pub hits: u64,
    /// 存储明确返回“不存在”的次数
    pub misses: u64,
    /// 实际执行被包装操作的次数
    pub computations: u64,
    /// 存储不可用次数（读或写）
    pub store_faults: u64,
    /// 记录无法解码的次数
    pub corrupt_records: u64,
    /// 被包装操作失败的次数
    pub operation_failures: u64,
    /// 获取锁失败的次数
    pub lock_failures: u64,
}

impl MemoStatsSnapshot {
    /// 命中率
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
