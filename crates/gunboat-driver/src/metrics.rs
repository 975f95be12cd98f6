//! 时序器性能指标
//!
//! 原子计数器，任何线程都可以无锁读取快照。

use std::sync::atomic::{AtomicU64, Ordering};

/// 时序器指标
///
/// # 使用示例
///
/// ```rust
/// use gunboat_driver::SequencerMetrics;
/// use std::sync::atomic::Ordering;
///
/// let metrics = SequencerMetrics::default();
/// metrics.phases_queued.fetch_add(4, Ordering::Relaxed);
/// assert_eq!(metrics.snapshot().phases_queued, 4);
/// ```
#[derive(Debug, Default)]
pub struct SequencerMetrics {
    /// 入队（或直接写出）的相位总数
    pub phases_queued: AtomicU64,

    /// 写入输出锁存器的次数（含全关写入）
    pub words_written: AtomicU64,

    /// 全关写入次数
    pub all_off_writes: AtomicU64,

    /// 总线写入失败次数
    pub bus_errors: AtomicU64,

    /// 停止期间被拒绝的步进请求数
    pub rejected_requests: AtomicU64,
}

impl SequencerMetrics {
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            phases_queued: self.phases_queued.load(Ordering::Relaxed),
            words_written: self.words_written.load(Ordering::Relaxed),
            all_off_writes: self.all_off_writes.load(Ordering::Relaxed),
            bus_errors: self.bus_errors.load(Ordering::Relaxed),
            rejected_requests: self.rejected_requests.load(Ordering::Relaxed),
        }
    }
}

/// 指标快照
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub phases_queued: u64,
    pub words_written: u64,
    pub all_off_writes: u64,
    pub bus_errors: u64,
    pub rejected_requests: u64,
}
