//! 时间戳与时间区间.
//!
//! 所有时间均以 100 纳秒为单位 (每秒 10 000 000 tick), 与压缩器会话的时间基一致.

use std::fmt;

/// 每秒 tick 数 (时间基 1/10_000_000)
pub const TICKS_PER_SECOND: i64 = 10_000_000;

/// 每毫秒 tick 数
pub const TICKS_PER_MS: i64 = 10_000;

/// 无法从帧率推导帧时长时使用的回退值 (20ms)
pub const FALLBACK_FRAME_DURATION: i64 = 20 * TICKS_PER_MS;

/// 毫秒转 tick
pub const fn ms(value: i64) -> i64 {
    value * TICKS_PER_MS
}

/// 样本携带的时间信息
///
/// 上游可以同时给出起止时间、只给出起始时间, 或两者都不给.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SampleTimes {
    /// 没有时间戳
    #[default]
    None,
    /// 只有起始时间
    Start(i64),
    /// 起始与结束时间
    StartStop(i64, i64),
}

/// 半开时间区间 `[start, stop)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimeRange {
    /// 起始时间 (100ns)
    pub start: i64,
    /// 结束时间 (100ns)
    pub stop: i64,
}

impl TimeRange {
    /// 创建时间区间
    pub const fn new(start: i64, stop: i64) -> Self {
        Self { start, stop }
    }

    /// 区间时长 (100ns)
    pub const fn duration(&self) -> i64 {
        self.stop - self.start
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{:.3}ms, {:.3}ms)",
            self.start as f64 / TICKS_PER_MS as f64,
            self.stop as f64 / TICKS_PER_MS as f64,
        )
    }
}
