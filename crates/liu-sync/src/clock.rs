//! 流时钟: 时间戳校正.
//!
//! 参考时间为上一个已发出帧的结束时间. 每个被接受的帧都满足
//! `start >= 参考时间` 且 `stop > start`, 输出时间戳因此严格单调.

use liu_core::{LiuError, LiuResult, SampleTimes, TimeRange};

/// 流时钟
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamClock {
    reference: Option<i64>,
}

impl StreamClock {
    /// 创建未设置参考时间的时钟
    pub fn new() -> Self {
        Self::default()
    }

    /// 当前参考时间, 尚未发出任何帧时为 `None`
    pub fn reference(&self) -> Option<i64> {
        self.reference
    }

    /// 清除参考时间
    pub fn reset(&mut self) {
        self.reference = None;
    }

    /// 计算样本的输出时间区间
    ///
    /// 返回 `Ok(None)` 表示该样本应被丢弃 (包括补足名义时长后溢出 i64 的情况). 本方法不修改时钟,
    /// 帧成功送入压缩器后再调用 [`StreamClock::advance`].
    ///
    /// # 参数
    /// - `times`: 样本携带的时间
    /// - `nominal`: 名义帧时长 (100ns), 必须为正
    pub fn reconcile(&self, times: SampleTimes, nominal: i64) -> LiuResult<Option<TimeRange>> {
        let range = match times {
            SampleTimes::None => {
                let Some(reference) = self.reference else {
                    return Ok(None);
                };
                let Some(stop) = reference.checked_add(nominal) else {
                    return Ok(None);
                };
                TimeRange::new(reference, stop)
            }
            SampleTimes::StartStop(start, stop) => {
                if start > stop {
                    return Err(LiuError::OrderingViolation { start, stop });
                }
                if stop <= 0 {
                    return Ok(None);
                }
                let start = self.clamp_start(start.max(0));
                let stop = if stop <= start {
                    let Some(stop) = start.checked_add(nominal) else {
                        return Ok(None);
                    };
                    stop
                } else {
                    stop
                };
                TimeRange::new(start, stop)
            }
            SampleTimes::Start(start) => {
                if start < 0 {
                    return Ok(None);
                }
                let start = self.clamp_start(start);
                let Some(stop) = start.checked_add(nominal) else {
                    return Ok(None);
                };
                TimeRange::new(start, stop)
            }
        };
        Ok(Some(range))
    }

    /// 以已发出的帧推进参考时间
    pub fn advance(&mut self, range: TimeRange) {
        self.reference = Some(range.stop);
    }

    /// 首帧起始时间不晚于 0, 之后的帧不早于参考时间
    fn clamp_start(&self, start: i64) -> i64 {
        match self.reference {
            None => start.min(0),
            Some(reference) => start.max(reference),
        }
    }
}
