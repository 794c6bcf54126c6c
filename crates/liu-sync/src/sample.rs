//! 上游视频样本.

use liu_core::SampleTimes;

/// 一帧上游原始视频
///
/// 数据布局由连接时协商的媒体类型决定.
#[derive(Debug, Clone, Copy)]
pub struct VideoSample<'a> {
    /// 像素数据
    pub data: &'a [u8],
    /// 时间信息
    pub times: SampleTimes,
    /// 不连续标记
    pub discontinuity: bool,
    /// 预卷样本, 编码时忽略
    pub preroll: bool,
}

impl<'a> VideoSample<'a> {
    /// 创建不带时间戳的样本
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            times: SampleTimes::None,
            discontinuity: false,
            preroll: false,
        }
    }

    /// 设置起止时间
    pub fn with_times(mut self, start: i64, stop: i64) -> Self {
        self.times = SampleTimes::StartStop(start, stop);
        self
    }

    /// 只设置起始时间
    pub fn with_start(mut self, start: i64) -> Self {
        self.times = SampleTimes::Start(start);
        self
    }

    /// 设置不连续标记
    pub fn with_discontinuity(mut self, discontinuity: bool) -> Self {
        self.discontinuity = discontinuity;
        self
    }

    /// 标记为预卷样本
    pub fn with_preroll(mut self, preroll: bool) -> Self {
        self.preroll = preroll;
        self
    }
}
