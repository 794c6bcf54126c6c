//! 编码配置与压缩器会话参数.
//!
//! 配置在会话启动时整体传给压缩器. `None` 表示沿用压缩器自身的默认值.

use liu_core::{Rational, TICKS_PER_SECOND};
use serde::{Deserialize, Serialize};

/// 码率控制模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndUsage {
    /// 可变码率
    #[default]
    Vbr,
    /// 恒定码率
    Cbr,
}

/// 关键帧放置模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyframeMode {
    /// 压缩器默认行为
    #[default]
    Default,
    /// 只在强制时产生关键帧
    Disabled,
    /// 按间隔自动放置
    Auto,
}

/// 编码配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderConfig {
    /// 每帧编码时限 (微秒), 0 表示不限时追求最佳质量
    pub deadline: u64,
    /// 编码线程数, 0 表示压缩器默认
    pub threads: u32,
    /// 错误恢复模式
    pub error_resilient: bool,
    /// 前瞻帧数
    pub lag_in_frames: u32,
    /// 码率控制模式
    pub end_usage: EndUsage,
    /// 目标码率 (kbit/s)
    pub target_bitrate: Option<u32>,
    /// 最小量化参数
    pub min_quantizer: Option<u32>,
    /// 最大量化参数
    pub max_quantizer: Option<u32>,
    /// 码率下冲百分比
    pub undershoot_pct: u32,
    /// 码率上冲百分比
    pub overshoot_pct: u32,
    /// 解码器缓冲区大小 (ms)
    pub decoder_buffer_size: Option<u32>,
    /// 解码器初始缓冲 (ms)
    pub decoder_buffer_initial_size: Option<u32>,
    /// 解码器最佳缓冲 (ms)
    pub decoder_buffer_optimal_size: Option<u32>,
    /// 关键帧模式
    pub keyframe_mode: KeyframeMode,
    /// 关键帧最小间隔 (帧)
    pub keyframe_min_interval: Option<u32>,
    /// 关键帧最大间隔 (帧)
    pub keyframe_max_interval: Option<u32>,
    /// 令牌分区数 (log2), 有效值 0..=3
    pub token_partitions: u32,
}

impl EncoderConfig {
    /// 不限时
    pub const DEADLINE_BEST_QUALITY: u64 = 0;
    /// 实时
    pub const DEADLINE_REALTIME: u64 = 1;
    /// 质量优先
    pub const DEADLINE_GOOD_QUALITY: u64 = 1_000_000;

    /// 实际使用的令牌分区数, 超出范围时回退为 0
    pub fn effective_token_partitions(&self) -> u32 {
        if self.token_partitions <= 3 {
            self.token_partitions
        } else {
            0
        }
    }
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            deadline: Self::DEADLINE_GOOD_QUALITY,
            threads: 0,
            error_resilient: false,
            lag_in_frames: 0,
            end_usage: EndUsage::Vbr,
            target_bitrate: None,
            min_quantizer: None,
            max_quantizer: None,
            undershoot_pct: 100,
            overshoot_pct: 100,
            decoder_buffer_size: None,
            decoder_buffer_initial_size: None,
            decoder_buffer_optimal_size: None,
            keyframe_mode: KeyframeMode::Default,
            keyframe_min_interval: None,
            keyframe_max_interval: None,
            token_partitions: 0,
        }
    }
}

/// 压缩器会话参数
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressorParams {
    /// 宽度 (像素)
    pub width: u32,
    /// 高度 (像素)
    pub height: u32,
    /// 时间基, 固定为 1/10_000_000
    pub time_base: Rational,
    /// 编码配置
    pub config: EncoderConfig,
}

impl CompressorParams {
    /// 以 100ns 时间基创建会话参数
    pub fn new(width: u32, height: u32, config: EncoderConfig) -> Self {
        Self {
            width,
            height,
            time_base: Rational::new(1, TICKS_PER_SECOND as i32),
            config,
        }
    }
}
