//! 运行统计.

use serde::Serialize;

/// 同步器运行统计
///
/// 计数器在 `start` 时清零.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncStats {
    /// 完成时间戳校正的样本数 (含校正后丢弃的, 不含预卷)
    pub received: u64,
    /// 忽略的预卷样本数
    pub preroll: u64,
    /// 因时间戳丢弃的样本数
    pub dropped: u64,
    /// 送入压缩器的帧数
    pub encoded: u64,
    /// 压缩器输出的数据包数
    pub packets: u64,
    /// 成功投递的数据包数
    pub delivered: u64,
    /// 被下游拒绝的投递次数
    pub refused: u64,
    /// 停止或刷新时丢弃的数据包数
    pub discarded: u64,
}
