//! 待投递队列.

use std::collections::VecDeque;

use bytes::Bytes;
use liu_codec::CompressedPacket;
use liu_core::TimeRange;

/// 等待投递的压缩帧
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingFrame {
    /// 压缩数据
    pub payload: Bytes,
    /// 起始时间 (100ns)
    pub start: i64,
    /// 结束时间 (100ns)
    pub stop: i64,
    /// 是否为关键帧
    pub key: bool,
}

impl PendingFrame {
    /// 时间区间
    pub fn time_range(&self) -> TimeRange {
        TimeRange::new(self.start, self.stop)
    }
}

impl From<CompressedPacket> for PendingFrame {
    fn from(pkt: CompressedPacket) -> Self {
        let stop = pkt.end();
        Self {
            payload: pkt.data,
            start: pkt.pts,
            stop,
            key: pkt.is_keyframe,
        }
    }
}

/// 先进先出的待投递队列
///
/// 容量上限为软限制: `push_back` 从不拒绝, 由调用方在送入新帧前检查 [`PendingQueue::is_full`].
/// 上限为 0 表示不限.
#[derive(Debug, Clone, Default)]
pub struct PendingQueue {
    frames: VecDeque<PendingFrame>,
    limit: usize,
}

impl PendingQueue {
    /// 创建队列
    pub fn new(limit: usize) -> Self {
        Self {
            frames: VecDeque::new(),
            limit,
        }
    }

    /// 软上限
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// 队尾追加
    pub fn push_back(&mut self, frame: PendingFrame) {
        self.frames.push_back(frame);
    }

    /// 放回队首 (投递被拒绝时使用)
    pub fn push_front(&mut self, frame: PendingFrame) {
        self.frames.push_front(frame);
    }

    /// 取出最早的帧
    pub fn pop_front(&mut self) -> Option<PendingFrame> {
        self.frames.pop_front()
    }

    /// 查看最早的帧
    pub fn front(&self) -> Option<&PendingFrame> {
        self.frames.front()
    }

    /// 帧数
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// 是否已达软上限
    pub fn is_full(&self) -> bool {
        self.limit > 0 && self.frames.len() >= self.limit
    }

    /// 丢弃所有帧, 返回丢弃数量
    pub fn purge(&mut self) -> usize {
        let n = self.frames.len();
        self.frames.clear();
        n
    }

    /// 按投递顺序遍历
    pub fn iter(&self) -> impl Iterator<Item = &PendingFrame> {
        self.frames.iter()
    }
}
