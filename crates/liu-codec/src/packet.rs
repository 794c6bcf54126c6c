//! 压缩数据包.

use bytes::Bytes;

/// 压缩器输出的一个数据包
///
/// 时间以会话时间基 (100ns) 为单位.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressedPacket {
    /// 压缩数据
    pub data: Bytes,
    /// 显示时间戳
    pub pts: i64,
    /// 时长
    pub duration: i64,
    /// 是否为关键帧
    pub is_keyframe: bool,
}

impl CompressedPacket {
    /// 从数据创建数据包
    pub fn new(data: impl Into<Bytes>, pts: i64, duration: i64, is_keyframe: bool) -> Self {
        Self {
            data: data.into(),
            pts,
            duration,
            is_keyframe,
        }
    }

    /// 结束时间 (pts + duration)
    pub fn end(&self) -> i64 {
        self.pts.saturating_add(self.duration)
    }

    /// 数据大小 (字节)
    pub fn size(&self) -> usize {
        self.data.len()
    }
}
