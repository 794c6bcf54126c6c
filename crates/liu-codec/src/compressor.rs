//! 压缩器 trait 定义.
//!
//! 帧同步引擎只通过 `Compressor` 驱动压缩器, 不关心具体压缩算法.

use bitflags::bitflags;
use liu_core::LiuResult;
use liu_image::ImageBuffer;

use crate::config::CompressorParams;
use crate::packet::CompressedPacket;

bitflags! {
    /// 编码标志
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct EncodeFlags: u32 {
        /// 强制输出关键帧
        const FORCE_KEYFRAME = 0x1;
    }
}

/// 压缩器 trait
///
/// 编码流程:
/// 1. 调用 `open()` 打开会话
/// 2. 调用 `encode()` 送入一帧图像
/// 3. 反复调用 `next_packet()` 直到返回 `None`, 取出本次就绪的数据包
/// 4. 送入 `None` 图像表示流结束, 压缩器输出所有缓存的数据包
/// 5. 调用 `close()` 结束会话
pub trait Compressor: Send {
    /// 压缩器名称
    fn name(&self) -> &str;

    /// 打开会话
    fn open(&mut self, params: &CompressorParams) -> LiuResult<()>;

    /// 送入一帧图像
    ///
    /// # 参数
    /// - `image`: 图像, `None` 表示流结束
    /// - `pts`: 显示时间戳 (会话时间基)
    /// - `duration`: 帧时长 (会话时间基)
    /// - `flags`: 编码标志
    /// - `deadline`: 编码时限 (微秒)
    fn encode(
        &mut self,
        image: Option<&ImageBuffer<'_>>,
        pts: i64,
        duration: i64,
        flags: EncodeFlags,
        deadline: u64,
    ) -> LiuResult<()>;

    /// 取出一个就绪的数据包, 没有时返回 `None`
    fn next_packet(&mut self) -> Option<CompressedPacket>;

    /// 关闭会话, 丢弃内部所有缓存
    fn close(&mut self);

    /// 单次遍历本次就绪的数据包
    fn packets(&mut self) -> Packets<'_>
    where
        Self: Sized,
    {
        Packets::new(self)
    }
}

/// 就绪数据包迭代器
///
/// 第一次遇到 `None` 后结束, 之后不再询问压缩器.
pub struct Packets<'a> {
    compressor: &'a mut dyn Compressor,
    done: bool,
}

impl<'a> Packets<'a> {
    /// 遍历给定压缩器的就绪数据包
    pub fn new(compressor: &'a mut dyn Compressor) -> Self {
        Self {
            compressor,
            done: false,
        }
    }
}

impl Iterator for Packets<'_> {
    type Item = CompressedPacket;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let packet = self.compressor.next_packet();
        if packet.is_none() {
            self.done = true;
        }
        packet
    }
}

impl std::iter::FusedIterator for Packets<'_> {}
