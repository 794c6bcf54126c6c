//! 下游能力接口.
//!
//! 每个下游分支 (压缩输出与预览) 都实现 [`StreamControl`], 接收刷新、流结束与分段通知.
//! 压缩输出额外实现 [`PacketSink`], 并由 [`BufferPool`] 提供输出缓冲.
//!
//! 同步器调用这些接口时不持有内部锁, 实现可以阻塞, 也可以回调同步器.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use bytes::BytesMut;
use liu_core::{LiuError, LiuResult, TimeRange};
use liu_image::ImageBuffer;

use crate::pending::PendingFrame;

/// 播放分段
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    /// 起始时间 (100ns)
    pub start: i64,
    /// 结束时间 (100ns)
    pub stop: i64,
    /// 播放速率
    pub rate: f64,
}

impl Segment {
    /// 创建分段
    pub const fn new(start: i64, stop: i64, rate: f64) -> Self {
        Self { start, stop, rate }
    }
}

/// 流控制通知
///
/// 默认实现为空操作.
pub trait StreamControl: Send + Sync {
    /// 开始刷新, 丢弃所有在途数据
    fn begin_flush(&self) -> LiuResult<()> {
        Ok(())
    }

    /// 结束刷新
    fn end_flush(&self) -> LiuResult<()> {
        Ok(())
    }

    /// 流结束
    fn end_of_stream(&self) -> LiuResult<()> {
        Ok(())
    }

    /// 新分段
    fn new_segment(&self, _segment: Segment) -> LiuResult<()> {
        Ok(())
    }
}

/// 压缩数据接收端
pub trait PacketSink: StreamControl {
    /// 接收一个输出缓冲
    ///
    /// 返回 `BackpressureRejected` 表示暂不接收, 同步器会保留该帧稍后重试.
    fn receive(&self, buffer: &OutputBuffer) -> LiuResult<()>;

    /// `receive` 是否可能阻塞
    fn can_block(&self) -> bool {
        true
    }
}

/// 预览接收端
pub trait PreviewSink: StreamControl {
    /// 渲染一帧已统一布局的图像
    fn render(&self, image: &ImageBuffer<'_>) -> LiuResult<()>;
}

/// 输出缓冲池
pub trait BufferPool: Send + Sync {
    /// 获取一个输出缓冲, 可能阻塞直到有空闲缓冲
    fn acquire(&self) -> LiuResult<OutputBuffer>;
}

/// 输出缓冲
///
/// 承载一个压缩帧及其时间、关键帧与不连续标记.
#[derive(Debug, Clone, Default)]
pub struct OutputBuffer {
    data: BytesMut,
    start: i64,
    stop: i64,
    sync_point: bool,
    discontinuity: bool,
    preroll: bool,
}

impl OutputBuffer {
    /// 创建空缓冲
    pub fn new() -> Self {
        Self::default()
    }

    /// 预留指定容量
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: BytesMut::with_capacity(capacity),
            ..Self::default()
        }
    }

    /// 填充待投递帧
    pub(crate) fn populate(&mut self, frame: &PendingFrame, discontinuity: bool) {
        self.data.clear();
        self.data.extend_from_slice(&frame.payload);
        self.start = frame.start;
        self.stop = frame.stop;
        self.sync_point = frame.key;
        self.discontinuity = discontinuity;
        self.preroll = false;
    }

    /// 压缩数据
    pub fn payload(&self) -> &[u8] {
        &self.data
    }

    /// 数据长度
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// 已分配容量
    pub fn capacity(&self) -> usize {
        self.data.capacity()
    }

    /// 起始时间
    pub fn start(&self) -> i64 {
        self.start
    }

    /// 结束时间
    pub fn stop(&self) -> i64 {
        self.stop
    }

    /// 时间区间
    pub fn time_range(&self) -> TimeRange {
        TimeRange::new(self.start, self.stop)
    }

    /// 是否为同步点 (关键帧)
    pub fn is_sync_point(&self) -> bool {
        self.sync_point
    }

    /// 是否带不连续标记
    pub fn is_discontinuity(&self) -> bool {
        self.discontinuity
    }

    /// 是否为预卷数据, 同步器输出的缓冲恒为 false
    pub fn is_preroll(&self) -> bool {
        self.preroll
    }
}

/// 堆上分配的缓冲池
///
/// 每次 `acquire` 分配一个新缓冲. 关闭后 `acquire` 返回错误.
#[derive(Debug)]
pub struct HeapPool {
    buffer_size: usize,
    acquired: AtomicU64,
    closed: AtomicBool,
}

impl HeapPool {
    /// 创建缓冲池
    pub fn new(buffer_size: usize) -> Self {
        Self {
            buffer_size,
            acquired: AtomicU64::new(0),
            closed: AtomicBool::new(false),
        }
    }

    /// 已分配的缓冲数
    pub fn acquired(&self) -> u64 {
        self.acquired.load(Ordering::Relaxed)
    }

    /// 关闭缓冲池
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }
}

impl BufferPool for HeapPool {
    fn acquire(&self) -> LiuResult<OutputBuffer> {
        if self.closed.load(Ordering::Acquire) {
            return Err(LiuError::AllocationFailure("缓冲池已关闭".into()));
        }
        self.acquired.fetch_add(1, Ordering::Relaxed);
        Ok(OutputBuffer::with_capacity(self.buffer_size))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[test]
    fn test_populate_copies_frame() {
        let frame = PendingFrame {
            payload: Bytes::from_static(b"abc"),
            start: 10,
            stop: 20,
            key: true,
        };
        let mut buf = OutputBuffer::with_capacity(16);
        buf.populate(&frame, true);
        assert_eq!(buf.payload(), b"abc");
        assert_eq!(buf.time_range(), TimeRange::new(10, 20));
        assert!(buf.is_sync_point());
        assert!(buf.is_discontinuity());
        assert!(!buf.is_preroll());
    }

    #[test]
    fn test_heap_pool_close() {
        let pool = HeapPool::new(64);
        let buf = pool.acquire().unwrap();
        assert!(buf.capacity() >= 64);
        assert_eq!(pool.acquired(), 1);
        pool.close();
        assert!(matches!(pool.acquire(), Err(LiuError::AllocationFailure(_))));
    }
}
