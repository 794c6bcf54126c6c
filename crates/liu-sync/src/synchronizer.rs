//! 帧同步器.
//!
//! 状态机驱动接收、压缩器调用、待投递队列与背压投递.
//!
//! 两把锁:
//! - 接收锁: 持有颜色转换暂存区, 只在转换与编码期间持有
//! - 状态锁: 串行化所有修改状态的操作
//!
//! 加锁顺序固定为先接收锁后状态锁. 刷新、启动与停止不会等待接收锁.
//! 获取缓冲与投递前两把锁都已释放, 下游可以在 `receive` 中回调同步器.
//! 预览渲染时图像仍借用暂存区, 只释放状态锁, 预览分支不能回调 `receive`/`end_of_stream`.
//!
//! 重新获取状态锁后再次校验状态:
//! 期间被停止则以 `NotRunning` 结束, 进入刷新则以 `BackpressureRejected` 结束.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError};

use liu_codec::{Compressor, CompressorParams, EncodeFlags, Packets};
use liu_core::{LiuError, LiuResult, MediaType, VideoSubtype};
use liu_image::{ColorConverter, ImageBuffer};
use log::{debug, trace, warn};

use crate::clock::StreamClock;
use crate::config::SyncConfig;
use crate::downstream::{BufferPool, PacketSink, PreviewSink, Segment, StreamControl};
use crate::pending::PendingQueue;
use crate::sample::VideoSample;
use crate::stats::SyncStats;

/// 同步器状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SynchronizerState {
    /// 已停止, 没有打开的压缩器会话
    Stopped,
    /// 运行中
    Running,
    /// 刷新中, 暂停接收与投递
    Flushing,
}

struct Inner {
    media: Option<MediaType>,
    sink: Option<Arc<dyn PacketSink>>,
    pool: Option<Arc<dyn BufferPool>>,
    preview: Option<Arc<dyn PreviewSink>>,
    compressor: Box<dyn Compressor>,
    config: SyncConfig,
    running: bool,
    flushing: bool,
    end_of_stream: bool,
    /// 流结束已转发给下游
    eos_forwarded: bool,
    /// 下一个投递的缓冲是否带不连续标记
    discontinuity: bool,
    /// 每次启动/停止递增, 用于识别解锁期间发生的重启
    generation: u64,
    clock: StreamClock,
    pending: PendingQueue,
    stats: SyncStats,
    /// 停止时接收锁被占用, 暂存区留待下次接收时释放
    release_scratch: bool,
}

impl Inner {
    fn state(&self) -> SynchronizerState {
        match (self.running, self.flushing) {
            (false, _) => SynchronizerState::Stopped,
            (true, false) => SynchronizerState::Running,
            (true, true) => SynchronizerState::Flushing,
        }
    }

    fn connected(&self) -> LiuResult<MediaType> {
        self.media.ok_or(LiuError::NotConnected)
    }

    fn require_stopped(&self) -> LiuResult<()> {
        if self.running {
            return Err(LiuError::NotStopped);
        }
        Ok(())
    }

    /// 接收前检查, 失败时没有任何副作用
    fn check_ingest(&self) -> LiuResult<MediaType> {
        let media = self.connected()?;
        if !self.running {
            return Err(LiuError::NotRunning);
        }
        if self.end_of_stream {
            return Err(LiuError::RejectedAfterEndOfStream);
        }
        if self.flushing {
            return Err(LiuError::BackpressureRejected);
        }
        Ok(media)
    }

    /// 重新获取状态锁后的校验
    fn revalidate(&self, generation: u64) -> LiuResult<()> {
        if !self.running || self.generation != generation {
            return Err(LiuError::NotRunning);
        }
        if self.flushing {
            return Err(LiuError::BackpressureRejected);
        }
        Ok(())
    }

    /// 取出压缩器本次就绪的全部数据包
    fn drain(&mut self) -> usize {
        let mut count = 0;
        for pkt in Packets::new(self.compressor.as_mut()) {
            self.pending.push_back(pkt.into());
            count += 1;
        }
        self.stats.packets += count as u64;
        count
    }

    fn branches(&self) -> Branches {
        Branches {
            preview: self.preview.clone(),
            sink: self.sink.clone(),
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        if self.running {
            self.compressor.close();
        }
    }
}

/// 转发给下游分支的通知
#[derive(Debug, Clone, Copy)]
enum Notice {
    BeginFlush,
    EndFlush,
    EndOfStream,
    NewSegment(Segment),
}

impl Notice {
    fn apply<S: StreamControl + ?Sized>(self, branch: &S) -> LiuResult<()> {
        match self {
            Self::BeginFlush => branch.begin_flush(),
            Self::EndFlush => branch.end_flush(),
            Self::EndOfStream => branch.end_of_stream(),
            Self::NewSegment(segment) => branch.new_segment(segment),
        }
    }
}

/// 下游分支快照, 在不持锁时使用
struct Branches {
    preview: Option<Arc<dyn PreviewSink>>,
    sink: Option<Arc<dyn PacketSink>>,
}

impl Branches {
    fn notify(&self, notice: Notice) {
        if let Some(preview) = &self.preview {
            if let Err(e) = notice.apply(preview.as_ref()) {
                warn!("预览分支处理 {notice:?} 失败: {e}");
            }
        }
        if let Some(sink) = &self.sink {
            if let Err(e) = notice.apply(sink.as_ref()) {
                warn!("输出分支处理 {notice:?} 失败: {e}");
            }
        }
    }
}

fn poisoned<T>(_: PoisonError<T>) -> LiuError {
    LiuError::Internal("同步器锁已中毒".into())
}

fn encoding_failure(err: LiuError) -> LiuError {
    match err {
        e @ LiuError::EncodingFailure(_) => e,
        other => LiuError::EncodingFailure(other.to_string()),
    }
}

/// 帧同步器
///
/// 所有方法都只需要 `&self`, 可以放在 `Arc` 中由上游线程与控制线程共享.
pub struct FrameSynchronizer {
    ingest: Mutex<ColorConverter>,
    state: Mutex<Inner>,
}

impl FrameSynchronizer {
    /// 创建同步器, 压缩器在 `start` 时打开
    pub fn new(compressor: Box<dyn Compressor>, config: SyncConfig) -> Self {
        let pending = PendingQueue::new(config.max_pending);
        Self {
            ingest: Mutex::new(ColorConverter::new()),
            state: Mutex::new(Inner {
                media: None,
                sink: None,
                pool: None,
                preview: None,
                compressor,
                config,
                running: false,
                flushing: false,
                end_of_stream: false,
                eos_forwarded: false,
                discontinuity: true,
                generation: 0,
                clock: StreamClock::new(),
                pending,
                stats: SyncStats::default(),
                release_scratch: false,
            }),
        }
    }

    fn lock_state(&self) -> LiuResult<MutexGuard<'_, Inner>> {
        self.state.lock().map_err(poisoned)
    }

    fn lock_ingest(&self) -> LiuResult<MutexGuard<'_, ColorConverter>> {
        self.ingest.lock().map_err(poisoned)
    }

    // ========================
    // 连接
    // ========================

    /// 连接上游, 协商输入媒体类型
    pub fn connect(&self, media: MediaType) -> LiuResult<()> {
        let mut inner = self.lock_state()?;
        inner.require_stopped()?;
        if inner.media.is_some() {
            return Err(LiuError::AlreadyConnected);
        }
        media.query_accept()?;
        debug!(
            "输入已连接: {media}, 名义帧时长 {} (100ns)",
            media.nominal_frame_duration()
        );
        inner.media = Some(media);
        Ok(())
    }

    /// 断开上游
    pub fn disconnect(&self) -> LiuResult<()> {
        let mut inner = self.lock_state()?;
        inner.require_stopped()?;
        if inner.media.take().is_none() {
            return Err(LiuError::NotConnected);
        }
        debug!("输入已断开");
        Ok(())
    }

    /// 连接压缩输出分支
    pub fn connect_output(&self, sink: Arc<dyn PacketSink>) -> LiuResult<()> {
        let mut inner = self.lock_state()?;
        inner.require_stopped()?;
        if inner.sink.is_some() {
            return Err(LiuError::AlreadyConnected);
        }
        inner.sink = Some(sink);
        Ok(())
    }

    /// 设置输出缓冲池
    pub fn set_buffer_pool(&self, pool: Arc<dyn BufferPool>) -> LiuResult<()> {
        let mut inner = self.lock_state()?;
        inner.require_stopped()?;
        inner.pool = Some(pool);
        Ok(())
    }

    /// 断开压缩输出分支及其缓冲池
    pub fn disconnect_output(&self) -> LiuResult<()> {
        let mut inner = self.lock_state()?;
        inner.require_stopped()?;
        if inner.sink.take().is_none() {
            return Err(LiuError::NotConnected);
        }
        inner.pool = None;
        Ok(())
    }

    /// 连接预览分支
    pub fn connect_preview(&self, preview: Arc<dyn PreviewSink>) -> LiuResult<()> {
        let mut inner = self.lock_state()?;
        inner.require_stopped()?;
        if inner.preview.is_some() {
            return Err(LiuError::AlreadyConnected);
        }
        inner.preview = Some(preview);
        Ok(())
    }

    /// 断开预览分支
    pub fn disconnect_preview(&self) -> LiuResult<()> {
        let mut inner = self.lock_state()?;
        inner.require_stopped()?;
        if inner.preview.take().is_none() {
            return Err(LiuError::NotConnected);
        }
        Ok(())
    }

    // ========================
    // 查询
    // ========================

    /// 已协商的输入媒体类型
    pub fn media_type(&self) -> LiuResult<Option<MediaType>> {
        Ok(self.lock_state()?.media)
    }

    /// 当前状态
    pub fn state(&self) -> LiuResult<SynchronizerState> {
        Ok(self.lock_state()?.state())
    }

    /// 运行统计
    pub fn stats(&self) -> LiuResult<SyncStats> {
        Ok(self.lock_state()?.stats)
    }

    /// 待投递帧数
    pub fn pending_len(&self) -> LiuResult<usize> {
        Ok(self.lock_state()?.pending.len())
    }

    /// 当前参考时间
    pub fn reference_time(&self) -> LiuResult<Option<i64>> {
        Ok(self.lock_state()?.clock.reference())
    }

    /// 是否已收到流结束
    pub fn is_end_of_stream(&self) -> LiuResult<bool> {
        Ok(self.lock_state()?.end_of_stream)
    }

    /// 接收是否可能阻塞, 由输出分支决定
    pub fn receive_can_block(&self) -> bool {
        let sink = match self.state.lock() {
            Ok(inner) => inner.sink.clone(),
            Err(_) => return true,
        };
        sink.is_some_and(|s| s.can_block())
    }

    // ========================
    // 运行控制
    // ========================

    /// 启动: 打开压缩器会话
    pub fn start(&self) -> LiuResult<()> {
        let mut inner = self.lock_state()?;
        let media = inner.connected()?;
        if inner.running {
            return Ok(());
        }

        let params = CompressorParams::new(
            media.width_px(),
            media.height_px(),
            inner.config.encoder.clone(),
        );
        inner.compressor.open(&params)?;

        inner.running = true;
        inner.flushing = false;
        inner.end_of_stream = false;
        inner.eos_forwarded = false;
        inner.discontinuity = true;
        inner.generation += 1;
        inner.clock.reset();
        inner.pending.purge();
        inner.stats = SyncStats::default();
        debug!(
            "同步器启动: {media}, 压缩器 {}, 待投递上限 {}",
            inner.compressor.name(),
            inner.pending.limit(),
        );
        Ok(())
    }

    /// 停止: 关闭压缩器会话, 丢弃待投递帧, 释放暂存区
    pub fn stop(&self) -> LiuResult<()> {
        let mut inner = self.lock_state()?;
        if !inner.running {
            return Ok(());
        }
        inner.compressor.close();
        inner.running = false;
        inner.flushing = false;
        inner.generation += 1;
        let purged = inner.pending.purge();
        inner.stats.discarded += purged as u64;

        match self.ingest.try_lock() {
            Ok(mut converter) => converter.release(),
            Err(TryLockError::WouldBlock | TryLockError::Poisoned(_)) => {
                inner.release_scratch = true;
            }
        }
        debug!("同步器停止, 丢弃 {purged} 个待投递帧");
        Ok(())
    }

    // ========================
    // 数据流
    // ========================

    /// 接收一帧
    pub fn receive(&self, sample: &VideoSample<'_>) -> LiuResult<()> {
        if sample.preroll {
            self.lock_state()?.stats.preroll += 1;
            return Ok(());
        }

        // 队列已满时先尝试投递, 此时不持有接收锁
        let inner = self.lock_state()?;
        inner.check_ingest()?;
        if inner.pending.is_full() {
            debug!("待投递队列已满 ({}), 先尝试投递", inner.pending.len());
            let generation = inner.generation;
            self.deliver(inner, generation)?;
        } else {
            drop(inner);
        }

        let mut converter = self.lock_ingest()?;
        let mut inner = self.lock_state()?;
        let media = inner.check_ingest()?;
        if inner.pending.is_full() {
            return Err(LiuError::BackpressureRejected);
        }
        if inner.release_scratch {
            converter.release();
            inner.release_scratch = false;
        }
        let generation = inner.generation;

        let (w, h) = (media.width_px(), media.height_px());
        let image = match media.subtype {
            VideoSubtype::Yuy2 | VideoSubtype::Yuyv => converter.convert(sample.data, w, h)?,
            VideoSubtype::Yv12 | VideoSubtype::I420 => {
                ImageBuffer::wrap(media.subtype.pixel_format(), w, h, 1, sample.data)?
            }
        };

        if let Some(preview) = inner.preview.clone() {
            drop(inner);
            if let Err(e) = preview.render(&image) {
                warn!("预览渲染失败: {e}");
            }
            inner = self.lock_state()?;
            inner.revalidate(generation)?;
        }

        if inner.sink.is_none() {
            return Err(LiuError::BackpressureRejected);
        }
        if inner.pool.is_none() {
            return Err(LiuError::NoAllocator);
        }

        let nominal = media.nominal_frame_duration();
        let reconciled = inner.clock.reconcile(sample.times, nominal)?;
        inner.stats.received += 1;
        let Some(range) = reconciled else {
            inner.stats.dropped += 1;
            trace!("丢弃样本: 时间戳 {:?} 无法使用", sample.times);
            return Ok(());
        };

        let mut flags = EncodeFlags::empty();
        if sample.discontinuity || range.start <= 0 {
            flags |= EncodeFlags::FORCE_KEYFRAME;
        }

        let state = &mut *inner;
        let deadline = state.config.encoder.deadline;
        state
            .compressor
            .encode(Some(&image), range.start, range.duration(), flags, deadline)
            .map_err(encoding_failure)?;
        state.clock.advance(range);
        state.stats.encoded += 1;
        let drained = state.drain();
        trace!(
            "编码 {range}, 关键帧={}, 取出 {drained} 个数据包, 待投递 {}",
            flags.contains(EncodeFlags::FORCE_KEYFRAME),
            state.pending.len(),
        );

        drop(image);
        drop(converter);
        self.deliver(inner, generation)
    }

    /// 按顺序接收多帧, 遇到第一个失败即停止
    ///
    /// 返回成功接收的帧数及结束原因.
    pub fn receive_many(&self, samples: &[VideoSample<'_>]) -> (usize, LiuResult<()>) {
        for (i, sample) in samples.iter().enumerate() {
            if let Err(e) = self.receive(sample) {
                return (i, Err(e));
            }
        }
        (samples.len(), Ok(()))
    }

    /// 流结束: 刷出压缩器缓存, 投递待投递帧, 全部投递后再通知各分支
    ///
    /// 下游拒绝时返回对应错误, 流结束通知暂缓. 再次调用会重试投递,
    /// 队列清空后才转发. 已转发后重复调用直接返回 `Ok`.
    pub fn end_of_stream(&self) -> LiuResult<()> {
        let ingest = self.lock_ingest()?;
        let mut inner = self.lock_state()?;
        inner.connected()?;
        if !inner.running {
            return Err(LiuError::NotRunning);
        }
        if inner.flushing {
            return Err(LiuError::BackpressureRejected);
        }
        if inner.eos_forwarded {
            return Ok(());
        }
        let generation = inner.generation;

        if !inner.end_of_stream {
            let state = &mut *inner;
            let deadline = state.config.encoder.deadline;
            state
                .compressor
                .encode(None, 0, 0, EncodeFlags::empty(), deadline)
                .map_err(encoding_failure)?;
            state.end_of_stream = true;
            let drained = state.drain();
            debug!("流结束: 刷出 {drained} 个数据包, 待投递 {}", state.pending.len());
        } else {
            debug!("重试流结束投递, 待投递 {}", inner.pending.len());
        }
        drop(ingest);

        if let Err(e) = self.deliver(inner, generation) {
            debug!("流结束投递未完成 ({e}), 暂缓转发");
            return Err(e);
        }

        let mut inner = self.lock_state()?;
        inner.revalidate(generation)?;
        if inner.eos_forwarded || !inner.pending.is_empty() {
            return Ok(());
        }
        inner.eos_forwarded = true;
        let branches = inner.branches();
        drop(inner);
        branches.notify(Notice::EndOfStream);
        Ok(())
    }

    /// 开始刷新
    ///
    /// 之后的接收以背压拒绝, 投递暂停. 待投递帧保留.
    pub fn begin_flush(&self) -> LiuResult<()> {
        let mut inner = self.lock_state()?;
        inner.connected()?;
        inner.flushing = true;
        let branches = inner.branches();
        drop(inner);
        debug!("开始刷新");
        branches.notify(Notice::BeginFlush);
        Ok(())
    }

    /// 结束刷新, 恢复接收
    pub fn end_flush(&self) -> LiuResult<()> {
        let mut inner = self.lock_state()?;
        inner.connected()?;
        inner.flushing = false;
        let branches = inner.branches();
        drop(inner);
        debug!("结束刷新");
        branches.notify(Notice::EndFlush);
        Ok(())
    }

    /// 转发新分段
    pub fn new_segment(&self, segment: Segment) -> LiuResult<()> {
        let inner = self.lock_state()?;
        inner.connected()?;
        let branches = inner.branches();
        drop(inner);
        branches.notify(Notice::NewSegment(segment));
        Ok(())
    }

    /// 投递循环
    ///
    /// 队列清空时返回 `Ok`. 没有缓冲池、获取缓冲失败或下游拒绝时提前结束并返回对应错误,
    /// 被拒绝的帧放回队首.
    fn deliver<'a>(&'a self, mut inner: MutexGuard<'a, Inner>, generation: u64) -> LiuResult<()> {
        while !inner.pending.is_empty() {
            let pool = inner.pool.clone().ok_or(LiuError::NoAllocator)?;
            drop(inner);
            let acquired = pool.acquire();
            inner = self.lock_state()?;
            inner.revalidate(generation)?;
            let mut buffer = acquired?;

            let Some(frame) = inner.pending.pop_front() else {
                break;
            };
            let discontinuity = std::mem::take(&mut inner.discontinuity);
            buffer.populate(&frame, discontinuity);

            let Some(sink) = inner.sink.clone() else {
                inner.pending.push_front(frame);
                inner.discontinuity |= discontinuity;
                return Err(LiuError::BackpressureRejected);
            };
            drop(inner);
            let result = sink.receive(&buffer);
            inner = self.lock_state()?;

            if let Err(e) = inner.revalidate(generation) {
                // 期间被停止或刷新: 该帧不再放回
                if result.is_ok() {
                    inner.stats.delivered += 1;
                } else {
                    inner.stats.discarded += 1;
                }
                return Err(e);
            }

            match result {
                Ok(()) => {
                    inner.stats.delivered += 1;
                    trace!(
                        "投递 {}, {} 字节, 关键帧={}",
                        frame.time_range(),
                        frame.payload.len(),
                        frame.key,
                    );
                }
                Err(e) => {
                    inner.stats.refused += 1;
                    inner.pending.push_front(frame);
                    inner.discontinuity |= discontinuity;
                    debug!("下游拒绝投递 ({e}), 保留 {} 个待投递帧", inner.pending.len());
                    return Err(e);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::downstream::{HeapPool, OutputBuffer};
    use liu_codec::RawCompressor;
    use liu_core::timestamp::ms;

    #[derive(Default)]
    struct CollectSink {
        buffers: Mutex<Vec<(i64, i64, bool)>>,
    }

    impl StreamControl for CollectSink {}

    impl PacketSink for CollectSink {
        fn receive(&self, buffer: &OutputBuffer) -> LiuResult<()> {
            self.buffers
                .lock()
                .unwrap()
                .push((buffer.start(), buffer.stop(), buffer.is_discontinuity()));
            Ok(())
        }

        fn can_block(&self) -> bool {
            false
        }
    }

    fn running(sink: Arc<CollectSink>) -> FrameSynchronizer {
        let _ = env_logger::builder().is_test(true).try_init();
        let sync = FrameSynchronizer::new(RawCompressor::create(), SyncConfig::default());
        sync.connect(MediaType::new(VideoSubtype::I420, 4, 2)).unwrap();
        sync.connect_output(sink).unwrap();
        sync.set_buffer_pool(Arc::new(HeapPool::new(64))).unwrap();
        sync.start().unwrap();
        sync
    }

    #[test]
    fn test_状态转换() {
        let sync = FrameSynchronizer::new(RawCompressor::create(), SyncConfig::default());
        assert_eq!(sync.start(), Err(LiuError::NotConnected));
        sync.connect(MediaType::new(VideoSubtype::Yv12, 4, 2)).unwrap();
        assert_eq!(
            sync.connect(MediaType::new(VideoSubtype::Yv12, 4, 2)),
            Err(LiuError::AlreadyConnected)
        );
        assert_eq!(sync.state().unwrap(), SynchronizerState::Stopped);
        sync.start().unwrap();
        assert_eq!(sync.state().unwrap(), SynchronizerState::Running);
        assert_eq!(sync.disconnect(), Err(LiuError::NotStopped));
        sync.begin_flush().unwrap();
        assert_eq!(sync.state().unwrap(), SynchronizerState::Flushing);
        sync.end_flush().unwrap();
        sync.stop().unwrap();
        assert_eq!(sync.state().unwrap(), SynchronizerState::Stopped);
        sync.disconnect().unwrap();
    }

    #[test]
    fn test_首个缓冲带不连续标记() {
        let sink = Arc::new(CollectSink::default());
        let sync = running(sink.clone());
        let data = [0u8; 12];
        sync.receive(&VideoSample::new(&data).with_times(0, ms(20)))
            .unwrap();
        sync.receive(&VideoSample::new(&data).with_times(ms(20), ms(40)))
            .unwrap();
        let got = sink.buffers.lock().unwrap().clone();
        assert_eq!(got, vec![(0, ms(20), true), (ms(20), ms(40), false)]);
        assert_eq!(sync.reference_time().unwrap(), Some(ms(40)));
        assert!(!sync.receive_can_block());
    }

    #[test]
    fn test_预卷样本被忽略() {
        let sync = FrameSynchronizer::new(RawCompressor::create(), SyncConfig::default());
        let data = [0u8; 4];
        sync.receive(&VideoSample::new(&data).with_preroll(true))
            .unwrap();
        assert_eq!(sync.stats().unwrap().preroll, 1);
        assert_eq!(
            sync.receive(&VideoSample::new(&data)),
            Err(LiuError::NotConnected)
        );
    }

    #[test]
    fn test_流结束后拒绝接收() {
        let sink = Arc::new(CollectSink::default());
        let sync = running(sink);
        sync.end_of_stream().unwrap();
        sync.end_of_stream().unwrap();
        let data = [0u8; 12];
        assert_eq!(
            sync.receive(&VideoSample::new(&data).with_start(0)),
            Err(LiuError::RejectedAfterEndOfStream)
        );
        sync.stop().unwrap();
        sync.start().unwrap();
        sync.receive(&VideoSample::new(&data).with_start(0)).unwrap();
    }
}
