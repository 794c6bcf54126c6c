//! 集成测试共用的下游与压缩器替身.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use liu::codec::{CompressedPacket, Compressor, CompressorParams, EncodeFlags};
use liu::core::{LiuError, LiuResult, PixelFormat};
use liu::image::ImageBuffer;
use liu::sync::{OutputBuffer, PacketSink, PreviewSink, Segment, StreamControl};

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// 下游收到的一个缓冲
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivered {
    pub start: i64,
    pub stop: i64,
    pub key: bool,
    pub discontinuity: bool,
    pub payload: Vec<u8>,
}

type Hook = Box<dyn FnOnce() + Send>;

/// 可编排的输出分支
///
/// `remaining` 为 None 时全部接收, 为 Some(n) 时再接收 n 个后拒绝.
#[derive(Default)]
pub struct ScriptedSink {
    remaining: Mutex<Option<usize>>,
    delivered: Mutex<Vec<Delivered>>,
    events: Mutex<Vec<String>>,
    hook: Mutex<Option<Hook>>,
    blocking: bool,
}

impl ScriptedSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn accepting(n: usize) -> Arc<Self> {
        let sink = Self::default();
        *sink.remaining.lock().unwrap() = Some(n);
        Arc::new(sink)
    }

    pub fn blocking() -> Arc<Self> {
        Arc::new(Self {
            blocking: true,
            ..Self::default()
        })
    }

    pub fn allow(&self, n: Option<usize>) {
        *self.remaining.lock().unwrap() = n;
    }

    /// 下一次 `receive` 时执行一次
    pub fn on_next_receive(&self, hook: impl FnOnce() + Send + 'static) {
        *self.hook.lock().unwrap() = Some(Box::new(hook));
    }

    pub fn delivered(&self) -> Vec<Delivered> {
        self.delivered.lock().unwrap().clone()
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    fn record(&self, event: impl Into<String>) {
        self.events.lock().unwrap().push(event.into());
    }
}

impl StreamControl for ScriptedSink {
    fn begin_flush(&self) -> LiuResult<()> {
        self.record("begin_flush");
        Ok(())
    }

    fn end_flush(&self) -> LiuResult<()> {
        self.record("end_flush");
        Ok(())
    }

    fn end_of_stream(&self) -> LiuResult<()> {
        self.record("end_of_stream");
        Ok(())
    }

    fn new_segment(&self, segment: Segment) -> LiuResult<()> {
        self.record(format!("segment {} {}", segment.start, segment.stop));
        Ok(())
    }
}

impl PacketSink for ScriptedSink {
    fn receive(&self, buffer: &OutputBuffer) -> LiuResult<()> {
        let hook = self.hook.lock().unwrap().take();
        if let Some(hook) = hook {
            hook();
        }
        {
            let mut remaining = self.remaining.lock().unwrap();
            match remaining.as_mut() {
                Some(0) => return Err(LiuError::BackpressureRejected),
                Some(n) => *n -= 1,
                None => {}
            }
        }
        self.delivered.lock().unwrap().push(Delivered {
            start: buffer.start(),
            stop: buffer.stop(),
            key: buffer.is_sync_point(),
            discontinuity: buffer.is_discontinuity(),
            payload: buffer.payload().to_vec(),
        });
        Ok(())
    }

    fn can_block(&self) -> bool {
        self.blocking
    }
}

/// 记录渲染的预览分支
#[derive(Default)]
pub struct RecordingPreview {
    frames: Mutex<Vec<(PixelFormat, u32, u32)>>,
    events: Mutex<Vec<String>>,
}

impl RecordingPreview {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn frames(&self) -> Vec<(PixelFormat, u32, u32)> {
        self.frames.lock().unwrap().clone()
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

impl StreamControl for RecordingPreview {
    fn end_of_stream(&self) -> LiuResult<()> {
        self.events.lock().unwrap().push("end_of_stream".into());
        Ok(())
    }

    fn new_segment(&self, segment: Segment) -> LiuResult<()> {
        self.events
            .lock()
            .unwrap()
            .push(format!("segment {} {}", segment.start, segment.stop));
        Ok(())
    }
}

impl PreviewSink for RecordingPreview {
    fn render(&self, image: &ImageBuffer<'_>) -> LiuResult<()> {
        self.frames
            .lock()
            .unwrap()
            .push((image.format(), image.width(), image.height()));
        Ok(())
    }
}

/// 一次编码调用的记录
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeCall {
    pub pts: i64,
    pub duration: i64,
    pub forced_key: bool,
    pub flush: bool,
}

/// 每帧输出固定数量数据包的压缩器
///
/// 帧时长被平均分给各个数据包.
pub struct BurstCompressor {
    burst: i64,
    ready: Vec<CompressedPacket>,
    pub calls: Arc<Mutex<Vec<EncodeCall>>>,
    pub fail: Arc<AtomicBool>,
}

impl BurstCompressor {
    pub fn new(burst: i64) -> Self {
        Self {
            burst,
            ready: Vec::new(),
            calls: Arc::default(),
            fail: Arc::default(),
        }
    }
}

impl Compressor for BurstCompressor {
    fn name(&self) -> &str {
        "burst"
    }

    fn open(&mut self, _params: &CompressorParams) -> LiuResult<()> {
        self.ready.clear();
        Ok(())
    }

    fn encode(
        &mut self,
        image: Option<&ImageBuffer<'_>>,
        pts: i64,
        duration: i64,
        flags: EncodeFlags,
        _deadline: u64,
    ) -> LiuResult<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(LiuError::EncodingFailure("模拟失败".into()));
        }
        let forced_key = flags.contains(EncodeFlags::FORCE_KEYFRAME);
        self.calls.lock().unwrap().push(EncodeCall {
            pts,
            duration,
            forced_key,
            flush: image.is_none(),
        });
        if image.is_none() {
            return Ok(());
        }
        let step = duration / self.burst;
        // 逆序存放, next_packet 从尾部弹出
        for k in (0..self.burst).rev() {
            let start = pts + k * step;
            let payload = Bytes::from(vec![k as u8; 4]);
            self.ready
                .push(CompressedPacket::new(payload, start, step, forced_key && k == 0));
        }
        Ok(())
    }

    fn next_packet(&mut self) -> Option<CompressedPacket> {
        self.ready.pop()
    }

    fn close(&mut self) {
        self.ready.clear();
    }
}
