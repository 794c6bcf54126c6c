//! 输出分支: 把压缩数据写入文件或丢弃.

use std::io::Write;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use liu_core::{LiuError, LiuResult};
use liu_sync::{OutputBuffer, PacketSink, StreamControl};
use log::{debug, info};
use serde::Serialize;

/// 写出统计
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct SinkReport {
    /// 数据包数
    pub packets: u64,
    /// 关键帧数
    pub keyframes: u64,
    /// 总字节数
    pub bytes: u64,
    /// 最后一个包的结束时间 (100ns)
    pub last_stop: i64,
}

/// 写入任意 `Write` 的输出分支
///
/// 没有写入目标时只统计.
pub struct WriterSink {
    writer: Option<Mutex<Box<dyn Write + Send>>>,
    packets: AtomicU64,
    keyframes: AtomicU64,
    bytes: AtomicU64,
    last_stop: Mutex<i64>,
}

impl WriterSink {
    /// 创建输出分支
    pub fn new(writer: Option<Box<dyn Write + Send>>) -> Self {
        Self {
            writer: writer.map(Mutex::new),
            packets: AtomicU64::new(0),
            keyframes: AtomicU64::new(0),
            bytes: AtomicU64::new(0),
            last_stop: Mutex::new(0),
        }
    }

    /// 当前统计
    pub fn report(&self) -> SinkReport {
        SinkReport {
            packets: self.packets.load(Ordering::Relaxed),
            keyframes: self.keyframes.load(Ordering::Relaxed),
            bytes: self.bytes.load(Ordering::Relaxed),
            last_stop: self.last_stop.lock().map(|v| *v).unwrap_or_default(),
        }
    }

    fn with_writer(&self, f: impl FnOnce(&mut dyn Write) -> std::io::Result<()>) -> LiuResult<()> {
        let Some(writer) = &self.writer else {
            return Ok(());
        };
        let mut guard = writer
            .lock()
            .map_err(|_| LiuError::Internal("输出文件锁已中毒".into()))?;
        f(&mut **guard).map_err(|e| LiuError::Internal(format!("写入输出失败: {e}")))
    }
}

impl StreamControl for WriterSink {
    fn end_of_stream(&self) -> LiuResult<()> {
        self.with_writer(|w| w.flush())?;
        info!(
            "输出结束: {} 个数据包, {} 字节",
            self.packets.load(Ordering::Relaxed),
            self.bytes.load(Ordering::Relaxed),
        );
        Ok(())
    }

    fn begin_flush(&self) -> LiuResult<()> {
        debug!("输出分支开始刷新");
        Ok(())
    }
}

impl PacketSink for WriterSink {
    fn receive(&self, buffer: &OutputBuffer) -> LiuResult<()> {
        self.with_writer(|w| w.write_all(buffer.payload()))?;
        self.packets.fetch_add(1, Ordering::Relaxed);
        self.bytes.fetch_add(buffer.len() as u64, Ordering::Relaxed);
        if buffer.is_sync_point() {
            self.keyframes.fetch_add(1, Ordering::Relaxed);
        }
        if let Ok(mut last) = self.last_stop.lock() {
            *last = buffer.stop();
        }
        Ok(())
    }

    fn can_block(&self) -> bool {
        self.writer.is_some()
    }
}
